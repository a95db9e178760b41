use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

/// 物品记录
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct ItemRecord {
    /// 物品 ID
    pub id: String,
    /// 物品名称
    pub name: String,
    /// 附加文本信息
    pub meta_text: Option<String>,
    /// 创建时间，unix 时间戳
    pub created_at: i64,
}

/// 物品列表项，附带第一张图片作为预览
#[derive(Debug, Clone, FromRow)]
pub struct ItemSummary {
    pub id: String,
    pub name: String,
    pub meta_text: Option<String>,
    pub created_at: i64,
    /// 预览图片在文件存储中的 key
    pub preview_key: Option<String>,
}

/// 图片记录
#[derive(Debug, Clone, FromRow)]
pub struct ImageRecord {
    /// 图片 ID
    pub id: i64,
    /// 所属物品 ID
    pub item_id: String,
    /// 上传时的文件名
    pub filename: String,
    /// 文件存储中的 key
    pub blob_key: String,
    /// 图片 blake3 哈希
    pub hash: Vec<u8>,
    pub created_at: i64,
}

/// 图片描述符记录
#[derive(Debug, Clone, FromRow)]
pub struct DescriptorRecord {
    /// 图片 ID
    pub id: i64,
    /// 所属物品 ID
    pub item_id: String,
    /// 小端序 f32 数组
    pub vector: Vec<u8>,
}
