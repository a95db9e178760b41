use axum::body::Bytes;
use axum_typed_multipart::{FieldData, TryFromMultipart};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::catalog::{ItemView, QueryMatch};
use crate::db::ItemRecord;

/// 上传请求参数
#[derive(TryFromMultipart)]
pub struct UploadRequest {
    pub item_id: String,
    #[form_data(limit = "10MiB")]
    pub file: FieldData<Bytes>,
    pub item_name: Option<String>,
    pub meta_text: Option<String>,
}

/// 上传表单（用于API文档）
#[derive(Debug, ToSchema)]
#[allow(unused)]
pub struct UploadForm {
    /// 物品 ID，不存在时自动创建
    pub item_id: String,
    /// 上传的图片文件，同一物品下的同名文件会被替换
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub file: String,
    /// 物品名称，仅在创建物品时使用
    pub item_name: Option<String>,
    /// 物品附加信息
    pub meta_text: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadResponse {
    pub item: ItemRecord,
    pub filename: String,
    pub blob_key: String,
    /// 图片地址
    pub url: String,
    pub meta_text: Option<String>,
}

/// 查询请求参数
#[derive(TryFromMultipart)]
pub struct QueryRequest {
    #[form_data(limit = "10MiB")]
    pub file: FieldData<Bytes>,
    pub topk: Option<usize>,
}

/// 查询表单（用于API文档）
#[derive(Debug, ToSchema)]
#[allow(unused)]
pub struct QueryForm {
    /// 被查询的图片
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub file: String,
    /// 返回的物品数量，默认为 5
    pub topk: Option<usize>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct QueryResponse {
    /// 按距离升序排列的匹配物品
    pub matches: Vec<QueryMatch>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MetaRequest {
    pub meta_text: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MetaResponse {
    pub item_id: String,
    pub meta_text: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteResponse {
    pub item_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ItemsResponse {
    pub items: Vec<ItemView>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RecentQuery {
    /// 返回的物品数量，至少为 1
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ImageUrlResponse {
    pub url: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ImagesResponse {
    pub images: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}
