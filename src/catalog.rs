use std::sync::Arc;
use std::time::Instant;

use log::{debug, info, warn};
use ndarray::Array2;
use serde::Serialize;
use tokio::fs;
use tokio::task::spawn_blocking;
use utoipa::ToSchema;

use crate::blob::{BlobStore, FsBlobStore, blob_key};
use crate::config::{ConfDir, EmbedOptions};
use crate::db::{ItemRecord, ItemSummary, Ledger, NewItem, SqliteLedger};
use crate::embed::{Embedder, ThumbnailEmbedder};
use crate::error::{Error, Result};
use crate::index::{IndexStatus, ItemMatch, SimilarityIndex, encode_descriptor};
use crate::metrics;

pub struct CatalogBuilder {
    conf_dir: ConfDir,
    embed: EmbedOptions,
    embedder: Option<Arc<dyn Embedder>>,
    public_url: String,
}

impl CatalogBuilder {
    pub fn new(conf_dir: ConfDir) -> Self {
        Self { conf_dir, embed: EmbedOptions::default(), embedder: None, public_url: String::new() }
    }

    /// 缩略图描述符参数，设置了 [`Self::embedder`] 时无效
    pub fn embed_options(mut self, embed: EmbedOptions) -> Self {
        self.embed = embed;
        self
    }

    /// 使用自定义的 Embedder
    pub fn embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// 服务对外的地址，用于生成图片链接
    pub fn public_url(mut self, url: impl Into<String>) -> Self {
        self.public_url = url.into();
        self
    }

    /// 打开数据库并构建索引
    ///
    /// 初次构建失败时只打印错误，索引保持未初始化状态，以便通过删除操作修复数据
    pub async fn open(self) -> Result<Catalog> {
        fs::create_dir_all(self.conf_dir.path())
            .await
            .map_err(|e| Error::upstream("配置目录", e))?;

        let ledger = SqliteLedger::open(self.conf_dir.database()).await?;
        let blobs = FsBlobStore::new(self.conf_dir.blobs(), &self.public_url);
        let embedder = match self.embedder {
            Some(embedder) => embedder,
            None => Arc::new(ThumbnailEmbedder::from(&self.embed)),
        };

        let catalog = Catalog::new(ledger, embedder, blobs);
        if let Err(e) = catalog.rebuild().await {
            warn!("初始化索引失败: {e}");
        }
        Ok(catalog)
    }
}

/// 物品列表项
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ItemView {
    pub item_id: String,
    pub item_name: String,
    /// 第一张图片的地址
    pub preview_image: Option<String>,
    pub meta_text: Option<String>,
    /// 创建时间，unix 时间戳
    pub ctime: i64,
}

/// 查询结果
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QueryMatch {
    pub item_id: String,
    /// 最相似的图片文件名
    pub filename: Option<String>,
    /// 平方欧氏距离，越小越相似
    pub distance: f32,
    /// 最相似的图片地址
    pub preview_image: Option<String>,
}

/// 上传结果
#[derive(Debug, Clone, Serialize)]
pub struct Uploaded {
    pub item: ItemRecord,
    pub image_id: i64,
    pub blob_key: String,
    pub url: String,
}

/// 物品图片库
///
/// 所有修改描述符集合的操作都会在完成后重建索引
pub struct Catalog<B = FsBlobStore> {
    index: SimilarityIndex<SqliteLedger>,
    embedder: Arc<dyn Embedder>,
    blobs: B,
}

impl<B: BlobStore> Catalog<B> {
    /// 创建图片库，索引处于未初始化状态
    pub fn new(ledger: SqliteLedger, embedder: Arc<dyn Embedder>, blobs: B) -> Self {
        Self { index: SimilarityIndex::new(ledger), embedder, blobs }
    }

    fn ledger(&self) -> &SqliteLedger {
        self.index.ledger()
    }

    pub fn blobs(&self) -> &B {
        &self.blobs
    }

    /// 计算图片描述符
    pub async fn embed(&self, bytes: Vec<u8>) -> Result<Vec<f32>> {
        let embedder = self.embedder.clone();
        let start = Instant::now();
        let expected = embedder.dimension();
        let v = spawn_blocking(move || embedder.embed(&bytes)).await??;
        metrics::observe_query_stage("embed", start.elapsed().as_secs_f32());
        if v.len() != expected {
            return Err(Error::DimensionMismatch { expected, got: v.len() });
        }
        Ok(v)
    }

    /// 添加一张图片，但不重建索引
    ///
    /// # Arguments
    ///
    /// * `item` - 图片所属物品，不存在时自动创建
    /// * `filename` - 图片文件名，同一物品下的同名图片会被替换
    /// * `bytes` - 图片内容
    pub async fn ingest(&self, item: NewItem<'_>, filename: &str, bytes: Vec<u8>) -> Result<Uploaded> {
        let key = blob_key(item.id, filename)?;
        let hash = blake3::hash(&bytes);

        let descriptor = self.embed(bytes.clone()).await?;
        if let Some(snapshot) = self.index.current().await.snapshot() {
            if snapshot.dimension() != descriptor.len() {
                return Err(Error::DimensionMismatch {
                    expected: snapshot.dimension(),
                    got: descriptor.len(),
                });
            }
        }

        // 数据库写入失败时恢复原来的文件
        let previous = self.blobs.get(&key).await?;
        self.blobs.put(&key, &bytes).await?;
        let vector = encode_descriptor(&descriptor);
        let (record, image_id) =
            match self.ledger().add_image(item, filename, &key, hash.as_bytes(), &vector).await {
                Ok(added) => added,
                Err(e) => {
                    self.restore_blob(&key, previous).await;
                    return Err(e);
                }
            };
        debug!("添加图片 {key} (#{image_id})");

        let url = self.blobs.url(&key);
        Ok(Uploaded { item: record, image_id, blob_key: key, url })
    }

    /// 添加一张图片并重建索引
    pub async fn upload(&self, item: NewItem<'_>, filename: &str, bytes: Vec<u8>) -> Result<Uploaded> {
        let uploaded = self.ingest(item, filename, bytes).await?;
        self.rebuild().await?;
        Ok(uploaded)
    }

    /// 搜索与图片最相似的 k 个物品
    pub async fn query(&self, bytes: Vec<u8>, k: usize) -> Result<Vec<QueryMatch>> {
        if k == 0 {
            return Err(Error::InvalidArgument("k 必须大于 0".to_owned()));
        }
        let descriptor = self.embed(bytes).await?;
        self.query_descriptor(&descriptor, k).await
    }

    /// 搜索与描述符最相似的 k 个物品
    pub async fn query_descriptor(&self, descriptor: &[f32], k: usize) -> Result<Vec<QueryMatch>> {
        let start = Instant::now();
        let matches = self.index.search(descriptor, k).await?;
        metrics::observe_query_stage("scan", start.elapsed().as_secs_f32());
        metrics::inc_query(matches.first().map(|m| m.distance));

        let mut result = Vec::with_capacity(matches.len());
        for ItemMatch { item_id, distance, image_id } in matches {
            // 图片可能在快照发布后被删除
            let image = self.ledger().get_image(image_id).await?;
            result.push(QueryMatch {
                item_id,
                distance,
                preview_image: image.as_ref().map(|img| self.blobs.url(&img.blob_key)),
                filename: image.map(|img| img.filename),
            });
        }
        Ok(result)
    }

    /// 删除物品及其所有图片
    pub async fn delete_item(&self, item_id: &str) -> Result<()> {
        let Some(keys) = self.ledger().delete_item(item_id).await? else {
            return Err(Error::NotFound(format!("物品 {item_id}")));
        };
        for key in &keys {
            self.delete_blob(key).await;
        }
        info!("删除物品 {item_id}，共 {} 张图片", keys.len());
        self.rebuild().await
    }

    /// 删除物品中的一张图片
    pub async fn delete_image(&self, item_id: &str, filename: &str) -> Result<()> {
        let Some(key) = self.ledger().delete_image(item_id, filename).await? else {
            return Err(Error::NotFound(format!("图片 {item_id}/{filename}")));
        };
        self.delete_blob(&key).await;
        info!("删除图片 {key}");
        self.rebuild().await
    }

    async fn restore_blob(&self, key: &str, previous: Option<Vec<u8>>) {
        let restored = match previous {
            Some(bytes) => self.blobs.put(key, &bytes).await,
            None => self.blobs.delete(key).await,
        };
        if let Err(e) = restored {
            warn!("恢复文件 {key} 失败: {e}");
        }
    }

    async fn delete_blob(&self, key: &str) {
        if let Err(e) = self.blobs.delete(key).await {
            warn!("删除文件 {key} 失败: {e}");
        }
    }

    /// 更新物品附加信息
    pub async fn update_meta(&self, item_id: &str, meta_text: &str) -> Result<()> {
        if !self.ledger().update_meta(item_id, meta_text).await? {
            return Err(Error::NotFound(format!("物品 {item_id}")));
        }
        Ok(())
    }

    /// 按创建时间升序列出所有物品
    pub async fn list_items(&self) -> Result<Vec<ItemView>> {
        let items = self.ledger().list_items().await?;
        Ok(items.into_iter().map(|item| self.item_view(item)).collect())
    }

    /// 列出最近创建的物品
    pub async fn recent_items(&self, limit: usize) -> Result<Vec<ItemView>> {
        if limit == 0 {
            return Err(Error::InvalidArgument("limit 必须大于 0".to_owned()));
        }
        let items = self.ledger().recent_items(limit).await?;
        Ok(items.into_iter().map(|item| self.item_view(item)).collect())
    }

    fn item_view(&self, item: ItemSummary) -> ItemView {
        ItemView {
            preview_image: item.preview_key.map(|key| self.blobs.url(&key)),
            item_id: item.id,
            item_name: item.name,
            meta_text: item.meta_text,
            ctime: item.created_at,
        }
    }

    /// 物品所有图片的地址
    pub async fn item_images(&self, item_id: &str) -> Result<Vec<String>> {
        let images = self.ledger().item_images(item_id).await?;
        Ok(images.iter().map(|img| self.blobs.url(&img.blob_key)).collect())
    }

    /// 单张图片的地址
    pub async fn image_url(&self, item_id: &str, filename: &str) -> Result<String> {
        match self.ledger().find_image(item_id, filename).await? {
            Some(img) => Ok(self.blobs.url(&img.blob_key)),
            None => Err(Error::NotFound(format!("图片 {item_id}/{filename}"))),
        }
    }

    /// 读取图片文件
    pub async fn read_blob(&self, key: &str) -> Result<Vec<u8>> {
        self.blobs.get(key).await?.ok_or_else(|| Error::NotFound(format!("文件 {key}")))
    }

    pub async fn rebuild(&self) -> Result<()> {
        self.index.rebuild().await
    }

    pub async fn status(&self) -> IndexStatus {
        self.index.status().await
    }

    /// 导出当前快照中的所有描述符及其所属物品
    pub async fn export(&self) -> Option<(Array2<f32>, Vec<String>)> {
        let state = self.index.current().await;
        let snapshot = state.snapshot()?;
        Some((snapshot.matrix().clone(), snapshot.owners().map(str::to_owned).collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 把 "1,2" 这样的文本解析为二维描述符
    struct TextEmbedder;

    impl Embedder for TextEmbedder {
        fn dimension(&self) -> usize {
            2
        }

        fn embed(&self, bytes: &[u8]) -> Result<Vec<f32>> {
            let text = std::str::from_utf8(bytes).map_err(|e| Error::UnreadableImage(e.to_string()))?;
            text.split(',')
                .map(|s| s.trim().parse().map_err(|_| Error::UnreadableImage(s.to_owned())))
                .collect()
        }
    }

    fn item(id: &str) -> NewItem<'_> {
        NewItem { id, name: None, meta_text: None }
    }

    #[tokio::test]
    async fn test_ledger_failure_restores_blobs() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = SqliteLedger::open(dir.path().join("imgrec.db")).await.unwrap();
        let blobs = FsBlobStore::new(dir.path().join("blobs"), "");
        let catalog = Catalog::new(ledger, Arc::new(TextEmbedder), blobs);
        catalog.upload(item("A"), "a.jpg", b"0,0".to_vec()).await.unwrap();

        catalog.ledger().pool().close().await;

        // 替换已有图片失败，原文件保持不变
        let err = catalog.ingest(item("A"), "a.jpg", b"5,5".to_vec()).await.unwrap_err();
        assert!(matches!(err, Error::UpstreamUnavailable { .. }));
        assert_eq!(catalog.read_blob("A/a.jpg").await.unwrap(), b"0,0");

        // 新图片失败，不留下文件
        let err = catalog.ingest(item("A"), "b.jpg", b"1,1".to_vec()).await.unwrap_err();
        assert!(matches!(err, Error::UpstreamUnavailable { .. }));
        assert_eq!(catalog.blobs().get("A/b.jpg").await.unwrap(), None);

        let mut names = vec![];
        let mut entries = fs::read_dir(catalog.blobs().root().join("A")).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name());
        }
        assert_eq!(names, vec!["a.jpg"]);
    }

    #[tokio::test]
    async fn test_embedder_dimension_checked_on_empty_index() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = SqliteLedger::open(dir.path().join("imgrec.db")).await.unwrap();
        let blobs = FsBlobStore::new(dir.path().join("blobs"), "");
        let catalog = Catalog::new(ledger, Arc::new(TextEmbedder), blobs);
        catalog.rebuild().await.unwrap();

        let err = catalog.ingest(item("A"), "a.jpg", b"1,2,3".to_vec()).await.unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 2, got: 3 }));
        assert_eq!(catalog.blobs().get("A/a.jpg").await.unwrap(), None);
        assert!(catalog.list_items().await.unwrap().is_empty());
    }
}
