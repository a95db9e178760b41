use std::future::Future;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use log::debug;
use tokio::fs;

use crate::error::{Error, Result};

/// 原始图片文件存储
pub trait BlobStore: Send + Sync {
    fn put(&self, key: &str, bytes: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// 读取文件，不存在时返回 None
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Vec<u8>>>> + Send;

    /// 删除文件，文件不存在时不报错
    fn delete(&self, key: &str) -> impl Future<Output = Result<()>> + Send;

    /// 文件的访问地址
    fn url(&self, key: &str) -> String;
}

/// 生成图片在存储中的 key：`{item_id}/{filename}`
pub fn blob_key(item_id: &str, filename: &str) -> Result<String> {
    check_segment("物品 ID", item_id)?;
    check_segment("文件名", filename)?;
    Ok(format!("{item_id}/{filename}"))
}

fn check_segment(what: &str, s: &str) -> Result<()> {
    if s.is_empty() || s == "." || s == ".." || s.contains(['/', '\\', '\0']) {
        return Err(Error::InvalidArgument(format!("{what}不合法: {s:?}")));
    }
    Ok(())
}

/// 保存在本地目录中的文件存储
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
    base_url: String,
}

impl FsBlobStore {
    /// `base_url` 为服务对外的地址，文件地址为 `{base_url}/blob/{key}`
    pub fn new(root: impl Into<PathBuf>, base_url: &str) -> Self {
        Self { root: root.into(), base_url: base_url.trim_end_matches('/').to_owned() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, key: &str) -> Result<PathBuf> {
        let rel = Path::new(key);
        if key.is_empty() || !rel.components().all(|c| matches!(c, Component::Normal(_))) {
            return Err(Error::InvalidArgument(format!("文件 key 不合法: {key:?}")));
        }
        Ok(self.root.join(rel))
    }
}

impl BlobStore for FsBlobStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| Error::upstream("文件存储", e))?;
        }
        fs::write(&path, bytes).await.map_err(|e| Error::upstream("文件存储", e))?;
        debug!("写入文件 {}，大小 {} 字节", path.display(), bytes.len());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.path(key)?).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::upstream("文件存储", e)),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path(key)?).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::upstream("文件存储", e)),
        }
    }

    fn url(&self, key: &str) -> String {
        format!("{}/blob/{}", self.base_url, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_key() {
        assert_eq!(blob_key("sku-1", "front.jpg").unwrap(), "sku-1/front.jpg");
        assert!(blob_key("", "a.jpg").is_err());
        assert!(blob_key("..", "a.jpg").is_err());
        assert!(blob_key("a", "../b.jpg").is_err());
        assert!(blob_key("a/b", "c.jpg").is_err());
    }

    #[test]
    fn test_url() {
        let store = FsBlobStore::new("/tmp", "http://localhost:8000/");
        assert_eq!(store.url("a/b.jpg"), "http://localhost:8000/blob/a/b.jpg");
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path(), "");

        store.put("a/b.jpg", b"hello").await.unwrap();
        assert_eq!(store.get("a/b.jpg").await.unwrap().as_deref(), Some(&b"hello"[..]));

        store.delete("a/b.jpg").await.unwrap();
        assert_eq!(store.get("a/b.jpg").await.unwrap(), None);
        // 重复删除不报错
        store.delete("a/b.jpg").await.unwrap();
    }

    #[tokio::test]
    async fn test_reject_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path(), "");
        assert!(matches!(store.get("../etc/passwd").await, Err(Error::InvalidArgument(_))));
        assert!(matches!(store.put("/abs", b"x").await, Err(Error::InvalidArgument(_))));
    }
}
