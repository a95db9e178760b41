use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use log::info;
use sqlx::{SqlitePool, sqlite::*};

pub mod crud;
pub mod model;

pub use model::*;

use crate::error::Result;

pub type Database = SqlitePool;

pub async fn init_db(filename: impl AsRef<Path>) -> Result<Database> {
    let filename = filename.as_ref();
    info!("初始化数据库连接: {}", filename.display());

    let options = SqliteConnectOptions::new()
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .filename(filename)
        .create_if_missing(true);

    let pool = SqlitePool::connect_with(options).await?;

    info!("检查数据库迁移");
    sqlx::migrate!().run(&pool).await?;

    Ok(pool)
}

/// 物品和图片的持久化存储
///
/// 索引只通过这里的只读接口观察数据，增删操作的效果在下一次重建时体现
pub trait Ledger: Send + Sync {
    /// 所有带描述符的图片，顺序固定
    fn list_image_descriptors(&self) -> impl Future<Output = Result<Vec<DescriptorRecord>>> + Send;

    /// 所有物品
    fn list_items(&self) -> impl Future<Output = Result<Vec<ItemSummary>>> + Send;
}

impl<L: Ledger> Ledger for Arc<L> {
    fn list_image_descriptors(&self) -> impl Future<Output = Result<Vec<DescriptorRecord>>> + Send {
        self.as_ref().list_image_descriptors()
    }

    fn list_items(&self) -> impl Future<Output = Result<Vec<ItemSummary>>> + Send {
        self.as_ref().list_items()
    }
}

/// 基于 SQLite 的 Ledger
#[derive(Debug, Clone)]
pub struct SqliteLedger {
    pool: Database,
}

impl SqliteLedger {
    pub async fn open(filename: impl AsRef<Path>) -> Result<Self> {
        Ok(Self { pool: init_db(filename).await? })
    }

    pub fn pool(&self) -> &Database {
        &self.pool
    }

    /// 在同一个事务中创建（或更新）物品并写入图片记录
    pub async fn add_image(
        &self,
        item: NewItem<'_>,
        filename: &str,
        blob_key: &str,
        hash: &[u8],
        vector: &[u8],
    ) -> Result<(ItemRecord, i64)> {
        let mut tx = self.pool.begin().await?;
        let record = crud::upsert_item(&mut *tx, item.id, item.name, item.meta_text).await?;
        let image_id = crud::add_image(&mut *tx, item.id, filename, blob_key, hash, vector).await?;
        tx.commit().await?;
        Ok((record, image_id))
    }

    pub async fn delete_image(&self, item_id: &str, filename: &str) -> Result<Option<String>> {
        Ok(crud::delete_image(&self.pool, item_id, filename).await?)
    }

    pub async fn delete_item(&self, item_id: &str) -> Result<Option<Vec<String>>> {
        Ok(crud::delete_item(&self.pool, item_id).await?)
    }

    pub async fn update_meta(&self, item_id: &str, meta_text: &str) -> Result<bool> {
        Ok(crud::update_meta(&self.pool, item_id, meta_text).await?)
    }

    pub async fn recent_items(&self, limit: usize) -> Result<Vec<ItemSummary>> {
        Ok(crud::recent_items(&self.pool, limit).await?)
    }

    pub async fn item_images(&self, item_id: &str) -> Result<Vec<ImageRecord>> {
        Ok(crud::item_images(&self.pool, item_id).await?)
    }

    pub async fn find_image(&self, item_id: &str, filename: &str) -> Result<Option<ImageRecord>> {
        Ok(crud::find_image(&self.pool, item_id, filename).await?)
    }

    pub async fn get_image(&self, id: i64) -> Result<Option<ImageRecord>> {
        Ok(crud::get_image(&self.pool, id).await?)
    }
}

impl Ledger for SqliteLedger {
    async fn list_image_descriptors(&self) -> Result<Vec<DescriptorRecord>> {
        Ok(crud::list_descriptors(&self.pool).await?)
    }

    async fn list_items(&self) -> Result<Vec<ItemSummary>> {
        Ok(crud::list_items(&self.pool).await?)
    }
}

/// 上传图片时附带的物品信息
#[derive(Debug, Clone, Copy)]
pub struct NewItem<'a> {
    pub id: &'a str,
    pub name: Option<&'a str>,
    pub meta_text: Option<&'a str>,
}
