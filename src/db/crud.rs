use sqlx::{Executor, Result, Sqlite, SqlitePool};

use super::{DescriptorRecord, ImageRecord, ItemRecord, ItemSummary};

/// 创建物品，如果已存在则只更新附加信息
///
/// 新物品的名称为空时使用物品 ID 代替
pub async fn upsert_item<'c, E>(
    executor: E,
    id: &str,
    name: Option<&str>,
    meta_text: Option<&str>,
) -> Result<ItemRecord>
where
    E: Executor<'c, Database = Sqlite>,
{
    sqlx::query_as::<_, ItemRecord>(
        r#"
        INSERT INTO item (id, name, meta_text)
        VALUES (?1, COALESCE(?2, ?1), ?3)
        ON CONFLICT (id) DO UPDATE SET meta_text = COALESCE(excluded.meta_text, item.meta_text)
        RETURNING id, name, meta_text, created_at
        "#,
    )
    .bind(id)
    .bind(name)
    .bind(meta_text)
    .fetch_one(executor)
    .await
}

/// 添加图片记录，同一物品下的同名文件会被覆盖
pub async fn add_image<'c, E>(
    executor: E,
    item_id: &str,
    filename: &str,
    blob_key: &str,
    hash: &[u8],
    vector: &[u8],
) -> Result<i64>
where
    E: Executor<'c, Database = Sqlite>,
{
    sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO image (item_id, filename, blob_key, hash, vector)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT (item_id, filename) DO UPDATE SET
            blob_key = excluded.blob_key,
            hash = excluded.hash,
            vector = excluded.vector,
            created_at = excluded.created_at
        RETURNING id
        "#,
    )
    .bind(item_id)
    .bind(filename)
    .bind(blob_key)
    .bind(hash)
    .bind(vector)
    .fetch_one(executor)
    .await
}

/// 删除单张图片，返回其文件 key
pub async fn delete_image(
    executor: &SqlitePool,
    item_id: &str,
    filename: &str,
) -> Result<Option<String>> {
    sqlx::query_scalar::<_, String>(
        r#"
        DELETE FROM image WHERE item_id = ? AND filename = ?
        RETURNING blob_key
        "#,
    )
    .bind(item_id)
    .bind(filename)
    .fetch_optional(executor)
    .await
}

/// 删除物品及其所有图片，返回被删除图片的文件 key
///
/// 物品和图片都不存在时返回 None
pub async fn delete_item(executor: &SqlitePool, item_id: &str) -> Result<Option<Vec<String>>> {
    let mut tx = executor.begin().await?;
    let keys = sqlx::query_scalar::<_, String>(
        r#"
        DELETE FROM image WHERE item_id = ?
        RETURNING blob_key
        "#,
    )
    .bind(item_id)
    .fetch_all(&mut *tx)
    .await?;
    let deleted = sqlx::query(r#"DELETE FROM item WHERE id = ?"#)
        .bind(item_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    tx.commit().await?;

    if deleted == 0 && keys.is_empty() { Ok(None) } else { Ok(Some(keys)) }
}

/// 更新物品附加信息，物品不存在时返回 false
pub async fn update_meta(executor: &SqlitePool, item_id: &str, meta_text: &str) -> Result<bool> {
    let result = sqlx::query(r#"UPDATE item SET meta_text = ? WHERE id = ?"#)
        .bind(meta_text)
        .bind(item_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// 按创建时间升序列出所有物品
pub async fn list_items(executor: &SqlitePool) -> Result<Vec<ItemSummary>> {
    sqlx::query_as::<_, ItemSummary>(
        r#"
        SELECT item.id, item.name, item.meta_text, item.created_at,
            (SELECT blob_key FROM image WHERE image.item_id = item.id ORDER BY image.id LIMIT 1)
                AS preview_key
        FROM item
        ORDER BY item.created_at ASC, item.rowid ASC
        "#,
    )
    .fetch_all(executor)
    .await
}

/// 列出最近创建的物品
pub async fn recent_items(executor: &SqlitePool, limit: usize) -> Result<Vec<ItemSummary>> {
    let limit = limit as i64;
    sqlx::query_as::<_, ItemSummary>(
        r#"
        SELECT item.id, item.name, item.meta_text, item.created_at,
            (SELECT blob_key FROM image WHERE image.item_id = item.id ORDER BY image.id LIMIT 1)
                AS preview_key
        FROM item
        ORDER BY item.created_at DESC, item.rowid DESC
        LIMIT ?
        "#,
    )
    .bind(limit)
    .fetch_all(executor)
    .await
}

pub async fn item_images(executor: &SqlitePool, item_id: &str) -> Result<Vec<ImageRecord>> {
    sqlx::query_as::<_, ImageRecord>(
        r#"
        SELECT id, item_id, filename, blob_key, hash, created_at
        FROM image WHERE item_id = ? ORDER BY id
        "#,
    )
    .bind(item_id)
    .fetch_all(executor)
    .await
}

pub async fn find_image(
    executor: &SqlitePool,
    item_id: &str,
    filename: &str,
) -> Result<Option<ImageRecord>> {
    sqlx::query_as::<_, ImageRecord>(
        r#"
        SELECT id, item_id, filename, blob_key, hash, created_at
        FROM image WHERE item_id = ? AND filename = ?
        "#,
    )
    .bind(item_id)
    .bind(filename)
    .fetch_optional(executor)
    .await
}

/// 根据图片 ID 获取图片记录
pub async fn get_image(executor: &SqlitePool, id: i64) -> Result<Option<ImageRecord>> {
    sqlx::query_as::<_, ImageRecord>(
        r#"
        SELECT id, item_id, filename, blob_key, hash, created_at
        FROM image WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(executor)
    .await
}

/// 获取所有带描述符的图片，按图片 ID 升序
pub async fn list_descriptors(executor: &SqlitePool) -> Result<Vec<DescriptorRecord>> {
    sqlx::query_as::<_, DescriptorRecord>(
        r#"
        SELECT id, item_id, vector FROM image
        WHERE vector IS NOT NULL
        ORDER BY id ASC
        "#,
    )
    .fetch_all(executor)
    .await
}
