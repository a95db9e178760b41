use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum_auth::AuthBearer;
use axum_typed_multipart::TypedMultipart;
use log::info;

use super::error::Result;
use super::state::AppState;
use super::types::*;
use crate::db::NewItem;
use crate::error::Error;
use crate::index::IndexStatus;
use crate::{metrics, utils};

/// 检查服务是否运行
#[utoipa::path(get, path = "/", responses((status = 200, body = MessageResponse)))]
pub async fn root_handler() -> Json<MessageResponse> {
    Json(MessageResponse { message: "imgrec is running".to_owned() })
}

/// 上传一张物品图片
#[utoipa::path(
    post,
    path = "/upload",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, body = UploadResponse),
    )
)]
pub async fn upload_handler(
    State(state): State<Arc<AppState>>,
    AuthBearer(token): AuthBearer,
    TypedMultipart(data): TypedMultipart<UploadRequest>,
) -> Result<Json<UploadResponse>> {
    state.authorize(&token)?;

    let Some(filename) = data.file.metadata.file_name.clone() else {
        return Err(Error::InvalidArgument("文件名不能为空".to_owned()).into());
    };
    let item = NewItem {
        id: &data.item_id,
        name: data.item_name.as_deref(),
        meta_text: data.meta_text.as_deref(),
    };

    info!("上传图片 {}/{}", data.item_id, filename);
    let uploaded = state.catalog.upload(item, &filename, data.file.contents.to_vec()).await?;

    Ok(Json(UploadResponse {
        meta_text: uploaded.item.meta_text.clone(),
        item: uploaded.item,
        filename,
        blob_key: uploaded.blob_key,
        url: uploaded.url,
    }))
}

/// 搜索与图片最相似的物品
#[utoipa::path(
    post,
    path = "/query",
    request_body(content = QueryForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, body = QueryResponse),
    )
)]
pub async fn query_handler(
    State(state): State<Arc<AppState>>,
    TypedMultipart(data): TypedMultipart<QueryRequest>,
) -> Result<Json<QueryResponse>> {
    let topk = data.topk.unwrap_or(state.topk);
    let matches = state.catalog.query(data.file.contents.to_vec(), topk).await?;
    Ok(Json(QueryResponse { matches }))
}

/// 删除物品及其所有图片
#[utoipa::path(
    delete,
    path = "/item/{item_id}",
    responses((status = 200, body = DeleteResponse), (status = 404))
)]
pub async fn delete_item_handler(
    State(state): State<Arc<AppState>>,
    AuthBearer(token): AuthBearer,
    Path(item_id): Path<String>,
) -> Result<Json<DeleteResponse>> {
    state.authorize(&token)?;
    state.catalog.delete_item(&item_id).await?;
    Ok(Json(DeleteResponse { item_id, filename: None }))
}

/// 删除物品中的一张图片
#[utoipa::path(
    delete,
    path = "/item_image/{item_id}/{filename}",
    responses((status = 200, body = DeleteResponse), (status = 404))
)]
pub async fn delete_image_handler(
    State(state): State<Arc<AppState>>,
    AuthBearer(token): AuthBearer,
    Path((item_id, filename)): Path<(String, String)>,
) -> Result<Json<DeleteResponse>> {
    state.authorize(&token)?;
    state.catalog.delete_image(&item_id, &filename).await?;
    Ok(Json(DeleteResponse { item_id, filename: Some(filename) }))
}

/// 更新物品附加信息
#[utoipa::path(
    post,
    path = "/item/{item_id}/metadata",
    request_body = MetaRequest,
    responses((status = 200, body = MetaResponse), (status = 404))
)]
pub async fn update_meta_handler(
    State(state): State<Arc<AppState>>,
    AuthBearer(token): AuthBearer,
    Path(item_id): Path<String>,
    Json(data): Json<MetaRequest>,
) -> Result<Json<MetaResponse>> {
    state.authorize(&token)?;
    state.catalog.update_meta(&item_id, &data.meta_text).await?;
    Ok(Json(MetaResponse { item_id, meta_text: data.meta_text }))
}

/// 按创建时间升序列出所有物品
#[utoipa::path(get, path = "/items", responses((status = 200, body = ItemsResponse)))]
pub async fn list_items_handler(State(state): State<Arc<AppState>>) -> Result<Json<ItemsResponse>> {
    let items = state.catalog.list_items().await?;
    Ok(Json(ItemsResponse { items }))
}

/// 列出最近创建的物品
#[utoipa::path(
    get,
    path = "/items/recent",
    params(("limit" = Option<usize>, Query, description = "返回的物品数量，默认为 3")),
    responses((status = 200, body = ItemsResponse))
)]
pub async fn recent_items_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RecentQuery>,
) -> Result<Json<ItemsResponse>> {
    let items = state.catalog.recent_items(query.limit.unwrap_or(3)).await?;
    Ok(Json(ItemsResponse { items }))
}

/// 获取单张图片的地址
#[utoipa::path(
    get,
    path = "/item_image/{item_id}/{filename}",
    responses((status = 200, body = ImageUrlResponse), (status = 404))
)]
pub async fn image_url_handler(
    State(state): State<Arc<AppState>>,
    Path((item_id, filename)): Path<(String, String)>,
) -> Result<Json<ImageUrlResponse>> {
    let url = state.catalog.image_url(&item_id, &filename).await?;
    Ok(Json(ImageUrlResponse { url }))
}

/// 获取物品所有图片的地址
#[utoipa::path(
    get,
    path = "/item_images/{item_id}",
    responses((status = 200, body = ImagesResponse))
)]
pub async fn item_images_handler(
    State(state): State<Arc<AppState>>,
    Path(item_id): Path<String>,
) -> Result<Json<ImagesResponse>> {
    let images = state.catalog.item_images(&item_id).await?;
    Ok(Json(ImagesResponse { images }))
}

/// 获取索引状态
#[utoipa::path(get, path = "/status", responses((status = 200, body = IndexStatus)))]
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Json<IndexStatus> {
    Json(state.catalog.status().await)
}

/// 从数据库重建索引
#[utoipa::path(
    post,
    path = "/rebuild",
    responses((status = 200, body = IndexStatus))
)]
pub async fn rebuild_handler(
    State(state): State<Arc<AppState>>,
    AuthBearer(token): AuthBearer,
) -> Result<Json<IndexStatus>> {
    state.authorize(&token)?;
    state.catalog.rebuild().await?;
    Ok(Json(state.catalog.status().await))
}

/// 读取图片文件
pub async fn blob_handler(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse> {
    let bytes = state.catalog.read_blob(&key).await?;
    Ok(([(header::CONTENT_TYPE, utils::guess_mime(&key))], bytes))
}

/// prometheus 指标
pub async fn metrics_handler() -> Result<String> {
    Ok(metrics::gather_text()?)
}
