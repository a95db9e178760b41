mod api;
mod error;
mod state;
mod types;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use tower_http::limit::RequestBodyLimitLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use self::state::*;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::root_handler,
        api::upload_handler,
        api::query_handler,
        api::delete_item_handler,
        api::delete_image_handler,
        api::update_meta_handler,
        api::list_items_handler,
        api::recent_items_handler,
        api::image_url_handler,
        api::item_images_handler,
        api::status_handler,
        api::rebuild_handler,
    ),
    components(schemas(types::UploadForm, types::QueryForm))
)]
pub struct ApiDoc;

/// 构建API服务器
pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(api::root_handler))
        .route("/upload", post(api::upload_handler))
        .route("/query", post(api::query_handler))
        .route("/item/{item_id}", delete(api::delete_item_handler))
        .route("/item/{item_id}/metadata", post(api::update_meta_handler))
        .route(
            "/item_image/{item_id}/{filename}",
            get(api::image_url_handler).delete(api::delete_image_handler),
        )
        .route("/item_images/{item_id}", get(api::item_images_handler))
        .route("/items", get(api::list_items_handler))
        .route("/items/recent", get(api::recent_items_handler))
        .route("/status", get(api::status_handler))
        .route("/rebuild", post(api::rebuild_handler))
        .route("/blob/{*key}", get(api::blob_handler))
        .route("/metrics", get(api::metrics_handler))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::disable())
        // 上传限制：10M
        .layer(RequestBodyLimitLayer::new(1024 * 1024 * 10))
        .with_state(state)
}
