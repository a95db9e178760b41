use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use log::error;
use serde_json::json;

use crate::error::Error;

pub type Result<T, E = AppError> = std::result::Result<T, E>;

/// API错误类型
pub struct AppError(pub anyhow::Error);

impl AppError {
    fn status(&self) -> StatusCode {
        match self.0.downcast_ref::<Error>() {
            Some(Error::DimensionMismatch { .. })
            | Some(Error::UnreadableImage(_))
            | Some(Error::InvalidArgument(_)) => StatusCode::BAD_REQUEST,
            Some(Error::NotFound(_)) => StatusCode::NOT_FOUND,
            Some(Error::Unauthorized) => StatusCode::UNAUTHORIZED,
            Some(Error::UpstreamUnavailable { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("请求处理失败: {:#}", self.0);
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(err: Error) -> StatusCode {
        AppError::from(err).into_response().status()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status(Error::DimensionMismatch { expected: 2, got: 3 }), StatusCode::BAD_REQUEST);
        assert_eq!(status(Error::UnreadableImage("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status(Error::InvalidArgument("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status(Error::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(status(Error::Unauthorized), StatusCode::UNAUTHORIZED);
        assert_eq!(status(Error::upstream("数据库", "closed")), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            status(Error::Decode { image_id: 1, reason: "x".into() }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError(anyhow::anyhow!("boom")).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
