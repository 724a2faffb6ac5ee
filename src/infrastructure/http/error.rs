//! HTTP Error Handling
//!
//! 错误按类别映射为真实的 HTTP 状态码，响应体为 `{errno, kind, error}`

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::application::ApplicationError;

/// 统一错误响应格式
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub errno: i32,
    pub kind: &'static str,
    pub error: String,
    pub data: Option<()>,
}

impl ErrorResponse {
    pub fn new(errno: i32, kind: &'static str, error: impl Into<String>) -> Self {
        Self {
            errno,
            kind,
            error: error.into(),
            data: None,
        }
    }
}

/// API 错误
#[derive(Debug)]
pub enum ApiError {
    /// 请求格式错误（非 multipart、缺字段、超限等）
    BadRequest(String),
    /// 条目元数据无效或音频无法解码
    InvalidEntry(String),
    OutOfRange(String),
    NotFound(String),
    /// 目的地空闲，无法跳过
    Idle(String),
    ShuttingDown(String),
    /// 存储失败，可重试
    Storage(String),
    Internal(String),
}

impl ApiError {
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::InvalidEntry(_) => "invalid_entry",
            ApiError::OutOfRange(_) => "out_of_range",
            ApiError::NotFound(_) => "not_found",
            ApiError::Idle(_) => "idle",
            ApiError::ShuttingDown(_) => "shutting_down",
            ApiError::Storage(_) => "storage_failure",
            ApiError::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::InvalidEntry(_) | ApiError::OutOfRange(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Idle(_) => StatusCode::CONFLICT,
            ApiError::ShuttingDown(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Storage(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::InvalidEntry(msg)
            | ApiError::OutOfRange(msg)
            | ApiError::NotFound(msg)
            | ApiError::Idle(msg)
            | ApiError::ShuttingDown(msg)
            | ApiError::Storage(msg)
            | ApiError::Internal(msg) => msg,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let errno = status.as_u16() as i32;
        let kind = self.kind();

        if status.is_server_error() {
            tracing::error!(errno, kind, error = %self.message(), "Request failed");
        } else {
            tracing::warn!(errno, kind, error = %self.message(), "Request rejected");
        }

        let body = ErrorResponse::new(errno, kind, self.message());
        (status, Json(body)).into_response()
    }
}

impl From<ApplicationError> for ApiError {
    fn from(e: ApplicationError) -> Self {
        let message = e.to_string();
        match e {
            ApplicationError::NotFound { .. } => ApiError::NotFound(message),
            ApplicationError::ValidationError(msg) => ApiError::BadRequest(msg),
            ApplicationError::InvalidEntry(msg) => ApiError::InvalidEntry(msg),
            ApplicationError::OutOfRange { .. } => ApiError::OutOfRange(message),
            ApplicationError::Idle(msg) => ApiError::Idle(msg),
            ApplicationError::ShuttingDown => ApiError::ShuttingDown(message),
            ApplicationError::StorageError(msg) => ApiError::Storage(msg),
            ApplicationError::InternalError(msg) => ApiError::Internal(msg),
        }
    }
}

/// 请求体不是合法 JSON 或缺少字段
impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::BadRequest(format!("Invalid JSON body: {}", e.body_text()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::queue::{EntryId, QueueError};

    fn api_error(err: QueueError) -> ApiError {
        ApplicationError::from(err).into()
    }

    #[test]
    fn test_queue_errors_map_to_status() {
        let cases = [
            (QueueError::InvalidEntry("bad".into()), StatusCode::BAD_REQUEST, "invalid_entry"),
            (QueueError::NotFound(EntryId::new()), StatusCode::NOT_FOUND, "not_found"),
            (
                QueueError::OutOfRange { index: 5, len: 2 },
                StatusCode::BAD_REQUEST,
                "out_of_range",
            ),
            (QueueError::Idle, StatusCode::CONFLICT, "idle"),
            (QueueError::ShuttingDown, StatusCode::SERVICE_UNAVAILABLE, "shutting_down"),
            (
                QueueError::StorageFailure("disk".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
                "storage_failure",
            ),
        ];

        for (err, status, kind) in cases {
            let kind_from_domain = err.kind();
            let api = api_error(err);
            assert_eq!(api.status(), status);
            assert_eq!(api.kind(), kind);
            assert_eq!(api.kind(), kind_from_domain);
        }
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let response = ApiError::Idle("nothing is playing".into()).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["errno"], 409);
        assert_eq!(json["kind"], "idle");
        assert_eq!(json["error"], "nothing is playing");
        assert!(json["data"].is_null());
    }
}
