//! Media HTTP Handler
//!
//! 语音桥通过此接口拉取条目音频

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::Response,
};
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use crate::application::GetMedia;
use crate::domain::queue::EntryId;
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// 流式下载条目媒体
pub async fn download_media(
    State(state): State<Arc<AppState>>,
    Path(entry_id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let entry_id = EntryId::from_uuid(entry_id);
    let media = state.get_media_handler.handle(GetMedia { entry_id }).await?;

    let file = match tokio::fs::File::open(&media.path).await {
        Ok(file) => file,
        // 播放结束后媒体可能已被清理
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::NotFound(format!("Media not found: {}", entry_id)));
        }
        Err(e) => return Err(ApiError::Internal(format!("Failed to open media: {}", e))),
    };

    let body = Body::from_stream(ReaderStream::new(file));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, media.format.mime_type())
        .header(header::CONTENT_LENGTH, media.size_bytes)
        .header(
            header::CONTENT_DISPOSITION,
            format!("inline; filename=\"{}.{}\"", entry_id, media.format.extension()),
        )
        .body(body)
        .map_err(|e| ApiError::Internal(format!("Failed to build response: {}", e)))
}
