//! Voice Bridge Callback Handler
//!
//! 外部语音桥上报播放结果，转发给队列引擎的事件通道

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use std::sync::Arc;

use crate::application::VoiceEvent;
use crate::infrastructure::http::dto::{ApiResponse, Empty};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// 接收语音桥事件
pub async fn voice_event_callback(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<VoiceEvent>, JsonRejection>,
) -> Result<Json<ApiResponse<Empty>>, ApiError> {
    let Json(event) = payload?;
    tracing::debug!(
        destination_id = %event.destination_id,
        session_id = ?event.session_id,
        kind = ?event.kind,
        "Voice bridge event received"
    );

    state
        .voice_events
        .send(event)
        .await
        .map_err(|_| ApiError::ShuttingDown("Voice event loop has stopped".to_string()))?;

    Ok(Json(ApiResponse::ok()))
}
