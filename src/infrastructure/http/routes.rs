//! HTTP Routes
//!
//! API Endpoints:
//! - /upload                  POST  上传音频并入队（multipart，202）
//! - /api/ping                GET   健康检查
//! - /api/queue/list          GET   所有目的地的队列快照
//! - /api/queue/get           POST  单个目的地的快照
//! - /api/queue/remove        POST  移除待播条目
//! - /api/queue/skip          POST  跳过当前播放
//! - /api/queue/reorder       POST  调整待播条目位置
//! - /api/queue/resume        POST  恢复空闲队列
//! - /api/media/{entry_id}    GET   下载条目媒体（语音桥拉流）
//! - /api/voice/events        POST  语音桥事件回调
//! - /ws/events               WS    全部队列事件
//! - /ws/queue/{destination}  WS    单个目的地的队列事件

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

/// 创建所有路由
pub fn create_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/upload", post(handlers::upload_audio))
        .nest("/api", api_routes())
        .route("/ws/events", get(handlers::global_websocket_handler))
        .route(
            "/ws/queue/:destination_id",
            get(handlers::destination_websocket_handler),
        )
}

/// API 路由
fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ping", get(handlers::ping))
        .nest("/queue", queue_routes())
        .route("/media/:entry_id", get(handlers::download_media))
        .route("/voice/events", post(handlers::voice_event_callback))
}

/// Queue 路由
fn queue_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/list", get(handlers::list_queues))
        .route("/get", post(handlers::get_queue))
        .route("/remove", post(handlers::remove_entry))
        .route("/skip", post(handlers::skip_current))
        .route("/reorder", post(handlers::reorder_entry))
        .route("/resume", post(handlers::resume_queue))
}
