//! WebSocket Handlers
//!
//! 桌面客户端的实时队列视图：推送 `QueueEvent` JSON

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::infrastructure::events::QueueEvent;
use crate::infrastructure::http::dto::parse_destination;
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// 全局 WebSocket（所有目的地的事件）
pub async fn global_websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let events = state.event_publisher.subscribe_global();
    ws.on_upgrade(move |socket| async move {
        tracing::info!("Global WebSocket connected");
        pump_events(socket, events, "*").await;
        tracing::info!("Global WebSocket disconnected");
    })
}

/// 单个目的地的 WebSocket
pub async fn destination_websocket_handler(
    ws: WebSocketUpgrade,
    Path(destination_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let destination_id = parse_destination(&destination_id)?;
    let events = state.event_publisher.subscribe_destination(&destination_id);

    Ok(ws.on_upgrade(move |socket| async move {
        tracing::info!(destination_id = %destination_id, "WebSocket connected");
        pump_events(socket, events, destination_id.as_str()).await;

        state.event_publisher.release_destination(&destination_id);
        tracing::info!(destination_id = %destination_id, "WebSocket disconnected");
    }))
}

/// 转发事件直到任一方向结束
async fn pump_events(socket: WebSocket, mut events: broadcast::Receiver<QueueEvent>, scope: &str) {
    let (mut sender, mut receiver) = socket.split();
    let scope = scope.to_string();
    let forward_scope = scope.clone();

    let mut forward_task = tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(scope = %forward_scope, skipped, "WebSocket observer lagged");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            let msg = match serde_json::to_string(&event) {
                Ok(json) => Message::Text(json),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to serialize event");
                    continue;
                }
            };

            if let Err(e) = sender.send(msg).await {
                tracing::debug!(scope = %forward_scope, error = %e, "Failed to send WebSocket message");
                break;
            }
        }
    });

    // 客户端只发心跳，ping/pong 由 axum 处理
    let mut receive_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Close(_)) => {
                    tracing::debug!(scope = %scope, "WebSocket closed by client");
                    break;
                }
                Err(e) => {
                    tracing::debug!(scope = %scope, error = %e, "WebSocket error");
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut forward_task => receive_task.abort(),
        _ = &mut receive_task => {
            // 等待转发任务释放订阅
            forward_task.abort();
            let _ = forward_task.await;
        }
    }
}
