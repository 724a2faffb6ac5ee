//! Queue HTTP Handlers
//!
//! 操作员查看与编辑队列

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use std::sync::Arc;

use crate::application::{GetQueue, ListQueues, RemoveEntry, ReorderEntry, ResumeQueue, SkipCurrent};
use crate::domain::queue::{DestinationSnapshot, EntryId};
use crate::infrastructure::http::dto::{
    parse_destination, ApiResponse, DestinationRequest, Empty, RemoveEntryRequest,
    ReorderEntryRequest,
};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// 列出所有目的地
pub async fn list_queues(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<DestinationSnapshot>>>, ApiError> {
    let snapshots = state.list_queues_handler.handle(ListQueues).await?;
    Ok(Json(ApiResponse::success(snapshots)))
}

/// 获取目的地快照
pub async fn get_queue(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<DestinationRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<DestinationSnapshot>>, ApiError> {
    let Json(req) = payload?;
    let query = GetQueue {
        destination_id: parse_destination(&req.destination_id)?,
    };

    let snapshot = state.get_queue_handler.handle(query).await?;
    Ok(Json(ApiResponse::success(snapshot)))
}

/// 移除待播条目
pub async fn remove_entry(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RemoveEntryRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<Empty>>, ApiError> {
    let Json(req) = payload?;
    let command = RemoveEntry {
        destination_id: parse_destination(&req.destination_id)?,
        entry_id: EntryId::from_uuid(req.entry_id),
    };

    state.remove_entry_handler.handle(command).await?;
    Ok(Json(ApiResponse::ok()))
}

/// 跳过当前播放
pub async fn skip_current(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<DestinationRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<Empty>>, ApiError> {
    let Json(req) = payload?;
    let command = SkipCurrent {
        destination_id: parse_destination(&req.destination_id)?,
    };

    state.skip_current_handler.handle(command).await?;
    Ok(Json(ApiResponse::ok()))
}

/// 调整条目位置
pub async fn reorder_entry(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ReorderEntryRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<Empty>>, ApiError> {
    let Json(req) = payload?;
    let command = ReorderEntry {
        destination_id: parse_destination(&req.destination_id)?,
        entry_id: EntryId::from_uuid(req.entry_id),
        new_index: req.new_index,
    };

    state.reorder_entry_handler.handle(command).await?;
    Ok(Json(ApiResponse::ok()))
}

/// 恢复空闲队列
pub async fn resume_queue(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<DestinationRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<Empty>>, ApiError> {
    let Json(req) = payload?;
    let command = ResumeQueue {
        destination_id: parse_destination(&req.destination_id)?,
    };

    state.resume_queue_handler.handle(command).await?;
    Ok(Json(ApiResponse::ok()))
}
