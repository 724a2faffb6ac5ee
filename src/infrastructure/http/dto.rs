//! Data Transfer Objects

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::EnqueueReceipt;
use crate::domain::queue::{DestinationId, EntryId};

use super::error::ApiError;

// ============================================================================
// 统一响应结构
// ============================================================================

/// 统一 API 响应格式
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub errno: i32,
    pub error: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    /// 成功响应
    pub fn success(data: T) -> Self {
        Self {
            errno: 0,
            error: String::new(),
            data: Some(data),
        }
    }
}

/// 空数据响应
#[derive(Debug, Serialize)]
pub struct Empty {}

impl ApiResponse<Empty> {
    /// 成功但无数据
    pub fn ok() -> Self {
        Self::success(Empty {})
    }
}

// ============================================================================
// Queue DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct DestinationRequest {
    pub destination_id: String,
}

#[derive(Debug, Deserialize)]
pub struct RemoveEntryRequest {
    pub destination_id: String,
    pub entry_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct ReorderEntryRequest {
    pub destination_id: String,
    pub entry_id: Uuid,
    pub new_index: usize,
}

/// 上传确认
#[derive(Debug, Serialize)]
pub struct UploadAck {
    pub entry_id: EntryId,
    pub destination_id: DestinationId,
    pub position: usize,
    pub state: &'static str,
}

impl From<EnqueueReceipt> for UploadAck {
    fn from(receipt: EnqueueReceipt) -> Self {
        Self {
            entry_id: receipt.entry_id,
            destination_id: receipt.destination_id,
            position: receipt.position,
            state: receipt.state.as_str(),
        }
    }
}

/// 解析请求中的目的地标识
pub fn parse_destination(raw: &str) -> Result<DestinationId, ApiError> {
    DestinationId::new(raw).map_err(|e| ApiError::BadRequest(e.to_string()))
}
