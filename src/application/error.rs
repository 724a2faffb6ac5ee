//! 应用层错误定义
//!
//! 统一的命令/查询错误类型

use thiserror::Error;

use crate::domain::queue::QueueError;

/// 应用层错误
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// 资源未找到
    #[error("{resource_type} not found: {id}")]
    NotFound {
        resource_type: &'static str,
        id: String,
    },

    /// 请求校验失败（上传格式、大小等）
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// 条目元数据无效或媒体不可达
    #[error("Invalid entry: {0}")]
    InvalidEntry(String),

    #[error("Index {index} out of range (queue length {len})")]
    OutOfRange { index: usize, len: usize },

    /// 目的地当前没有播放
    #[error("Destination is idle: {0}")]
    Idle(String),

    #[error("Service is shutting down")]
    ShuttingDown,

    /// 存储失败，调用方可重试
    #[error("Storage error: {0}")]
    StorageError(String),

    /// 内部错误
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ApplicationError {
    /// 创建 NotFound 错误
    pub fn not_found(resource_type: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource_type,
            id: id.to_string(),
        }
    }

    /// 创建验证错误
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }

    /// 创建内部错误
    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError(message.into())
    }
}

impl From<QueueError> for ApplicationError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::InvalidEntry(msg) => Self::InvalidEntry(msg),
            QueueError::NotFound(id) => Self::not_found("Queue entry", id),
            QueueError::OutOfRange { index, len } => Self::OutOfRange { index, len },
            QueueError::Idle => Self::Idle("nothing is playing".to_string()),
            QueueError::ShuttingDown => Self::ShuttingDown,
            QueueError::StorageFailure(msg) => Self::StorageError(msg),
        }
    }
}

impl From<crate::application::ports::MediaStorageError> for ApplicationError {
    fn from(err: crate::application::ports::MediaStorageError) -> Self {
        Self::StorageError(err.to_string())
    }
}
