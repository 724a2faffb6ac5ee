//! Queue Context - Errors

use thiserror::Error;

use super::EntryId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// 上传元数据无效或媒体不可达，条目不会进入队列
    #[error("无效的队列条目: {0}")]
    InvalidEntry(String),

    #[error("队列条目不存在: {0}")]
    NotFound(EntryId),

    #[error("目标位置越界: {index} (队列长度 {len})")]
    OutOfRange { index: usize, len: usize },

    /// 当前没有正在播放的条目
    #[error("目的地当前空闲")]
    Idle,

    #[error("服务正在关闭，不再接受新条目")]
    ShuttingDown,

    /// 影子副本写入失败，可重试
    #[error("存储失败: {0}")]
    StorageFailure(String),
}

impl QueueError {
    /// 错误类别（用于 HTTP 响应体）
    pub fn kind(&self) -> &'static str {
        match self {
            QueueError::InvalidEntry(_) => "invalid_entry",
            QueueError::NotFound(_) => "not_found",
            QueueError::OutOfRange { .. } => "out_of_range",
            QueueError::Idle => "idle",
            QueueError::ShuttingDown => "shutting_down",
            QueueError::StorageFailure(_) => "storage_failure",
        }
    }
}
