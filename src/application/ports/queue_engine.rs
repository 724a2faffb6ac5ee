//! Queue Engine Port - 入站端口
//!
//! 队列引擎对外暴露的操作，具体实现在 infrastructure/queue

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::queue::{
    DestinationId, DestinationSnapshot, EntryId, QueueEntry, QueueError, QueueState,
};

/// 入队回执
#[derive(Debug, Clone, Serialize)]
pub struct EnqueueReceipt {
    pub entry_id: EntryId,
    pub destination_id: DestinationId,
    /// 前面还有多少个条目（含正在播放的）
    pub position: usize,
    pub state: QueueState,
}

/// Queue Engine Port
#[async_trait]
pub trait QueueEnginePort: Send + Sync {
    /// 追加条目；目的地空闲时触发播放
    async fn enqueue(
        &self,
        destination_id: &DestinationId,
        entry: QueueEntry,
    ) -> Result<EnqueueReceipt, QueueError>;

    /// 移除待播条目
    async fn remove(
        &self,
        destination_id: &DestinationId,
        entry_id: EntryId,
    ) -> Result<(), QueueError>;

    /// 强制结束当前播放
    async fn skip(&self, destination_id: &DestinationId) -> Result<(), QueueError>;

    /// 调整待播条目位置
    async fn reorder(
        &self,
        destination_id: &DestinationId,
        entry_id: EntryId,
        new_index: usize,
    ) -> Result<(), QueueError>;

    /// 显式恢复空闲队列的播放（崩溃恢复后使用）
    async fn resume(&self, destination_id: &DestinationId) -> Result<(), QueueError>;

    /// 只读快照；未知目的地返回空队列
    async fn snapshot(&self, destination_id: &DestinationId) -> DestinationSnapshot;

    /// 所有已注册目的地的快照
    async fn list(&self) -> Vec<DestinationSnapshot>;
}
