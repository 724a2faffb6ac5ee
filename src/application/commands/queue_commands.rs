//! Queue Commands - 操作员对队列的修改

use crate::domain::queue::{DestinationId, EntryId};

/// 移除待播条目
#[derive(Debug, Clone)]
pub struct RemoveEntry {
    pub destination_id: DestinationId,
    pub entry_id: EntryId,
}

/// 跳过当前播放
#[derive(Debug, Clone)]
pub struct SkipCurrent {
    pub destination_id: DestinationId,
}

/// 调整条目位置
#[derive(Debug, Clone)]
pub struct ReorderEntry {
    pub destination_id: DestinationId,
    pub entry_id: EntryId,
    pub new_index: usize,
}

/// 恢复空闲队列的播放
#[derive(Debug, Clone)]
pub struct ResumeQueue {
    pub destination_id: DestinationId,
}
