//! Queue Queries

use crate::domain::queue::{DestinationId, EntryId};

/// 获取单个目的地的队列快照
#[derive(Debug, Clone)]
pub struct GetQueue {
    pub destination_id: DestinationId,
}

/// 列出所有目的地的队列
#[derive(Debug, Clone)]
pub struct ListQueues;

/// 获取条目的媒体文件
#[derive(Debug, Clone)]
pub struct GetMedia {
    pub entry_id: EntryId,
}
