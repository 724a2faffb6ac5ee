//! Repository Ports - 出站端口
//!
//! 队列条目的影子副本，仅用于崩溃恢复待播条目
//! 具体实现在 infrastructure 层（SQLite）

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::queue::{DestinationId, EntryId, QueueEntry};

/// Repository 错误
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Duplicate entity: {0}")]
    Duplicate(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Queue Entry Repository Port
///
/// 以条目 ID 为主键，目的地 ID 为二级索引
#[async_trait]
pub trait QueueEntryRepositoryPort: Send + Sync {
    /// 保存条目，追加到该目的地的末尾
    async fn save(&self, entry: &QueueEntry) -> Result<(), RepositoryError>;

    /// 根据 ID 查找条目
    async fn find_by_id(&self, id: EntryId) -> Result<Option<QueueEntry>, RepositoryError>;

    /// 按顺序获取目的地的所有待播条目
    async fn find_by_destination(
        &self,
        destination_id: &DestinationId,
    ) -> Result<Vec<QueueEntry>, RepositoryError>;

    /// 获取所有待播条目（按目的地、顺序排列）
    async fn find_all_pending(&self) -> Result<Vec<QueueEntry>, RepositoryError>;

    /// 删除条目（开始播放或被移除时）
    async fn delete(&self, id: EntryId) -> Result<(), RepositoryError>;

    /// 按给定顺序重写目的地内条目的位置
    async fn save_order(
        &self,
        destination_id: &DestinationId,
        order: &[EntryId],
    ) -> Result<(), RepositoryError>;
}
