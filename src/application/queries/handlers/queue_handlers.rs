//! Queue Query Handlers

use std::sync::Arc;

use crate::application::error::ApplicationError;
use crate::application::ports::{MediaStorageError, MediaStoragePort, QueueEnginePort, StoredMedia};
use crate::application::queries::{GetMedia, GetQueue, ListQueues};
use crate::domain::queue::DestinationSnapshot;

/// GetQueue Handler - 单个目的地的快照
pub struct GetQueueHandler {
    engine: Arc<dyn QueueEnginePort>,
}

impl GetQueueHandler {
    pub fn new(engine: Arc<dyn QueueEnginePort>) -> Self {
        Self { engine }
    }

    pub async fn handle(&self, query: GetQueue) -> Result<DestinationSnapshot, ApplicationError> {
        Ok(self.engine.snapshot(&query.destination_id).await)
    }
}

/// ListQueues Handler
pub struct ListQueuesHandler {
    engine: Arc<dyn QueueEnginePort>,
}

impl ListQueuesHandler {
    pub fn new(engine: Arc<dyn QueueEnginePort>) -> Self {
        Self { engine }
    }

    pub async fn handle(&self, _query: ListQueues) -> Result<Vec<DestinationSnapshot>, ApplicationError> {
        let mut snapshots = self.engine.list().await;
        snapshots.sort_by(|a, b| a.destination_id.cmp(&b.destination_id));
        Ok(snapshots)
    }
}

/// GetMedia Handler - 语音桥拉取音频
pub struct GetMediaHandler {
    media_storage: Arc<dyn MediaStoragePort>,
}

impl GetMediaHandler {
    pub fn new(media_storage: Arc<dyn MediaStoragePort>) -> Self {
        Self { media_storage }
    }

    pub async fn handle(&self, query: GetMedia) -> Result<StoredMedia, ApplicationError> {
        match self.media_storage.locate(query.entry_id).await {
            Ok(media) => Ok(media),
            Err(MediaStorageError::NotFound(_)) => {
                Err(ApplicationError::not_found("Media", query.entry_id))
            }
            Err(e) => Err(e.into()),
        }
    }
}
