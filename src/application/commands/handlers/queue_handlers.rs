//! Queue Command Handlers
//!
//! 操作员编辑直接进入队列引擎，不产生其他副作用

use std::sync::Arc;

use crate::application::commands::{RemoveEntry, ReorderEntry, ResumeQueue, SkipCurrent};
use crate::application::error::ApplicationError;
use crate::application::ports::QueueEnginePort;

// ============================================================================
// RemoveEntry
// ============================================================================

/// RemoveEntry Handler
pub struct RemoveEntryHandler {
    engine: Arc<dyn QueueEnginePort>,
}

impl RemoveEntryHandler {
    pub fn new(engine: Arc<dyn QueueEnginePort>) -> Self {
        Self { engine }
    }

    pub async fn handle(&self, command: RemoveEntry) -> Result<(), ApplicationError> {
        self.engine
            .remove(&command.destination_id, command.entry_id)
            .await?;

        tracing::info!(
            destination_id = %command.destination_id,
            entry_id = %command.entry_id,
            "Entry removed by operator"
        );
        Ok(())
    }
}

// ============================================================================
// SkipCurrent
// ============================================================================

/// SkipCurrent Handler
pub struct SkipCurrentHandler {
    engine: Arc<dyn QueueEnginePort>,
}

impl SkipCurrentHandler {
    pub fn new(engine: Arc<dyn QueueEnginePort>) -> Self {
        Self { engine }
    }

    pub async fn handle(&self, command: SkipCurrent) -> Result<(), ApplicationError> {
        self.engine.skip(&command.destination_id).await?;

        tracing::info!(destination_id = %command.destination_id, "Playback skipped by operator");
        Ok(())
    }
}

// ============================================================================
// ReorderEntry
// ============================================================================

/// ReorderEntry Handler
pub struct ReorderEntryHandler {
    engine: Arc<dyn QueueEnginePort>,
}

impl ReorderEntryHandler {
    pub fn new(engine: Arc<dyn QueueEnginePort>) -> Self {
        Self { engine }
    }

    pub async fn handle(&self, command: ReorderEntry) -> Result<(), ApplicationError> {
        self.engine
            .reorder(&command.destination_id, command.entry_id, command.new_index)
            .await?;

        tracing::info!(
            destination_id = %command.destination_id,
            entry_id = %command.entry_id,
            new_index = command.new_index,
            "Entry reordered by operator"
        );
        Ok(())
    }
}

// ============================================================================
// ResumeQueue
// ============================================================================

/// ResumeQueue Handler
pub struct ResumeQueueHandler {
    engine: Arc<dyn QueueEnginePort>,
}

impl ResumeQueueHandler {
    pub fn new(engine: Arc<dyn QueueEnginePort>) -> Self {
        Self { engine }
    }

    pub async fn handle(&self, command: ResumeQueue) -> Result<(), ApplicationError> {
        self.engine.resume(&command.destination_id).await?;

        tracing::info!(destination_id = %command.destination_id, "Queue resumed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::queue::{DestinationId, EntryId, QueueError};
    use crate::test_support::RecordingEngine;

    #[tokio::test]
    async fn test_remove_not_found_maps_to_application_error() {
        let engine = Arc::new(RecordingEngine::rejecting(QueueError::NotFound(EntryId::new())));
        let handler = RemoveEntryHandler::new(engine);

        let result = handler
            .handle(RemoveEntry {
                destination_id: DestinationId::new("guild-1").unwrap(),
                entry_id: EntryId::new(),
            })
            .await;

        assert!(matches!(result, Err(ApplicationError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_skip_idle_maps_to_idle() {
        let engine = Arc::new(RecordingEngine::rejecting(QueueError::Idle));
        let handler = SkipCurrentHandler::new(engine);

        let result = handler
            .handle(SkipCurrent {
                destination_id: DestinationId::new("guild-1").unwrap(),
            })
            .await;

        assert!(matches!(result, Err(ApplicationError::Idle(_))));
    }

    #[tokio::test]
    async fn test_reorder_forwards_to_engine() {
        let engine = Arc::new(RecordingEngine::default());
        let handler = ReorderEntryHandler::new(engine.clone());

        handler
            .handle(ReorderEntry {
                destination_id: DestinationId::new("guild-1").unwrap(),
                entry_id: EntryId::new(),
                new_index: 2,
            })
            .await
            .unwrap();

        assert_eq!(engine.calls(), 1);
    }
}
