//! Command Handlers

mod ingest_handlers;
mod queue_handlers;

pub use ingest_handlers::UploadAudioHandler;
pub use queue_handlers::{
    RemoveEntryHandler, ReorderEntryHandler, ResumeQueueHandler, SkipCurrentHandler,
};
