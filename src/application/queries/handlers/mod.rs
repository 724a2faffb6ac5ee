//! Query Handlers

mod queue_handlers;

pub use queue_handlers::{GetMediaHandler, GetQueueHandler, ListQueuesHandler};
