//! Queue Context - 播放队列限界上下文
//!
//! 职责:
//! - 队列条目与目的地标识
//! - 每个目的地的队列状态机
//! - 播放会话关联

mod aggregate;
mod entities;
mod errors;
mod value_objects;

pub use aggregate::{DestinationQueue, DestinationSnapshot, Effect, QueueState};
pub use entities::{PlaybackOutcome, PlaybackSession, QueueEntry};
pub use errors::QueueError;
pub use value_objects::{AudioFormat, DestinationId, EntryId, MediaLocator, SessionId};
