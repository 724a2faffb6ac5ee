//! Queue Engine - 每个目的地一个 actor 的队列编排

mod actor;
mod engine;
mod lane;

pub use engine::{DrainReport, QueueEngine, QueueEngineConfig};
