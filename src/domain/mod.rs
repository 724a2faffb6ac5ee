//! Domain Layer - 领域层
//!
//! 限界上下文:
//! - Queue Context: 目的地播放队列

pub mod queue;
