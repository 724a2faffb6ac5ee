//! Infrastructure Layer - 基础设施层
//!
//! 提供所有端口的具体实现，以及队列引擎、HTTP 接口与关闭流程

pub mod adapters;
pub mod events;
pub mod http;
pub mod lifecycle;
pub mod persistence;
pub mod queue;

pub use events::EventPublisher;
pub use lifecycle::ShutdownCoordinator;
pub use queue::QueueEngine;
