//! 应用层 - 命令（写操作）
//!
//! CQRS 命令侧：处理所有写操作

mod ingest_commands;
mod queue_commands;

pub mod handlers;

pub use ingest_commands::*;
pub use queue_commands::*;
