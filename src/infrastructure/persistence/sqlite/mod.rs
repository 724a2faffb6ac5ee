//! SQLite Persistence - SQLite 数据库持久化实现

mod database;
mod queue_entry_repo;

pub use database::*;
pub use queue_entry_repo::*;
