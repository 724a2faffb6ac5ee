//! Persistence Layer - 数据持久化
//!
//! SQLite 存储实现（队列条目影子副本）

pub mod sqlite;

pub use self::sqlite::{create_pool, run_migrations, DatabaseConfig, DbPool, SqliteQueueEntryRepository};
