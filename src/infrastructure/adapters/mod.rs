//! Infrastructure Adapters
//!
//! 六边形架构的适配器实现

pub mod probe;
pub mod storage;
pub mod voice;

pub use probe::*;
pub use storage::*;
pub use voice::*;
