//! 进程生命周期：信号处理与有序关闭

mod shutdown;

pub use shutdown::{shutdown_signal, ShutdownCoordinator, ShutdownReport, ShutdownStep};
