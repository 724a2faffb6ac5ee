//! Shutdown Coordinator
//!
//! 关闭顺序：停止接收上传 → 排空所有目的地 → 断开语音客户端 → 关闭数据库连接池。
//! 整个流程受全局期限约束，超时后放弃剩余步骤并记录日志。

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::application::VoiceClientPort;
use crate::infrastructure::persistence::DbPool;
use crate::infrastructure::queue::QueueEngine;

/// 关闭流程的步骤
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownStep {
    DrainQueues,
    StopHttp,
    DisconnectVoice,
    ClosePool,
}

impl ShutdownStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShutdownStep::DrainQueues => "drain_queues",
            ShutdownStep::StopHttp => "stop_http",
            ShutdownStep::DisconnectVoice => "disconnect_voice",
            ShutdownStep::ClosePool => "close_pool",
        }
    }
}

/// 关闭结果
#[derive(Debug, Clone, Default)]
pub struct ShutdownReport {
    pub destinations: usize,
    pub drained: usize,
    pub voice_disconnected: bool,
    pub pool_closed: bool,
    /// 超过期限时未完成的步骤
    pub abandoned: Option<ShutdownStep>,
    pub elapsed: Duration,
}

impl ShutdownReport {
    pub fn is_complete(&self) -> bool {
        self.abandoned.is_none()
    }
}

/// 关闭协调器
pub struct ShutdownCoordinator {
    engine: Arc<QueueEngine>,
    voice: Arc<dyn VoiceClientPort>,
    pool: Option<DbPool>,
    /// 取消后 HTTP 服务器停止接受连接，语音事件循环退出
    cancel: CancellationToken,
    http_task: Option<JoinHandle<Result<(), std::io::Error>>>,
    deadline: Duration,
    per_call_timeout: Duration,
}

impl ShutdownCoordinator {
    pub fn new(
        engine: Arc<QueueEngine>,
        voice: Arc<dyn VoiceClientPort>,
        cancel: CancellationToken,
        deadline: Duration,
        per_call_timeout: Duration,
    ) -> Self {
        Self {
            engine,
            voice,
            pool: None,
            cancel,
            http_task: None,
            deadline,
            per_call_timeout,
        }
    }

    /// 关闭时关闭连接池
    pub fn with_pool(mut self, pool: DbPool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// 关闭时等待 HTTP 服务器退出
    pub fn with_http_task(mut self, task: JoinHandle<Result<(), std::io::Error>>) -> Self {
        self.http_task = Some(task);
        self
    }

    /// 执行关闭流程
    pub async fn run(mut self) -> ShutdownReport {
        let started = Instant::now();
        let mut report = ShutdownReport::default();
        let mut step = ShutdownStep::DrainQueues;

        tracing::info!(deadline_ms = self.deadline.as_millis() as u64, "Graceful shutdown started");

        // 立即拒绝新上传，并开始 HTTP 优雅关闭
        self.engine.stop_accepting();
        self.cancel.cancel();

        let deadline = self.deadline;
        let outcome = tokio::time::timeout(deadline, self.run_steps(&mut report, &mut step)).await;

        if outcome.is_err() {
            report.abandoned = Some(step);
            tracing::warn!(
                step = step.as_str(),
                deadline_ms = deadline.as_millis() as u64,
                "Shutdown deadline exceeded, abandoning remaining work"
            );
            if let Some(task) = self.http_task.take() {
                task.abort();
            }
        }

        report.elapsed = started.elapsed();
        tracing::info!(
            destinations = report.destinations,
            drained = report.drained,
            voice_disconnected = report.voice_disconnected,
            pool_closed = report.pool_closed,
            elapsed_ms = report.elapsed.as_millis() as u64,
            complete = report.is_complete(),
            "Graceful shutdown finished"
        );
        report
    }

    async fn run_steps(&mut self, report: &mut ShutdownReport, step: &mut ShutdownStep) {
        *step = ShutdownStep::DrainQueues;
        let drain = self.engine.shutdown().await;
        report.destinations = drain.destinations;
        report.drained = drain.drained;

        *step = ShutdownStep::StopHttp;
        if let Some(task) = self.http_task.take() {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!(error = %e, "HTTP server exited with error"),
                Err(e) => tracing::error!(error = %e, "HTTP server task failed"),
            }
        }

        *step = ShutdownStep::DisconnectVoice;
        match tokio::time::timeout(self.per_call_timeout, self.voice.disconnect()).await {
            Ok(Ok(())) => report.voice_disconnected = true,
            Ok(Err(e)) => tracing::warn!(error = %e, "Voice client disconnect failed"),
            Err(_) => tracing::warn!(
                timeout_ms = self.per_call_timeout.as_millis() as u64,
                "Voice client disconnect timed out"
            ),
        }

        *step = ShutdownStep::ClosePool;
        if let Some(pool) = self.pool.take() {
            pool.close().await;
            report.pool_closed = true;
        }
    }
}

/// 等待 SIGINT 或 SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }
}
