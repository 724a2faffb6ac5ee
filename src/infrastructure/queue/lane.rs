//! Adapter Lane - 单个目的地的语音调用通道
//!
//! 同一目的地的 join/play/stop/leave 按提交顺序串行执行，
//! 每次调用都有超时，结果以 [`Signal`] 回投到 actor，actor 从不等待协议往返

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use super::actor::Signal;
use crate::application::ports::{PlayRequest, VoiceClientError, VoiceClientPort, VoiceEvent};
use crate::domain::queue::DestinationId;

/// 语音调用
#[derive(Debug)]
pub(super) enum LaneCall {
    Join { attempt: u64 },
    Play(PlayRequest),
    Stop,
    Leave,
    /// 之前提交的调用全部结束后应答
    Barrier(oneshot::Sender<()>),
}

/// Lane 超时配置
#[derive(Debug, Clone, Copy)]
pub(super) struct LaneTimeouts {
    /// play/stop/leave
    pub call: Duration,
    /// join 包含适配器内部的重试
    pub join: Duration,
}

pub(super) struct AdapterLane {
    destination_id: DestinationId,
    voice: Arc<dyn VoiceClientPort>,
    signals: mpsc::UnboundedSender<Signal>,
    timeouts: LaneTimeouts,
    /// 关闭时中止进行中的 join
    abort_joins: CancellationToken,
}

impl AdapterLane {
    /// 启动 lane 任务，返回调用发送端
    pub(super) fn spawn(
        destination_id: DestinationId,
        voice: Arc<dyn VoiceClientPort>,
        signals: mpsc::UnboundedSender<Signal>,
        timeouts: LaneTimeouts,
        abort_joins: CancellationToken,
    ) -> mpsc::UnboundedSender<LaneCall> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let lane = Self {
            destination_id,
            voice,
            signals,
            timeouts,
            abort_joins,
        };

        tokio::spawn(async move {
            while let Some(call) = rx.recv().await {
                lane.execute(call).await;
            }
            tracing::debug!(destination_id = %lane.destination_id, "Adapter lane stopped");
        });

        tx
    }

    async fn execute(&self, call: LaneCall) {
        match call {
            LaneCall::Join { attempt } => self.join(attempt).await,
            LaneCall::Play(request) => self.play(request).await,
            LaneCall::Stop => {
                if let Err(reason) = self.bounded("stop", self.voice.stop(&self.destination_id)).await {
                    tracing::warn!(destination_id = %self.destination_id, error = %reason, "Voice stop failed");
                }
            }
            LaneCall::Leave => {
                if let Err(reason) = self.bounded("leave", self.voice.leave(&self.destination_id)).await {
                    tracing::warn!(destination_id = %self.destination_id, error = %reason, "Voice leave failed");
                }
            }
            LaneCall::Barrier(done) => {
                let _ = done.send(());
            }
        }
    }

    async fn join(&self, attempt: u64) {
        if self.abort_joins.is_cancelled() {
            return;
        }

        let result = tokio::select! {
            _ = self.abort_joins.cancelled() => {
                tracing::debug!(destination_id = %self.destination_id, "Join aborted");
                return;
            }
            result = timeout(self.timeouts.join, self.voice.join(&self.destination_id)) => result,
        };

        let signal = match result {
            Ok(Ok(())) => Signal::Joined { attempt },
            Ok(Err(e)) => Signal::JoinFailed {
                attempt,
                reason: e.to_string(),
            },
            Err(_) => Signal::JoinFailed {
                attempt,
                reason: format!("join timed out after {:?}", self.timeouts.join),
            },
        };
        let _ = self.signals.send(signal);
    }

    async fn play(&self, request: PlayRequest) {
        let session = request.session_id;
        let signal = match timeout(self.timeouts.call, self.voice.play(request)).await {
            Ok(Ok(())) => return,
            // 连接已不可用，走重连路径而不是逐条失败
            Ok(Err(VoiceClientError::NotConnected)) => Signal::Voice(VoiceEvent::connection_lost(
                self.destination_id.clone(),
                Some(session),
                VoiceClientError::NotConnected.to_string(),
            )),
            Ok(Err(e)) => Signal::PlayFailed {
                session,
                reason: e.to_string(),
            },
            Err(_) => Signal::PlayFailed {
                session,
                reason: format!("play request timed out after {:?}", self.timeouts.call),
            },
        };
        let _ = self.signals.send(signal);
    }

    async fn bounded(
        &self,
        operation: &str,
        call: impl std::future::Future<Output = Result<(), VoiceClientError>>,
    ) -> Result<(), String> {
        match timeout(self.timeouts.call, call).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("{} timed out after {:?}", operation, self.timeouts.call)),
        }
    }
}
