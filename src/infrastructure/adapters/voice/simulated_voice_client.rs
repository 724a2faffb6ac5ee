//! Simulated Voice Client - 进程内语音客户端（开发与演示）
//!
//! 按时长估算"播放"条目，结束后上报 PlaybackCompleted；
//! join 与语音桥客户端一样按重连策略重试（例如启动时 connect 尚未完成）

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;

use super::reconnect::ReconnectPolicy;
use crate::application::ports::{
    PlayRequest, VoiceClientError, VoiceClientPort, VoiceEvent, VoiceEventSink,
};
use crate::domain::queue::DestinationId;

/// 模拟语音客户端
pub struct SimulatedVoiceClient {
    events: VoiceEventSink,
    /// 条目没有时长估算时使用
    default_duration: Duration,
    reconnect: ReconnectPolicy,
    connected: AtomicBool,
    joined: DashSet<DestinationId>,
    playbacks: DashMap<DestinationId, JoinHandle<()>>,
}

impl SimulatedVoiceClient {
    pub fn new(events: VoiceEventSink, default_duration: Duration) -> Self {
        Self {
            events,
            default_duration,
            reconnect: ReconnectPolicy::default(),
            connected: AtomicBool::new(false),
            joined: DashSet::new(),
            playbacks: DashMap::new(),
        }
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    fn try_join(&self, destination_id: &DestinationId) -> Result<(), VoiceClientError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(VoiceClientError::NotConnected);
        }
        self.joined.insert(destination_id.clone());
        Ok(())
    }

    fn cancel_playback(&self, destination_id: &DestinationId) -> bool {
        match self.playbacks.remove(destination_id) {
            Some((_, handle)) => {
                handle.abort();
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl VoiceClientPort for SimulatedVoiceClient {
    async fn connect(&self) -> Result<(), VoiceClientError> {
        self.connected.store(true, Ordering::SeqCst);
        tracing::info!("Simulated voice client connected");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), VoiceClientError> {
        self.connected.store(false, Ordering::SeqCst);
        self.playbacks.retain(|_, handle| {
            handle.abort();
            false
        });
        self.joined.clear();
        tracing::info!("Simulated voice client disconnected");
        Ok(())
    }

    async fn join(&self, destination_id: &DestinationId) -> Result<(), VoiceClientError> {
        self.reconnect
            .run("join", || async { self.try_join(destination_id) })
            .await?;
        tracing::debug!(destination_id = %destination_id, "Simulated join");
        Ok(())
    }

    async fn play(&self, request: PlayRequest) -> Result<(), VoiceClientError> {
        if !self.joined.contains(&request.destination_id) {
            return Err(VoiceClientError::NotConnected);
        }

        let duration = request
            .duration_ms
            .map(Duration::from_millis)
            .unwrap_or(self.default_duration);
        let events = self.events.clone();
        let destination_id = request.destination_id.clone();
        let session_id = request.session_id;

        tracing::debug!(
            destination_id = %destination_id,
            session_id = %session_id,
            title = %request.title,
            duration_ms = duration.as_millis() as u64,
            "Simulated playback started"
        );

        let handle = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            if events
                .send(VoiceEvent::completed(destination_id, session_id))
                .await
                .is_err()
            {
                tracing::debug!("Voice event sink closed, dropping completion");
            }
        });

        if let Some(previous) = self.playbacks.insert(request.destination_id, handle) {
            previous.abort();
        }
        Ok(())
    }

    async fn stop(&self, destination_id: &DestinationId) -> Result<(), VoiceClientError> {
        if self.cancel_playback(destination_id) {
            tracing::debug!(destination_id = %destination_id, "Simulated playback stopped");
        }
        Ok(())
    }

    async fn leave(&self, destination_id: &DestinationId) -> Result<(), VoiceClientError> {
        self.cancel_playback(destination_id);
        self.joined.remove(destination_id);
        tracing::debug!(destination_id = %destination_id, "Simulated leave");
        Ok(())
    }
}
