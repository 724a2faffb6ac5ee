//! Voice Client Port - 出站端口
//!
//! 外部实时语音服务的边界。适配器负责连接与重连策略，
//! 播放结果通过事件通道异步上报，队列引擎从不同步等待播放结束。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::queue::{DestinationId, EntryId, MediaLocator, SessionId};

/// Voice Client 错误
#[derive(Debug, Clone, Error)]
pub enum VoiceClientError {
    #[error("Voice client not connected")]
    NotConnected,

    #[error("Voice request timeout")]
    Timeout,

    #[error("Network error: {0}")]
    NetworkError(String),

    /// 服务端拒绝（不重试）
    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl VoiceClientError {
    /// 是否值得按退避策略重试
    pub fn is_retryable(&self) -> bool {
        !matches!(self, VoiceClientError::Rejected(_))
    }
}

/// 播放请求
#[derive(Debug, Clone)]
pub struct PlayRequest {
    pub destination_id: DestinationId,
    pub session_id: SessionId,
    pub entry_id: EntryId,
    pub media: MediaLocator,
    pub title: String,
    pub duration_ms: Option<u64>,
}

/// 语音事件类型
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VoiceEventKind {
    PlaybackCompleted,
    PlaybackFailed { reason: String },
    ConnectionLost { reason: String },
}

/// 语音客户端上报的事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceEvent {
    pub destination_id: DestinationId,
    /// 连接丢失时可能不关联任何会话
    #[serde(default)]
    pub session_id: Option<SessionId>,
    #[serde(flatten)]
    pub kind: VoiceEventKind,
}

impl VoiceEvent {
    pub fn completed(destination_id: DestinationId, session_id: SessionId) -> Self {
        Self {
            destination_id,
            session_id: Some(session_id),
            kind: VoiceEventKind::PlaybackCompleted,
        }
    }

    pub fn failed(
        destination_id: DestinationId,
        session_id: SessionId,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            destination_id,
            session_id: Some(session_id),
            kind: VoiceEventKind::PlaybackFailed {
                reason: reason.into(),
            },
        }
    }

    pub fn connection_lost(
        destination_id: DestinationId,
        session_id: Option<SessionId>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            destination_id,
            session_id,
            kind: VoiceEventKind::ConnectionLost {
                reason: reason.into(),
            },
        }
    }
}

/// 事件发送端，由适配器持有
pub type VoiceEventSink = mpsc::Sender<VoiceEvent>;

/// Voice Client Port
#[async_trait]
pub trait VoiceClientPort: Send + Sync {
    /// 使用 bot 凭证连接外部服务
    async fn connect(&self) -> Result<(), VoiceClientError>;

    /// 断开连接（关闭流程使用）
    async fn disconnect(&self) -> Result<(), VoiceClientError>;

    /// 加入目的地语音频道（适配器内部按重连策略重试）
    async fn join(&self, destination_id: &DestinationId) -> Result<(), VoiceClientError>;

    /// 开始播放，立即返回；结果通过事件上报
    async fn play(&self, request: PlayRequest) -> Result<(), VoiceClientError>;

    /// 停止当前播放，不上报事件
    async fn stop(&self, destination_id: &DestinationId) -> Result<(), VoiceClientError>;

    /// 离开语音频道
    async fn leave(&self, destination_id: &DestinationId) -> Result<(), VoiceClientError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_shape() {
        let event = VoiceEvent::failed(
            DestinationId::new("guild-1").unwrap(),
            SessionId::new(3),
            "decoder error",
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["destination_id"], "guild-1");
        assert_eq!(json["session_id"], 3);
        assert_eq!(json["kind"], "playback_failed");
        assert_eq!(json["reason"], "decoder error");
    }

    #[test]
    fn test_event_parse_without_session() {
        let event: VoiceEvent = serde_json::from_str(
            r#"{"destination_id":"guild-1","kind":"connection_lost","reason":"gateway closed"}"#,
        )
        .unwrap();
        assert_eq!(event.session_id, None);
        assert_eq!(
            event.kind,
            VoiceEventKind::ConnectionLost {
                reason: "gateway closed".to_string()
            }
        );
    }

    #[test]
    fn test_rejected_is_not_retryable() {
        assert!(!VoiceClientError::Rejected("bad token".to_string()).is_retryable());
        assert!(VoiceClientError::Timeout.is_retryable());
    }
}
