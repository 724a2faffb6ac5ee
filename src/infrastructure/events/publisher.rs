//! Event Publisher Implementation
//!
//! 队列事件推送（WebSocket 观察者）

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::domain::queue::{DestinationId, EntryId, PlaybackOutcome, QueueEntry, SessionId};

const CHANNEL_CAPACITY: usize = 100;

/// 队列事件类型
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum QueueEvent {
    /// 新条目入队
    EntryEnqueued {
        destination_id: String,
        entry_id: EntryId,
        title: String,
        submitter_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        duration_ms: Option<u64>,
        position: usize,
    },
    /// 操作员移除条目
    EntryRemoved {
        destination_id: String,
        entry_id: EntryId,
    },
    /// 待播顺序变更
    QueueReordered {
        destination_id: String,
        order: Vec<EntryId>,
    },
    /// 开始播放
    PlaybackStarted {
        destination_id: String,
        session_id: SessionId,
        entry_id: EntryId,
        title: String,
        started_at: DateTime<Utc>,
    },
    /// 播放结束（完成、失败、跳过、连接丢失或中止）
    PlaybackFinished {
        destination_id: String,
        session_id: SessionId,
        entry_id: EntryId,
        outcome: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// 队列播放完毕
    QueueIdle { destination_id: String },
    /// 无法加入语音频道，待播条目保留
    ConnectionFailed {
        destination_id: String,
        reason: String,
    },
    /// 宽限期后释放语音连接
    VoiceReleased { destination_id: String },
}

impl QueueEvent {
    pub fn destination_id(&self) -> &str {
        match self {
            QueueEvent::EntryEnqueued { destination_id, .. }
            | QueueEvent::EntryRemoved { destination_id, .. }
            | QueueEvent::QueueReordered { destination_id, .. }
            | QueueEvent::PlaybackStarted { destination_id, .. }
            | QueueEvent::PlaybackFinished { destination_id, .. }
            | QueueEvent::QueueIdle { destination_id }
            | QueueEvent::ConnectionFailed { destination_id, .. }
            | QueueEvent::VoiceReleased { destination_id } => destination_id,
        }
    }

    pub fn entry_enqueued(entry: &QueueEntry, position: usize) -> Self {
        QueueEvent::EntryEnqueued {
            destination_id: entry.destination_id().to_string(),
            entry_id: entry.id(),
            title: entry.title().to_string(),
            submitter_id: entry.submitter_id().to_string(),
            duration_ms: entry.duration_ms(),
            position,
        }
    }

    pub fn playback_started(session_id: SessionId, entry: &QueueEntry) -> Self {
        QueueEvent::PlaybackStarted {
            destination_id: entry.destination_id().to_string(),
            session_id,
            entry_id: entry.id(),
            title: entry.title().to_string(),
            started_at: Utc::now(),
        }
    }

    pub fn playback_finished(
        session_id: SessionId,
        entry: &QueueEntry,
        outcome: &PlaybackOutcome,
    ) -> Self {
        QueueEvent::PlaybackFinished {
            destination_id: entry.destination_id().to_string(),
            session_id,
            entry_id: entry.id(),
            outcome: outcome.as_str().to_string(),
            error: outcome.error().map(str::to_string),
        }
    }
}

/// 事件发布器
pub struct EventPublisher {
    /// destination_id -> broadcast sender（单个目的地的观察者）
    destination_channels: DashMap<DestinationId, broadcast::Sender<QueueEvent>>,
    /// 全局广播（所有目的地）
    global_channel: broadcast::Sender<QueueEvent>,
}

impl EventPublisher {
    pub fn new() -> Self {
        let (global_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            destination_channels: DashMap::new(),
            global_channel: global_tx,
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// 订阅全部事件
    pub fn subscribe_global(&self) -> broadcast::Receiver<QueueEvent> {
        self.global_channel.subscribe()
    }

    /// 订阅单个目的地的事件
    pub fn subscribe_destination(
        &self,
        destination_id: &DestinationId,
    ) -> broadcast::Receiver<QueueEvent> {
        self.destination_channels
            .entry(destination_id.clone())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// 最后一个观察者断开后清理通道
    pub fn release_destination(&self, destination_id: &DestinationId) {
        self.destination_channels
            .remove_if(destination_id, |_, sender| sender.receiver_count() == 0);
    }

    /// 发布事件到全局与目的地通道
    pub fn publish(&self, destination_id: &DestinationId, event: QueueEvent) {
        if let Some(sender) = self.destination_channels.get(destination_id) {
            if let Err(e) = sender.send(event.clone()) {
                tracing::debug!(
                    destination_id = %destination_id,
                    error = %e,
                    "Failed to publish destination event (no receivers)"
                );
            }
        }

        if let Err(e) = self.global_channel.send(event) {
            tracing::debug!(
                destination_id = %destination_id,
                error = %e,
                "Failed to publish event (no receivers)"
            );
        }
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dest(id: &str) -> DestinationId {
        DestinationId::new(id).unwrap()
    }

    #[tokio::test]
    async fn test_destination_subscriber_only_sees_own_events() {
        let publisher = EventPublisher::new();
        let mut a = publisher.subscribe_destination(&dest("a"));
        let mut global = publisher.subscribe_global();

        publisher.publish(&dest("b"), QueueEvent::QueueIdle { destination_id: "b".to_string() });
        publisher.publish(&dest("a"), QueueEvent::QueueIdle { destination_id: "a".to_string() });

        assert_eq!(a.recv().await.unwrap().destination_id(), "a");
        assert_eq!(global.recv().await.unwrap().destination_id(), "b");
        assert_eq!(global.recv().await.unwrap().destination_id(), "a");
    }

    #[test]
    fn test_release_keeps_channel_with_receivers() {
        let publisher = EventPublisher::new();
        let rx = publisher.subscribe_destination(&dest("a"));

        publisher.release_destination(&dest("a"));
        assert_eq!(publisher.destination_channels.len(), 1);

        drop(rx);
        publisher.release_destination(&dest("a"));
        assert!(publisher.destination_channels.is_empty());
    }

    #[test]
    fn test_event_json_shape() {
        let event = QueueEvent::ConnectionFailed {
            destination_id: "guild-1".to_string(),
            reason: "gateway down".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "ConnectionFailed");
        assert_eq!(json["data"]["reason"], "gateway down");
    }
}
