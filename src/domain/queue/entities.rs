//! Queue Context - Entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DestinationId, EntryId, MediaLocator, QueueError, SessionId};

const MAX_TITLE_LEN: usize = 200;
const MAX_SUBMITTER_LEN: usize = 100;

/// 队列条目
///
/// 创建后不可变，只有它在队列中的位置会变化
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    id: EntryId,
    title: String,
    duration_ms: Option<u64>,
    submitter_id: String,
    destination_id: DestinationId,
    media: MediaLocator,
    enqueued_at: DateTime<Utc>,
}

impl QueueEntry {
    /// 创建新条目（上传时调用）
    pub fn new(
        destination_id: DestinationId,
        title: impl Into<String>,
        submitter_id: impl Into<String>,
        media: MediaLocator,
        duration_ms: Option<u64>,
    ) -> Result<Self, QueueError> {
        Self::with_id(
            EntryId::new(),
            destination_id,
            title,
            submitter_id,
            media,
            duration_ms,
        )
    }

    /// 使用预先分配的 ID 创建条目（媒体文件以该 ID 命名）
    pub fn with_id(
        id: EntryId,
        destination_id: DestinationId,
        title: impl Into<String>,
        submitter_id: impl Into<String>,
        media: MediaLocator,
        duration_ms: Option<u64>,
    ) -> Result<Self, QueueError> {
        let title = title.into().trim().to_string();
        let submitter_id = submitter_id.into().trim().to_string();

        if title.is_empty() {
            return Err(QueueError::InvalidEntry("标题不能为空".to_string()));
        }
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(QueueError::InvalidEntry(format!(
                "标题长度不能超过{}字符",
                MAX_TITLE_LEN
            )));
        }
        if submitter_id.is_empty() {
            return Err(QueueError::InvalidEntry("提交者不能为空".to_string()));
        }
        if submitter_id.chars().count() > MAX_SUBMITTER_LEN {
            return Err(QueueError::InvalidEntry(format!(
                "提交者长度不能超过{}字符",
                MAX_SUBMITTER_LEN
            )));
        }
        if media.as_str().is_empty() {
            return Err(QueueError::InvalidEntry("媒体定位符不能为空".to_string()));
        }

        Ok(Self {
            id,
            title,
            duration_ms,
            submitter_id,
            destination_id,
            media,
            enqueued_at: Utc::now(),
        })
    }

    /// 从持久化记录重建（不做校验）
    pub fn restore(
        id: EntryId,
        destination_id: DestinationId,
        title: String,
        submitter_id: String,
        media: MediaLocator,
        duration_ms: Option<u64>,
        enqueued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            title,
            duration_ms,
            submitter_id,
            destination_id,
            media,
            enqueued_at,
        }
    }

    // Getters
    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn duration_ms(&self) -> Option<u64> {
        self.duration_ms
    }

    pub fn submitter_id(&self) -> &str {
        &self.submitter_id
    }

    pub fn destination_id(&self) -> &DestinationId {
        &self.destination_id
    }

    pub fn media(&self) -> &MediaLocator {
        &self.media
    }

    pub fn enqueued_at(&self) -> DateTime<Utc> {
        self.enqueued_at
    }
}

/// 播放会话
///
/// 仅在目的地处于 Playing 状态时存在
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaybackSession {
    pub id: SessionId,
    pub entry: QueueEntry,
    pub started_at: DateTime<Utc>,
}

/// 播放结束原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackOutcome {
    Completed,
    Failed(String),
    Skipped,
    ConnectionLost(String),
    /// 关闭流程中被中止
    Aborted,
}

impl PlaybackOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackOutcome::Completed => "completed",
            PlaybackOutcome::Failed(_) => "failed",
            PlaybackOutcome::Skipped => "skipped",
            PlaybackOutcome::ConnectionLost(_) => "connection_lost",
            PlaybackOutcome::Aborted => "aborted",
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            PlaybackOutcome::Failed(reason) | PlaybackOutcome::ConnectionLost(reason) => {
                Some(reason)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn destination() -> DestinationId {
        DestinationId::new("guild-1").unwrap()
    }

    #[test]
    fn test_new_entry_trims_fields() {
        let entry = QueueEntry::new(
            destination(),
            "  Song  ",
            " alice ",
            MediaLocator::new("data/media/a.wav"),
            Some(1000),
        )
        .unwrap();

        assert_eq!(entry.title(), "Song");
        assert_eq!(entry.submitter_id(), "alice");
        assert_eq!(entry.duration_ms(), Some(1000));
    }

    #[test]
    fn test_new_entry_rejects_malformed_metadata() {
        let media = MediaLocator::new("data/media/a.wav");
        assert!(matches!(
            QueueEntry::new(destination(), "", "alice", media.clone(), None),
            Err(QueueError::InvalidEntry(_))
        ));
        assert!(matches!(
            QueueEntry::new(destination(), "Song", " ", media.clone(), None),
            Err(QueueError::InvalidEntry(_))
        ));
        assert!(matches!(
            QueueEntry::new(destination(), "Song", "alice", MediaLocator::new(""), None),
            Err(QueueError::InvalidEntry(_))
        ));
        assert!(matches!(
            QueueEntry::new(destination(), "x".repeat(201), "alice", media, None),
            Err(QueueError::InvalidEntry(_))
        ));
    }

    #[test]
    fn test_outcome_error_text() {
        assert_eq!(PlaybackOutcome::Completed.error(), None);
        assert_eq!(
            PlaybackOutcome::Failed("decode".to_string()).error(),
            Some("decode")
        );
        assert_eq!(PlaybackOutcome::Skipped.as_str(), "skipped");
    }
}
