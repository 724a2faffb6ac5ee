//! Queue Context - Aggregate Root
//!
//! 目的地队列状态机（纯逻辑，不做 I/O）:
//!
//! ```text
//! Idle --enqueue/resume--> Connecting --joined--> Playing
//! Playing --completed/failed/skip--> Playing(next) | Connecting(连接丢失) | Idle
//! Idle --grace 到期--> Idle(释放语音连接)
//! * --drain--> Draining
//! ```
//!
//! 所有副作用以 [`Effect`] 形式返回，由持有该聚合的 actor 执行

use chrono::Utc;
use serde::Serialize;
use std::collections::VecDeque;

use super::{
    DestinationId, EntryId, PlaybackOutcome, PlaybackSession, QueueEntry, QueueError, SessionId,
};

/// 目的地队列状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueState {
    Idle,
    Connecting,
    Playing,
    Draining,
}

impl QueueState {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueState::Idle => "idle",
            QueueState::Connecting => "connecting",
            QueueState::Playing => "playing",
            QueueState::Draining => "draining",
        }
    }
}

/// 状态迁移产生的副作用
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// 请求语音客户端加入频道
    Join { attempt: u64 },
    /// 开始播放（fire-and-forget）
    Play { session: SessionId, entry: QueueEntry },
    Stop,
    Leave,
    /// 空闲宽限期后释放语音连接
    ScheduleRelease { token: u64 },
    /// 会话结束，条目被丢弃
    Finished {
        session: SessionId,
        entry: QueueEntry,
        outcome: PlaybackOutcome,
    },
    Removed { entry: QueueEntry },
    Reordered { order: Vec<EntryId> },
    BecameIdle,
    ConnectionFailed { reason: String },
}

/// 只读快照（用于展示）
#[derive(Debug, Clone, Serialize)]
pub struct DestinationSnapshot {
    pub destination_id: DestinationId,
    pub state: QueueState,
    pub connected: bool,
    pub currently_playing: Option<PlaybackSession>,
    pub pending: Vec<QueueEntry>,
}

impl DestinationSnapshot {
    /// 尚未创建的目的地
    pub fn empty(destination_id: DestinationId) -> Self {
        Self {
            destination_id,
            state: QueueState::Idle,
            connected: false,
            currently_playing: None,
            pending: Vec::new(),
        }
    }
}

/// 目的地队列聚合根
///
/// 不变量:
/// - 同一时刻最多一个 PlaybackSession
/// - 正在播放的条目不会同时出现在 pending 中
/// - 条目 ID 在 pending 与当前会话之间唯一
/// - 重排不会复制或丢失条目
#[derive(Debug)]
pub struct DestinationQueue {
    destination_id: DestinationId,
    pending: VecDeque<QueueEntry>,
    session: Option<PlaybackSession>,
    state: QueueState,
    connected: bool,
    last_session: SessionId,
    join_attempt: u64,
    release_token: u64,
}

impl DestinationQueue {
    pub fn new(destination_id: DestinationId) -> Self {
        Self {
            destination_id,
            pending: VecDeque::new(),
            session: None,
            state: QueueState::Idle,
            connected: false,
            last_session: SessionId::new(0),
            join_attempt: 0,
            release_token: 0,
        }
    }

    /// 检查条目能否入队（不修改状态）
    pub fn check_accepts(&self, entry: &QueueEntry) -> Result<(), QueueError> {
        if self.state == QueueState::Draining {
            return Err(QueueError::ShuttingDown);
        }
        if entry.destination_id() != &self.destination_id {
            return Err(QueueError::InvalidEntry(format!(
                "条目属于目的地 {}，不能加入 {}",
                entry.destination_id(),
                self.destination_id
            )));
        }
        if self.contains(entry.id()) {
            return Err(QueueError::InvalidEntry(format!("条目已在队列中: {}", entry.id())));
        }
        Ok(())
    }

    /// 追加条目；空闲时触发播放
    pub fn enqueue(&mut self, entry: QueueEntry) -> Result<Vec<Effect>, QueueError> {
        self.check_accepts(&entry)?;
        self.pending.push_back(entry);

        if self.state == QueueState::Idle {
            Ok(self.begin_playback())
        } else {
            Ok(Vec::new())
        }
    }

    /// 恢复持久化的待播条目，不触发播放
    pub fn restore(&mut self, entries: Vec<QueueEntry>) -> usize {
        let mut restored = 0;
        for entry in entries {
            if self.check_accepts(&entry).is_ok() {
                self.pending.push_back(entry);
                restored += 1;
            }
        }
        restored
    }

    /// 显式触发空闲队列开始播放
    pub fn resume(&mut self) -> Result<Vec<Effect>, QueueError> {
        match self.state {
            QueueState::Draining => Err(QueueError::ShuttingDown),
            QueueState::Connecting | QueueState::Playing => Ok(Vec::new()),
            QueueState::Idle if self.pending.is_empty() => Err(QueueError::Idle),
            QueueState::Idle => Ok(self.begin_playback()),
        }
    }

    /// 移除待播条目；正在播放的条目不受影响（使用 skip）
    pub fn remove(&mut self, entry_id: EntryId) -> Result<Vec<Effect>, QueueError> {
        let index = self
            .index_of(entry_id)
            .ok_or(QueueError::NotFound(entry_id))?;
        let entry = self
            .pending
            .remove(index)
            .ok_or(QueueError::NotFound(entry_id))?;
        Ok(vec![Effect::Removed { entry }])
    }

    /// 调整待播条目位置
    pub fn reorder(&mut self, entry_id: EntryId, new_index: usize) -> Result<Vec<Effect>, QueueError> {
        let index = self
            .index_of(entry_id)
            .ok_or(QueueError::NotFound(entry_id))?;
        let len = self.pending.len();
        if new_index >= len {
            return Err(QueueError::OutOfRange {
                index: new_index,
                len,
            });
        }
        if index == new_index {
            return Ok(Vec::new());
        }

        if let Some(entry) = self.pending.remove(index) {
            self.pending.insert(new_index, entry);
        }

        Ok(vec![Effect::Reordered {
            order: self.pending.iter().map(QueueEntry::id).collect(),
        }])
    }

    /// 强制结束当前会话
    pub fn skip(&mut self) -> Result<Vec<Effect>, QueueError> {
        if self.state == QueueState::Draining {
            return Err(QueueError::ShuttingDown);
        }
        let session = self.session.as_ref().map(|s| s.id).ok_or(QueueError::Idle)?;

        let mut effects = vec![Effect::Stop];
        effects.extend(self.on_playback_finished(session, PlaybackOutcome::Skipped));
        Ok(effects)
    }

    /// 语音客户端加入成功
    pub fn on_joined(&mut self, attempt: u64) -> Vec<Effect> {
        if self.state != QueueState::Connecting || attempt != self.join_attempt {
            return Vec::new();
        }
        self.connected = true;
        self.start_next()
    }

    /// 语音客户端在重试后仍无法加入
    pub fn on_join_failed(&mut self, attempt: u64, reason: String) -> Vec<Effect> {
        if self.state != QueueState::Connecting || attempt != self.join_attempt {
            return Vec::new();
        }
        self.connected = false;
        self.state = QueueState::Idle;
        vec![Effect::ConnectionFailed { reason }, Effect::BecameIdle]
    }

    /// 会话结束（完成、失败、跳过或连接丢失）
    ///
    /// 以会话 ID 作为门控，过期事件不会导致重复推进
    pub fn on_playback_finished(
        &mut self,
        session: SessionId,
        outcome: PlaybackOutcome,
    ) -> Vec<Effect> {
        let finished = match self.session.take() {
            Some(current) if current.id == session => current,
            other => {
                self.session = other;
                return Vec::new();
            }
        };

        if matches!(outcome, PlaybackOutcome::ConnectionLost(_)) {
            self.connected = false;
        }

        let mut effects = vec![Effect::Finished {
            session: finished.id,
            entry: finished.entry,
            outcome,
        }];

        if self.state == QueueState::Draining {
            return effects;
        }

        if self.pending.is_empty() || self.connected {
            effects.extend(self.start_next());
        } else {
            effects.extend(self.begin_playback());
        }
        effects
    }

    /// 语音连接丢失
    pub fn on_connection_lost(&mut self, session: Option<SessionId>, reason: String) -> Vec<Effect> {
        let current = self.session.as_ref().map(|s| s.id);
        match (current, session) {
            (Some(current), Some(lost)) if current == lost => {
                self.on_playback_finished(current, PlaybackOutcome::ConnectionLost(reason))
            }
            (Some(current), None) => {
                self.on_playback_finished(current, PlaybackOutcome::ConnectionLost(reason))
            }
            (Some(_), Some(_)) => Vec::new(),
            (None, _) => {
                if self.state != QueueState::Connecting {
                    self.connected = false;
                }
                Vec::new()
            }
        }
    }

    /// 空闲宽限期到期
    pub fn on_release_due(&mut self, token: u64) -> Vec<Effect> {
        if token != self.release_token || self.state != QueueState::Idle || !self.connected {
            return Vec::new();
        }
        self.connected = false;
        vec![Effect::Leave]
    }

    /// 进入关闭流程：停止播放并离开语音频道
    pub fn drain(&mut self) -> Vec<Effect> {
        if self.state == QueueState::Draining {
            return Vec::new();
        }
        self.state = QueueState::Draining;
        self.release_token += 1;
        self.join_attempt += 1;

        let mut effects = Vec::new();
        if let Some(session) = self.session.take() {
            effects.push(Effect::Stop);
            effects.push(Effect::Finished {
                session: session.id,
                entry: session.entry,
                outcome: PlaybackOutcome::Aborted,
            });
        }
        if self.connected {
            self.connected = false;
            effects.push(Effect::Leave);
        }
        effects
    }

    pub fn snapshot(&self) -> DestinationSnapshot {
        DestinationSnapshot {
            destination_id: self.destination_id.clone(),
            state: self.state,
            connected: self.connected,
            currently_playing: self.session.clone(),
            pending: self.pending.iter().cloned().collect(),
        }
    }

    /// 条目前面还有多少个条目（包括正在播放的）
    pub fn position_of(&self, entry_id: EntryId) -> Option<usize> {
        if self.session.as_ref().map(|s| s.entry.id()) == Some(entry_id) {
            return Some(0);
        }
        let ahead = usize::from(self.session.is_some());
        self.index_of(entry_id).map(|index| index + ahead)
    }

    // Getters
    pub fn destination_id(&self) -> &DestinationId {
        &self.destination_id
    }

    pub fn state(&self) -> QueueState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn current_session(&self) -> Option<&PlaybackSession> {
        self.session.as_ref()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn contains(&self, entry_id: EntryId) -> bool {
        self.session.as_ref().map(|s| s.entry.id()) == Some(entry_id)
            || self.index_of(entry_id).is_some()
    }

    fn index_of(&self, entry_id: EntryId) -> Option<usize> {
        self.pending.iter().position(|e| e.id() == entry_id)
    }

    fn begin_playback(&mut self) -> Vec<Effect> {
        // 重新进入播放流程时作废尚未到期的释放定时器
        self.release_token += 1;

        if self.connected {
            return self.start_next();
        }

        self.state = QueueState::Connecting;
        self.join_attempt += 1;
        vec![Effect::Join {
            attempt: self.join_attempt,
        }]
    }

    fn start_next(&mut self) -> Vec<Effect> {
        match self.pending.pop_front() {
            Some(entry) => {
                self.last_session = self.last_session.next();
                let session = PlaybackSession {
                    id: self.last_session,
                    entry: entry.clone(),
                    started_at: Utc::now(),
                };
                self.session = Some(session);
                self.state = QueueState::Playing;
                vec![Effect::Play {
                    session: self.last_session,
                    entry,
                }]
            }
            None => {
                self.session = None;
                self.state = QueueState::Idle;
                self.release_token += 1;

                let mut effects = vec![Effect::BecameIdle];
                if self.connected {
                    effects.push(Effect::ScheduleRelease {
                        token: self.release_token,
                    });
                }
                effects
            }
        }
    }
}
