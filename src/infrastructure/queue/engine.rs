//! Queue Engine - 目的地注册表
//!
//! 注册表只在查找/创建 actor 时访问，所有队列操作都在各自的 actor 内串行执行，
//! 不同目的地之间互不阻塞

use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::future::join_all;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use super::actor::{
    ActorCommand, ActorContext, ActorSettings, DestinationActor, DestinationHandle, Signal,
};
use super::lane::LaneTimeouts;
use crate::application::ports::{
    EnqueueReceipt, MediaStoragePort, QueueEnginePort, QueueEntryRepositoryPort, RepositoryError,
    VoiceClientPort, VoiceEvent,
};
use crate::domain::queue::{DestinationId, DestinationSnapshot, EntryId, QueueEntry, QueueError};
use crate::infrastructure::events::EventPublisher;

/// 队列引擎配置
#[derive(Debug, Clone)]
pub struct QueueEngineConfig {
    /// 空闲后保持语音连接的时长
    pub idle_grace: Duration,
    /// 每个目的地邮箱容量
    pub mailbox_capacity: usize,
    /// 单次语音调用超时（play/stop/leave）
    pub call_timeout: Duration,
    /// join 超时（包含适配器内部重试）
    pub join_timeout: Duration,
}

impl Default for QueueEngineConfig {
    fn default() -> Self {
        Self {
            idle_grace: Duration::from_secs(30),
            mailbox_capacity: 64,
            call_timeout: Duration::from_secs(2),
            join_timeout: Duration::from_secs(30),
        }
    }
}

/// 关闭统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub destinations: usize,
    pub drained: usize,
}

/// 队列引擎
pub struct QueueEngine {
    registry: DashMap<DestinationId, DestinationHandle>,
    context: Arc<ActorContext>,
    settings: ActorSettings,
    accepting: AtomicBool,
}

impl QueueEngine {
    pub fn new(
        config: QueueEngineConfig,
        voice: Arc<dyn VoiceClientPort>,
        repository: Arc<dyn QueueEntryRepositoryPort>,
        media: Arc<dyn MediaStoragePort>,
        events: Arc<EventPublisher>,
    ) -> Self {
        Self {
            registry: DashMap::new(),
            context: Arc::new(ActorContext {
                voice,
                repository,
                media,
                events,
            }),
            settings: ActorSettings {
                idle_grace: config.idle_grace,
                mailbox_capacity: config.mailbox_capacity,
                timeouts: LaneTimeouts {
                    call: config.call_timeout,
                    join: config.join_timeout,
                },
            },
            accepting: AtomicBool::new(true),
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// 是否仍接受新条目
    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    /// 拒绝后续入队（关闭流程第一步）
    pub fn stop_accepting(&self) {
        if self.accepting.swap(false, Ordering::SeqCst) {
            tracing::info!("Queue engine stopped accepting new entries");
        }
    }

    /// 已注册的目的地数量
    pub fn destination_count(&self) -> usize {
        self.registry.len()
    }

    fn lookup(&self, destination_id: &DestinationId) -> Option<DestinationHandle> {
        self.registry.get(destination_id).map(|h| h.value().clone())
    }

    fn get_or_spawn(&self, destination_id: &DestinationId) -> DestinationHandle {
        self.registry
            .entry(destination_id.clone())
            .or_insert_with(|| {
                DestinationActor::spawn(
                    destination_id.clone(),
                    self.context.clone(),
                    self.settings,
                )
            })
            .value()
            .clone()
    }

    async fn request<T>(
        handle: &DestinationHandle,
        make: impl FnOnce(oneshot::Sender<T>) -> ActorCommand,
    ) -> Result<T, QueueError> {
        let (tx, rx) = oneshot::channel();
        handle
            .commands
            .send(make(tx))
            .await
            .map_err(|_| QueueError::ShuttingDown)?;
        rx.await.map_err(|_| QueueError::ShuttingDown)
    }

    /// 从影子副本恢复待播条目（不自动播放）
    ///
    /// 媒体已丢失的条目会被丢弃
    pub async fn restore_pending(&self) -> Result<usize, RepositoryError> {
        let entries = self.context.repository.find_all_pending().await?;

        let mut by_destination: BTreeMap<DestinationId, Vec<QueueEntry>> = BTreeMap::new();
        for entry in entries {
            if !self.context.media.exists(entry.media()).await {
                tracing::warn!(
                    destination_id = %entry.destination_id(),
                    entry_id = %entry.id(),
                    media = %entry.media(),
                    "Media missing for persisted entry, dropping it"
                );
                if let Err(e) = self.context.repository.delete(entry.id()).await {
                    tracing::error!(entry_id = %entry.id(), error = %e, "Failed to delete shadow copy");
                }
                continue;
            }
            by_destination
                .entry(entry.destination_id().clone())
                .or_default()
                .push(entry);
        }

        let mut restored = 0;
        for (destination_id, entries) in by_destination {
            let handle = self.get_or_spawn(&destination_id);
            match Self::request(&handle, |reply| ActorCommand::Restore { entries, reply }).await {
                Ok(count) => restored += count,
                Err(e) => {
                    tracing::error!(destination_id = %destination_id, error = %e, "Restore failed")
                }
            }
        }

        tracing::info!(
            restored,
            destinations = self.registry.len(),
            "Queue state restored"
        );
        Ok(restored)
    }

    /// 将语音事件路由到所属目的地
    pub fn dispatch(&self, event: VoiceEvent) {
        match self.lookup(&event.destination_id) {
            Some(handle) => {
                let destination_id = event.destination_id.clone();
                if handle.signals.send(Signal::Voice(event)).is_err() {
                    tracing::debug!(destination_id = %destination_id, "Actor stopped, dropping voice event");
                }
            }
            None => {
                tracing::debug!(
                    destination_id = %event.destination_id,
                    "Voice event for unknown destination ignored"
                );
            }
        }
    }

    /// 消费适配器事件直到取消
    pub async fn run_event_loop(
        self: Arc<Self>,
        mut events: mpsc::Receiver<VoiceEvent>,
        cancel: CancellationToken,
    ) {
        tracing::info!("Voice event loop started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => self.dispatch(event),
                    None => break,
                },
            }
        }
        tracing::info!("Voice event loop stopped");
    }

    /// 关闭所有目的地：停止播放、离开语音频道、结束 actor
    ///
    /// 各目的地并发处理，单次语音调用受超时约束
    pub async fn shutdown(&self) -> DrainReport {
        self.stop_accepting();

        let handles: Vec<(DestinationId, DestinationHandle)> = self
            .registry
            .iter()
            .map(|h| (h.key().clone(), h.value().clone()))
            .collect();

        let results = join_all(handles.iter().map(|(destination_id, handle)| async move {
            let result = Self::request(handle, |reply| ActorCommand::Shutdown { reply }).await;
            if result.is_err() {
                tracing::warn!(destination_id = %destination_id, "Actor already stopped");
            }
            result.is_ok()
        }))
        .await;

        let report = DrainReport {
            destinations: handles.len(),
            drained: results.into_iter().filter(|ok| *ok).count(),
        };
        tracing::info!(
            destinations = report.destinations,
            drained = report.drained,
            "Queue engine drained"
        );
        report
    }
}

#[async_trait]
impl QueueEnginePort for QueueEngine {
    async fn enqueue(
        &self,
        destination_id: &DestinationId,
        entry: QueueEntry,
    ) -> Result<EnqueueReceipt, QueueError> {
        if !self.is_accepting() {
            return Err(QueueError::ShuttingDown);
        }
        if entry.destination_id() != destination_id {
            return Err(QueueError::InvalidEntry(format!(
                "entry belongs to {}, not {}",
                entry.destination_id(),
                destination_id
            )));
        }

        let handle = self.get_or_spawn(destination_id);
        // 与 shutdown 竞争时，新建的 actor 可能未被排空
        if !self.is_accepting() {
            return Err(QueueError::ShuttingDown);
        }

        Self::request(&handle, |reply| ActorCommand::Enqueue { entry, reply }).await?
    }

    async fn remove(
        &self,
        destination_id: &DestinationId,
        entry_id: EntryId,
    ) -> Result<(), QueueError> {
        let handle = self
            .lookup(destination_id)
            .ok_or(QueueError::NotFound(entry_id))?;
        Self::request(&handle, |reply| ActorCommand::Remove { entry_id, reply }).await?
    }

    async fn skip(&self, destination_id: &DestinationId) -> Result<(), QueueError> {
        let handle = self.lookup(destination_id).ok_or(QueueError::Idle)?;
        Self::request(&handle, |reply| ActorCommand::Skip { reply }).await?
    }

    async fn reorder(
        &self,
        destination_id: &DestinationId,
        entry_id: EntryId,
        new_index: usize,
    ) -> Result<(), QueueError> {
        let handle = self
            .lookup(destination_id)
            .ok_or(QueueError::NotFound(entry_id))?;
        Self::request(&handle, |reply| ActorCommand::Reorder {
            entry_id,
            new_index,
            reply,
        })
        .await?
    }

    async fn resume(&self, destination_id: &DestinationId) -> Result<(), QueueError> {
        if !self.is_accepting() {
            return Err(QueueError::ShuttingDown);
        }
        let handle = self.lookup(destination_id).ok_or(QueueError::Idle)?;
        Self::request(&handle, |reply| ActorCommand::Resume { reply }).await?
    }

    async fn snapshot(&self, destination_id: &DestinationId) -> DestinationSnapshot {
        match self.lookup(destination_id) {
            Some(handle) => Self::request(&handle, |reply| ActorCommand::Snapshot { reply })
                .await
                .unwrap_or_else(|_| DestinationSnapshot::empty(destination_id.clone())),
            None => DestinationSnapshot::empty(destination_id.clone()),
        }
    }

    async fn list(&self) -> Vec<DestinationSnapshot> {
        let handles: Vec<DestinationHandle> =
            self.registry.iter().map(|h| h.value().clone()).collect();

        let snapshots = join_all(
            handles
                .iter()
                .map(|handle| Self::request(handle, |reply| ActorCommand::Snapshot { reply })),
        )
        .await;

        snapshots.into_iter().filter_map(Result::ok).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use crate::domain::queue::{QueueState, SessionId};
    use crate::infrastructure::events::QueueEvent;
    use crate::test_support::{
        destination, entry, eventually, MemoryMediaStorage, MemoryRepository, RecordingVoiceClient,
        VoiceCall,
    };

    struct Harness {
        engine: Arc<QueueEngine>,
        voice: Arc<RecordingVoiceClient>,
        repository: Arc<MemoryRepository>,
        media: Arc<MemoryMediaStorage>,
        events: Arc<EventPublisher>,
    }

    fn harness_with(config: QueueEngineConfig, repository: MemoryRepository) -> Harness {
        let voice = Arc::new(RecordingVoiceClient::default());
        let repository = Arc::new(repository);
        let media = Arc::new(MemoryMediaStorage::default());
        let events = EventPublisher::new().arc();
        let engine = QueueEngine::new(
            config,
            voice.clone(),
            repository.clone(),
            media.clone(),
            events.clone(),
        )
        .arc();
        Harness {
            engine,
            voice,
            repository,
            media,
            events,
        }
    }

    fn harness_config() -> QueueEngineConfig {
        QueueEngineConfig {
            idle_grace: Duration::from_secs(60),
            mailbox_capacity: 16,
            call_timeout: Duration::from_millis(50),
            join_timeout: Duration::from_millis(200),
        }
    }

    fn harness() -> Harness {
        harness_with(harness_config(), MemoryRepository::default())
    }

    impl Harness {
        async fn submit(&self, destination_id: &DestinationId, title: &str) -> QueueEntry {
            let e = entry(destination_id, title);
            self.media.insert(&e);
            self.engine.enqueue(destination_id, e.clone()).await.unwrap();
            e
        }

        fn plays_for(&self, destination_id: &DestinationId) -> Vec<(SessionId, EntryId)> {
            self.voice
                .plays()
                .into_iter()
                .filter(|(d, _, _)| d == destination_id)
                .map(|(_, s, e)| (s, e))
                .collect()
        }

        async fn wait_for_plays(&self, destination_id: &DestinationId, count: usize) -> bool {
            eventually(|| self.plays_for(destination_id).len() >= count).await
        }

        fn complete(&self, destination_id: &DestinationId, session: SessionId) {
            self.engine
                .dispatch(VoiceEvent::completed(destination_id.clone(), session));
        }
    }

    #[tokio::test]
    async fn test_plays_entries_in_order() {
        let h = harness();
        let guild = destination("guild-1");

        let a = h.submit(&guild, "A").await;
        let b = h.submit(&guild, "B").await;
        let c = h.submit(&guild, "C").await;

        assert!(h.wait_for_plays(&guild, 1).await);
        let (s1, first) = h.plays_for(&guild)[0];
        assert_eq!(first, a.id());

        let snapshot = h.engine.snapshot(&guild).await;
        assert_eq!(snapshot.state, QueueState::Playing);
        let pending: Vec<_> = snapshot.pending.iter().map(QueueEntry::id).collect();
        assert_eq!(pending, vec![b.id(), c.id()]);

        h.complete(&guild, s1);
        assert!(h.wait_for_plays(&guild, 2).await);
        let (s2, second) = h.plays_for(&guild)[1];
        assert_eq!(second, b.id());
        assert_ne!(s1, s2);

        h.engine.skip(&guild).await.unwrap();
        assert!(h.wait_for_plays(&guild, 3).await);
        let (s3, third) = h.plays_for(&guild)[2];
        assert_eq!(third, c.id());

        h.complete(&guild, s3);
        assert!(eventually(|| h.media.len() == 0).await);

        let snapshot = h.engine.snapshot(&guild).await;
        assert_eq!(snapshot.state, QueueState::Idle);
        assert!(snapshot.currently_playing.is_none());
        assert!(snapshot.pending.is_empty());
        assert!(h.repository.ids().is_empty());
        assert_eq!(h.voice.count(|c| matches!(c, VoiceCall::Join(_))), 1);
        assert_eq!(h.voice.count(|c| matches!(c, VoiceCall::Stop(_))), 1);
    }

    #[tokio::test]
    async fn test_concurrent_enqueue_starts_single_session() {
        let h = harness();
        let guild = destination("guild-1");

        let mut tasks = Vec::new();
        for i in 0..10 {
            let engine = h.engine.clone();
            let e = entry(&guild, &format!("track {}", i));
            h.media.insert(&e);
            let guild = guild.clone();
            tasks.push(tokio::spawn(async move { engine.enqueue(&guild, e).await }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert!(h.wait_for_plays(&guild, 1).await);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(h.plays_for(&guild).len(), 1);
        assert_eq!(h.voice.count(|c| matches!(c, VoiceCall::Join(_))), 1);
        let snapshot = h.engine.snapshot(&guild).await;
        assert_eq!(snapshot.pending.len(), 9);
        assert!(snapshot.currently_playing.is_some());
    }

    #[tokio::test]
    async fn test_stale_completion_after_skip_is_ignored() {
        let h = harness();
        let guild = destination("guild-1");
        h.submit(&guild, "A").await;
        h.submit(&guild, "B").await;
        let c = h.submit(&guild, "C").await;

        assert!(h.wait_for_plays(&guild, 1).await);
        let (s1, _) = h.plays_for(&guild)[0];

        h.engine.skip(&guild).await.unwrap();
        // 跳过后旧会话的完成事件迟到
        h.complete(&guild, s1);
        h.complete(&guild, s1);

        assert!(h.wait_for_plays(&guild, 2).await);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(h.plays_for(&guild).len(), 2);

        let snapshot = h.engine.snapshot(&guild).await;
        assert_eq!(snapshot.pending.len(), 1);
        assert_eq!(snapshot.pending[0].id(), c.id());
    }

    #[tokio::test]
    async fn test_destinations_are_independent() {
        let h = harness();
        let a = destination("a");
        let b = destination("b");

        h.submit(&a, "a1").await;
        h.submit(&a, "a2").await;
        h.submit(&b, "b1").await;
        h.submit(&b, "b2").await;

        assert!(h.wait_for_plays(&a, 1).await);
        assert!(h.wait_for_plays(&b, 1).await);

        let (sa, _) = h.plays_for(&a)[0];
        h.complete(&a, sa);
        assert!(h.wait_for_plays(&a, 2).await);

        assert_eq!(h.plays_for(&b).len(), 1);
        assert_eq!(h.engine.snapshot(&b).await.pending.len(), 1);
        assert_eq!(h.engine.list().await.len(), 2);
    }

    #[tokio::test]
    async fn test_stuck_destination_does_not_block_others() {
        let h = harness_with(
            QueueEngineConfig {
                join_timeout: Duration::from_secs(60),
                ..harness_config()
            },
            MemoryRepository::default(),
        );
        let stuck = destination("stuck");
        let free = destination("free");
        h.voice.hang_join_for(&stuck);

        for i in 0..3 {
            h.submit(&stuck, &format!("stuck {}", i)).await;
        }
        assert!(
            eventually(|| h.voice.count(|c| *c == VoiceCall::Join(stuck.clone())) == 1).await
        );

        let started = Instant::now();
        h.submit(&free, "free 1").await;
        assert!(h.wait_for_plays(&free, 1).await);
        assert!(started.elapsed() < Duration::from_millis(500));

        let snapshot = tokio::time::timeout(Duration::from_millis(500), h.engine.snapshot(&stuck))
            .await
            .expect("snapshot of a connecting destination must answer");
        assert_eq!(snapshot.state, QueueState::Connecting);
        assert_eq!(snapshot.pending.len(), 3);
        assert!(h.plays_for(&stuck).is_empty());

        let report = tokio::time::timeout(Duration::from_secs(1), h.engine.shutdown())
            .await
            .expect("shutdown must cancel the hung join");
        assert_eq!(report, DrainReport { destinations: 2, drained: 2 });
    }

    #[tokio::test]
    async fn test_idle_grace_releases_voice_once_and_keeps_queue() {
        let h = harness_with(
            QueueEngineConfig {
                idle_grace: Duration::from_millis(30),
                ..harness_config()
            },
            MemoryRepository::default(),
        );
        let guild = destination("guild-1");
        let mut events = h.events.subscribe_destination(&guild);

        h.submit(&guild, "A").await;
        assert!(h.wait_for_plays(&guild, 1).await);
        let (s1, _) = h.plays_for(&guild)[0];
        h.complete(&guild, s1);

        assert!(eventually(|| h.voice.count(|c| matches!(c, VoiceCall::Leave(_))) == 1).await);
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(h.voice.count(|c| matches!(c, VoiceCall::Leave(_))), 1);

        let snapshot = h.engine.snapshot(&guild).await;
        assert_eq!(snapshot.state, QueueState::Idle);
        assert!(!snapshot.connected);
        assert_eq!(h.engine.destination_count(), 1);

        let mut saw_release = false;
        while let Ok(event) = events.try_recv() {
            if matches!(event, QueueEvent::VoiceReleased { .. }) {
                saw_release = true;
            }
        }
        assert!(saw_release);

        // 释放后再次入队会重新加入
        h.submit(&guild, "B").await;
        assert!(h.wait_for_plays(&guild, 2).await);
        assert_eq!(h.voice.count(|c| matches!(c, VoiceCall::Join(_))), 2);
    }

    #[tokio::test]
    async fn test_enqueue_within_grace_reuses_connection() {
        let h = harness();
        let guild = destination("guild-1");

        h.submit(&guild, "A").await;
        assert!(h.wait_for_plays(&guild, 1).await);
        let (s1, _) = h.plays_for(&guild)[0];
        h.complete(&guild, s1);
        assert!(eventually(|| h.media.len() == 0).await);

        h.submit(&guild, "B").await;
        assert!(h.wait_for_plays(&guild, 2).await);
        assert_eq!(h.voice.count(|c| matches!(c, VoiceCall::Join(_))), 1);
        assert_eq!(h.voice.count(|c| matches!(c, VoiceCall::Leave(_))), 0);
    }

    #[tokio::test]
    async fn test_restore_keeps_entries_pending_until_resume() {
        let guild = destination("guild-1");
        let e1 = entry(&guild, "one");
        let e2 = entry(&guild, "two");
        let lost = entry(&guild, "lost");
        let h = harness_with(
            harness_config(),
            MemoryRepository::with_entries(vec![e1.clone(), lost.clone(), e2.clone()]),
        );
        h.media.insert(&e1);
        h.media.insert(&e2);

        let restored = h.engine.restore_pending().await.unwrap();
        assert_eq!(restored, 2);
        assert_eq!(h.repository.ids(), vec![e1.id(), e2.id()]);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(h.voice.calls().is_empty());
        let snapshot = h.engine.snapshot(&guild).await;
        assert_eq!(snapshot.state, QueueState::Idle);
        assert_eq!(snapshot.pending.len(), 2);

        h.engine.resume(&guild).await.unwrap();
        assert!(h.wait_for_plays(&guild, 1).await);
        assert_eq!(h.plays_for(&guild)[0].1, e1.id());
    }

    #[tokio::test]
    async fn test_storage_failure_rejects_entry() {
        let h = harness();
        let guild = destination("guild-1");
        h.repository.set_failing(true);

        let e = entry(&guild, "A");
        h.media.insert(&e);
        let result = h.engine.enqueue(&guild, e).await;

        assert!(matches!(result, Err(QueueError::StorageFailure(_))));
        assert!(h.engine.snapshot(&guild).await.pending.is_empty());
        assert!(h.voice.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_media_is_invalid() {
        let h = harness();
        let guild = destination("guild-1");

        let result = h.engine.enqueue(&guild, entry(&guild, "A")).await;

        assert!(matches!(result, Err(QueueError::InvalidEntry(_))));
        assert!(h.repository.ids().is_empty());
    }

    #[tokio::test]
    async fn test_operations_on_unknown_destination() {
        let h = harness();
        let nowhere = destination("nowhere");

        assert!(matches!(
            h.engine.remove(&nowhere, EntryId::new()).await,
            Err(QueueError::NotFound(_))
        ));
        assert!(matches!(h.engine.skip(&nowhere).await, Err(QueueError::Idle)));
        assert!(matches!(
            h.engine.reorder(&nowhere, EntryId::new(), 0).await,
            Err(QueueError::NotFound(_))
        ));
        assert_eq!(h.engine.snapshot(&nowhere).await.state, QueueState::Idle);
        assert_eq!(h.engine.destination_count(), 0);
    }

    #[tokio::test]
    async fn test_reorder_and_remove_persist() {
        let h = harness();
        let guild = destination("guild-1");
        h.submit(&guild, "A").await;
        let b = h.submit(&guild, "B").await;
        let c = h.submit(&guild, "C").await;
        let d = h.submit(&guild, "D").await;
        assert!(h.wait_for_plays(&guild, 1).await);

        h.engine.reorder(&guild, d.id(), 0).await.unwrap();
        h.engine.remove(&guild, c.id()).await.unwrap();

        let pending: Vec<_> = h
            .engine
            .snapshot(&guild)
            .await
            .pending
            .iter()
            .map(QueueEntry::id)
            .collect();
        assert_eq!(pending, vec![d.id(), b.id()]);
        assert_eq!(h.repository.ids(), vec![d.id(), b.id()]);
        assert!(!h.media.contains(c.media()));

        assert!(matches!(
            h.engine.reorder(&guild, b.id(), 5).await,
            Err(QueueError::OutOfRange { index: 5, len: 2 })
        ));
    }

    #[tokio::test]
    async fn test_join_failure_returns_to_idle_keeping_entries() {
        let h = harness();
        let guild = destination("guild-1");
        h.voice.set_fail_join(true);
        let mut events = h.events.subscribe_global();

        h.submit(&guild, "A").await;
        h.submit(&guild, "B").await;

        assert!(
            eventually(|| matches!(
                events.try_recv(),
                Ok(QueueEvent::ConnectionFailed { .. })
            ))
            .await
        );

        let snapshot = h.engine.snapshot(&guild).await;
        assert_eq!(snapshot.state, QueueState::Idle);
        assert_eq!(snapshot.pending.len(), 2);
        assert!(h.voice.plays().is_empty());

        h.voice.set_fail_join(false);
        h.engine.resume(&guild).await.unwrap();
        assert!(h.wait_for_plays(&guild, 1).await);
    }

    #[tokio::test]
    async fn test_playback_failure_advances() {
        let h = harness();
        let guild = destination("guild-1");
        h.submit(&guild, "A").await;
        let b = h.submit(&guild, "B").await;
        assert!(h.wait_for_plays(&guild, 1).await);
        let (s1, _) = h.plays_for(&guild)[0];

        h.engine
            .dispatch(VoiceEvent::failed(guild.clone(), s1, "decoder error"));

        assert!(h.wait_for_plays(&guild, 2).await);
        assert_eq!(h.plays_for(&guild)[1].1, b.id());
    }

    #[tokio::test]
    async fn test_shutdown_bounded_with_hanging_leave() {
        let h = harness();
        let a = destination("a");
        let b = destination("b");
        h.submit(&a, "a1").await;
        h.submit(&a, "a2").await;
        h.submit(&b, "b1").await;
        assert!(h.wait_for_plays(&a, 1).await);
        assert!(h.wait_for_plays(&b, 1).await);

        h.voice.set_hang_on_leave(true);
        let report = tokio::time::timeout(Duration::from_secs(1), h.engine.shutdown())
            .await
            .expect("shutdown must finish within the deadline");

        assert_eq!(report, DrainReport { destinations: 2, drained: 2 });
        assert_eq!(h.voice.count(|c| matches!(c, VoiceCall::Leave(_))), 2);
        assert_eq!(h.voice.count(|c| matches!(c, VoiceCall::Stop(_))), 2);
        // 未播放的条目保留在影子副本中
        assert_eq!(h.repository.ids().len(), 1);

        let result = h.engine.enqueue(&a, entry(&a, "late")).await;
        assert!(matches!(result, Err(QueueError::ShuttingDown)));
    }
}
