//! Destination Actor - 每个目的地一个任务
//!
//! actor 独占 [`DestinationQueue`]，串行处理邮箱中的命令与信号，
//! 并执行状态机返回的 [`Effect`]

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use super::lane::{AdapterLane, LaneCall, LaneTimeouts};
use crate::application::ports::{
    EnqueueReceipt, MediaStoragePort, PlayRequest, QueueEntryRepositoryPort, RepositoryError,
    VoiceClientPort, VoiceEvent, VoiceEventKind,
};
use crate::domain::queue::{
    DestinationId, DestinationQueue, DestinationSnapshot, Effect, EntryId, PlaybackOutcome,
    QueueEntry, QueueError, SessionId,
};
use crate::infrastructure::events::{EventPublisher, QueueEvent};

type Reply<T> = oneshot::Sender<T>;

/// 外部命令（有界邮箱）
#[derive(Debug)]
pub(super) enum ActorCommand {
    Enqueue {
        entry: QueueEntry,
        reply: Reply<Result<EnqueueReceipt, QueueError>>,
    },
    Remove {
        entry_id: EntryId,
        reply: Reply<Result<(), QueueError>>,
    },
    Skip {
        reply: Reply<Result<(), QueueError>>,
    },
    Reorder {
        entry_id: EntryId,
        new_index: usize,
        reply: Reply<Result<(), QueueError>>,
    },
    Resume {
        reply: Reply<Result<(), QueueError>>,
    },
    Snapshot {
        reply: Reply<DestinationSnapshot>,
    },
    Restore {
        entries: Vec<QueueEntry>,
        reply: Reply<usize>,
    },
    /// 停止播放、离开语音频道后退出
    Shutdown { reply: Reply<()> },
}

/// 内部信号（语音事件、lane 结果、计时器），不受邮箱容量限制
#[derive(Debug)]
pub(super) enum Signal {
    Voice(VoiceEvent),
    Joined { attempt: u64 },
    JoinFailed { attempt: u64, reason: String },
    PlayFailed { session: SessionId, reason: String },
    ReleaseDue { token: u64 },
}

/// actor 共享的依赖
pub(super) struct ActorContext {
    pub voice: Arc<dyn VoiceClientPort>,
    pub repository: Arc<dyn QueueEntryRepositoryPort>,
    pub media: Arc<dyn MediaStoragePort>,
    pub events: Arc<EventPublisher>,
}

#[derive(Debug, Clone, Copy)]
pub(super) struct ActorSettings {
    pub idle_grace: Duration,
    pub mailbox_capacity: usize,
    pub timeouts: LaneTimeouts,
}

/// 注册表中保存的 actor 句柄
#[derive(Clone)]
pub(super) struct DestinationHandle {
    pub commands: mpsc::Sender<ActorCommand>,
    pub signals: mpsc::UnboundedSender<Signal>,
}

pub(super) struct DestinationActor {
    queue: DestinationQueue,
    context: Arc<ActorContext>,
    idle_grace: Duration,
    commands: mpsc::Receiver<ActorCommand>,
    signals: mpsc::UnboundedReceiver<Signal>,
    signal_tx: mpsc::UnboundedSender<Signal>,
    lane: mpsc::UnboundedSender<LaneCall>,
    abort_joins: CancellationToken,
}

impl DestinationActor {
    /// 启动 actor 及其 lane
    pub(super) fn spawn(
        destination_id: DestinationId,
        context: Arc<ActorContext>,
        settings: ActorSettings,
    ) -> DestinationHandle {
        let (command_tx, command_rx) = mpsc::channel(settings.mailbox_capacity.max(1));
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let abort_joins = CancellationToken::new();

        let lane = AdapterLane::spawn(
            destination_id.clone(),
            context.voice.clone(),
            signal_tx.clone(),
            settings.timeouts,
            abort_joins.clone(),
        );

        let actor = Self {
            queue: DestinationQueue::new(destination_id.clone()),
            context,
            idle_grace: settings.idle_grace,
            commands: command_rx,
            signals: signal_rx,
            signal_tx: signal_tx.clone(),
            lane,
            abort_joins,
        };

        tracing::debug!(destination_id = %destination_id, "Destination actor started");
        tokio::spawn(actor.run());

        DestinationHandle {
            commands: command_tx,
            signals: signal_tx,
        }
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                biased;

                Some(signal) = self.signals.recv() => self.handle_signal(signal).await,

                command = self.commands.recv() => match command {
                    Some(command) => {
                        if !self.handle_command(command).await {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }

        tracing::debug!(destination_id = %self.queue.destination_id(), "Destination actor stopped");
    }

    /// 返回 false 表示 actor 应当退出
    async fn handle_command(&mut self, command: ActorCommand) -> bool {
        match command {
            ActorCommand::Enqueue { entry, reply } => {
                let result = self.enqueue(entry).await;
                let _ = reply.send(result);
            }
            ActorCommand::Remove { entry_id, reply } => {
                let result = self.queue.remove(entry_id);
                let _ = reply.send(self.settle(result).await);
            }
            ActorCommand::Skip { reply } => {
                let result = self.queue.skip();
                let _ = reply.send(self.settle(result).await);
            }
            ActorCommand::Reorder {
                entry_id,
                new_index,
                reply,
            } => {
                let result = self.queue.reorder(entry_id, new_index);
                let _ = reply.send(self.settle(result).await);
            }
            ActorCommand::Resume { reply } => {
                let result = self.queue.resume();
                let _ = reply.send(self.settle(result).await);
            }
            ActorCommand::Snapshot { reply } => {
                let _ = reply.send(self.queue.snapshot());
            }
            ActorCommand::Restore { entries, reply } => {
                let restored = self.queue.restore(entries);
                tracing::info!(
                    destination_id = %self.queue.destination_id(),
                    restored,
                    "Pending entries restored"
                );
                let _ = reply.send(restored);
            }
            ActorCommand::Shutdown { reply } => {
                self.drain().await;
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    async fn handle_signal(&mut self, signal: Signal) {
        let effects = match signal {
            Signal::Voice(event) => self.on_voice_event(event),
            Signal::Joined { attempt } => {
                tracing::debug!(destination_id = %self.queue.destination_id(), attempt, "Voice channel joined");
                self.queue.on_joined(attempt)
            }
            Signal::JoinFailed { attempt, reason } => self.queue.on_join_failed(attempt, reason),
            Signal::PlayFailed { session, reason } => self
                .queue
                .on_playback_finished(session, PlaybackOutcome::Failed(reason)),
            Signal::ReleaseDue { token } => {
                let effects = self.queue.on_release_due(token);
                if effects.contains(&Effect::Leave) {
                    tracing::info!(
                        destination_id = %self.queue.destination_id(),
                        "Idle grace elapsed, releasing voice connection"
                    );
                    self.publish(QueueEvent::VoiceReleased {
                        destination_id: self.queue.destination_id().to_string(),
                    });
                }
                effects
            }
        };
        self.apply(effects).await;
    }

    fn on_voice_event(&mut self, event: VoiceEvent) -> Vec<Effect> {
        match (event.kind, event.session_id) {
            (VoiceEventKind::PlaybackCompleted, Some(session)) => self
                .queue
                .on_playback_finished(session, PlaybackOutcome::Completed),
            (VoiceEventKind::PlaybackFailed { reason }, Some(session)) => self
                .queue
                .on_playback_finished(session, PlaybackOutcome::Failed(reason)),
            (VoiceEventKind::ConnectionLost { reason }, session) => {
                tracing::warn!(
                    destination_id = %self.queue.destination_id(),
                    session_id = ?session,
                    reason = %reason,
                    "Voice connection lost"
                );
                self.queue.on_connection_lost(session, reason)
            }
            (kind, None) => {
                tracing::debug!(
                    destination_id = %self.queue.destination_id(),
                    kind = ?kind,
                    "Ignoring playback event without session"
                );
                Vec::new()
            }
        }
    }

    async fn enqueue(&mut self, entry: QueueEntry) -> Result<EnqueueReceipt, QueueError> {
        self.queue.check_accepts(&entry)?;

        if !self.context.media.exists(entry.media()).await {
            return Err(QueueError::InvalidEntry(format!(
                "media not reachable: {}",
                entry.media()
            )));
        }

        // 先持久化影子副本，失败则不入队
        self.context
            .repository
            .save(&entry)
            .await
            .map_err(|e| QueueError::StorageFailure(e.to_string()))?;

        let entry_id = entry.id();
        let announced = entry.clone();
        let effects = match self.queue.enqueue(entry) {
            Ok(effects) => effects,
            Err(e) => {
                self.forget_shadow(entry_id).await;
                return Err(e);
            }
        };

        let position = self.queue.position_of(entry_id).unwrap_or(0);
        tracing::info!(
            destination_id = %self.queue.destination_id(),
            entry_id = %entry_id,
            position,
            "Entry enqueued"
        );
        self.publish(QueueEvent::entry_enqueued(&announced, position));

        self.apply(effects).await;

        Ok(EnqueueReceipt {
            entry_id,
            destination_id: self.queue.destination_id().clone(),
            position,
            state: self.queue.state(),
        })
    }

    async fn settle(&mut self, result: Result<Vec<Effect>, QueueError>) -> Result<(), QueueError> {
        let effects = result?;
        self.apply(effects).await;
        Ok(())
    }

    async fn drain(&mut self) {
        self.abort_joins.cancel();
        let effects = self.queue.drain();
        self.apply(effects).await;

        // 等待 stop/leave 完成（每个调用都有超时）
        let (done_tx, done_rx) = oneshot::channel();
        if self.lane.send(LaneCall::Barrier(done_tx)).is_ok() {
            let _ = done_rx.await;
        }

        tracing::debug!(destination_id = %self.queue.destination_id(), "Destination drained");
    }

    /// 执行副作用；存储失败只记录日志，不影响进行中的操作
    async fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Join { attempt } => self.submit(LaneCall::Join { attempt }),
                Effect::Play { session, entry } => {
                    self.forget_shadow(entry.id()).await;
                    tracing::info!(
                        destination_id = %self.queue.destination_id(),
                        session_id = %session,
                        entry_id = %entry.id(),
                        title = %entry.title(),
                        "Playback started"
                    );
                    self.publish(QueueEvent::playback_started(session, &entry));
                    self.submit(LaneCall::Play(PlayRequest {
                        destination_id: self.queue.destination_id().clone(),
                        session_id: session,
                        entry_id: entry.id(),
                        media: entry.media().clone(),
                        title: entry.title().to_string(),
                        duration_ms: entry.duration_ms(),
                    }));
                }
                Effect::Stop => self.submit(LaneCall::Stop),
                Effect::Leave => self.submit(LaneCall::Leave),
                Effect::ScheduleRelease { token } => self.schedule_release(token),
                Effect::Finished {
                    session,
                    entry,
                    outcome,
                } => {
                    match &outcome {
                        PlaybackOutcome::Failed(reason) | PlaybackOutcome::ConnectionLost(reason) => {
                            tracing::warn!(
                                destination_id = %self.queue.destination_id(),
                                session_id = %session,
                                entry_id = %entry.id(),
                                outcome = outcome.as_str(),
                                error = %reason,
                                "Playback ended with error, entry discarded"
                            );
                        }
                        _ => {
                            tracing::info!(
                                destination_id = %self.queue.destination_id(),
                                session_id = %session,
                                entry_id = %entry.id(),
                                outcome = outcome.as_str(),
                                "Playback finished"
                            );
                        }
                    }
                    self.publish(QueueEvent::playback_finished(session, &entry, &outcome));
                    self.discard_media(&entry).await;
                }
                Effect::Removed { entry } => {
                    self.forget_shadow(entry.id()).await;
                    self.discard_media(&entry).await;
                    tracing::info!(
                        destination_id = %self.queue.destination_id(),
                        entry_id = %entry.id(),
                        "Entry removed"
                    );
                    self.publish(QueueEvent::EntryRemoved {
                        destination_id: self.queue.destination_id().to_string(),
                        entry_id: entry.id(),
                    });
                }
                Effect::Reordered { order } => {
                    if let Err(e) = self
                        .context
                        .repository
                        .save_order(self.queue.destination_id(), &order)
                        .await
                    {
                        tracing::error!(
                            destination_id = %self.queue.destination_id(),
                            error = %e,
                            "Failed to persist queue order"
                        );
                    }
                    self.publish(QueueEvent::QueueReordered {
                        destination_id: self.queue.destination_id().to_string(),
                        order,
                    });
                }
                Effect::BecameIdle => {
                    tracing::info!(destination_id = %self.queue.destination_id(), "Queue idle");
                    self.publish(QueueEvent::QueueIdle {
                        destination_id: self.queue.destination_id().to_string(),
                    });
                }
                Effect::ConnectionFailed { reason } => {
                    tracing::warn!(
                        destination_id = %self.queue.destination_id(),
                        reason = %reason,
                        pending = self.queue.pending_len(),
                        "Could not join voice channel, pending entries kept"
                    );
                    self.publish(QueueEvent::ConnectionFailed {
                        destination_id: self.queue.destination_id().to_string(),
                        reason,
                    });
                }
            }
        }
    }

    fn submit(&self, call: LaneCall) {
        if self.lane.send(call).is_err() {
            tracing::error!(destination_id = %self.queue.destination_id(), "Adapter lane closed");
        }
    }

    fn schedule_release(&self, token: u64) {
        let signals = self.signal_tx.downgrade();
        let grace = self.idle_grace;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            if let Some(signals) = signals.upgrade() {
                let _ = signals.send(Signal::ReleaseDue { token });
            }
        });
    }

    async fn forget_shadow(&self, entry_id: EntryId) {
        match self.context.repository.delete(entry_id).await {
            Ok(()) => {}
            Err(RepositoryError::NotFound(_)) => {
                tracing::debug!(
                    destination_id = %self.queue.destination_id(),
                    entry_id = %entry_id,
                    "Shadow copy already gone"
                );
            }
            Err(e) => tracing::error!(
                destination_id = %self.queue.destination_id(),
                entry_id = %entry_id,
                error = %e,
                "Failed to delete shadow copy"
            ),
        }
    }

    async fn discard_media(&self, entry: &QueueEntry) {
        if let Err(e) = self.context.media.delete(entry.media()).await {
            tracing::warn!(
                destination_id = %self.queue.destination_id(),
                entry_id = %entry.id(),
                error = %e,
                "Failed to delete media"
            );
        }
    }

    fn publish(&self, event: QueueEvent) {
        self.context
            .events
            .publish(self.queue.destination_id(), event);
    }
}
