//! 测试替身：端口的内存实现

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::application::ports::{
    AudioInfo, AudioProbePort, EnqueueReceipt, MediaStorageError, MediaStoragePort, PlayRequest,
    ProbeError, QueueEnginePort, QueueEntryRepositoryPort, RepositoryError,
    StoredMedia, VoiceClientError, VoiceClientPort,
};
use crate::domain::queue::{
    AudioFormat, DestinationId, DestinationSnapshot, EntryId, MediaLocator, QueueEntry,
    QueueError, QueueState, SessionId,
};

/// 轮询直到条件成立（最多 2 秒）
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

pub fn destination(id: &str) -> DestinationId {
    DestinationId::new(id).unwrap()
}

// ============================================================================
// RecordingEngine
// ============================================================================

/// 记录调用的队列引擎
#[derive(Default)]
pub struct RecordingEngine {
    enqueued: Mutex<Vec<QueueEntry>>,
    calls: AtomicUsize,
    reject: Option<QueueError>,
}

impl RecordingEngine {
    pub fn rejecting(error: QueueError) -> Self {
        Self {
            reject: Some(error),
            ..Default::default()
        }
    }

    pub fn enqueued(&self) -> Vec<QueueEntry> {
        self.enqueued.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record(&self) -> Result<(), QueueError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reject {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl QueueEnginePort for RecordingEngine {
    async fn enqueue(
        &self,
        destination_id: &DestinationId,
        entry: QueueEntry,
    ) -> Result<EnqueueReceipt, QueueError> {
        self.record()?;
        let mut enqueued = self.enqueued.lock().unwrap();
        let receipt = EnqueueReceipt {
            entry_id: entry.id(),
            destination_id: destination_id.clone(),
            position: enqueued.len(),
            state: QueueState::Connecting,
        };
        enqueued.push(entry);
        Ok(receipt)
    }

    async fn remove(&self, _: &DestinationId, _: EntryId) -> Result<(), QueueError> {
        self.record()
    }

    async fn skip(&self, _: &DestinationId) -> Result<(), QueueError> {
        self.record()
    }

    async fn reorder(&self, _: &DestinationId, _: EntryId, _: usize) -> Result<(), QueueError> {
        self.record()
    }

    async fn resume(&self, _: &DestinationId) -> Result<(), QueueError> {
        self.record()
    }

    async fn snapshot(&self, destination_id: &DestinationId) -> DestinationSnapshot {
        DestinationSnapshot::empty(destination_id.clone())
    }

    async fn list(&self) -> Vec<DestinationSnapshot> {
        Vec::new()
    }
}

// ============================================================================
// MemoryMediaStorage
// ============================================================================

#[derive(Default)]
pub struct MemoryMediaStorage {
    files: Mutex<HashMap<EntryId, (MediaLocator, AudioFormat, usize)>>,
    failing: bool,
}

impl MemoryMediaStorage {
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.files.lock().unwrap().len()
    }

    /// 登记条目已有的媒体
    pub fn insert(&self, entry: &QueueEntry) {
        self.files
            .lock()
            .unwrap()
            .insert(entry.id(), (entry.media().clone(), AudioFormat::Wav, 0));
    }

    pub fn contains(&self, locator: &MediaLocator) -> bool {
        self.files
            .lock()
            .unwrap()
            .values()
            .any(|(l, _, _)| l == locator)
    }
}

#[async_trait]
impl MediaStoragePort for MemoryMediaStorage {
    async fn store(
        &self,
        entry_id: EntryId,
        format: AudioFormat,
        data: &[u8],
    ) -> Result<MediaLocator, MediaStorageError> {
        if self.failing {
            return Err(MediaStorageError::IoError("disk unavailable".to_string()));
        }
        let locator = MediaLocator::new(format!("{}.{}", entry_id, format.extension()));
        self.files
            .lock()
            .unwrap()
            .insert(entry_id, (locator.clone(), format, data.len()));
        Ok(locator)
    }

    async fn exists(&self, locator: &MediaLocator) -> bool {
        self.contains(locator)
    }

    async fn locate(&self, entry_id: EntryId) -> Result<StoredMedia, MediaStorageError> {
        let files = self.files.lock().unwrap();
        let (locator, format, size) = files
            .get(&entry_id)
            .ok_or_else(|| MediaStorageError::NotFound(entry_id.to_string()))?;
        Ok(StoredMedia {
            path: PathBuf::from(locator.as_str()),
            format: *format,
            size_bytes: *size as u64,
        })
    }

    async fn delete(&self, locator: &MediaLocator) -> Result<(), MediaStorageError> {
        self.files.lock().unwrap().retain(|_, (l, _, _)| l != locator);
        Ok(())
    }
}

// ============================================================================
// StaticProbe
// ============================================================================

pub struct StaticProbe {
    duration_ms: Option<u64>,
}

impl StaticProbe {
    pub fn ok(duration_ms: u64) -> Self {
        Self {
            duration_ms: Some(duration_ms),
        }
    }

    pub fn malformed() -> Self {
        Self { duration_ms: None }
    }
}

impl AudioProbePort for StaticProbe {
    fn probe(&self, _data: Bytes, _format: AudioFormat) -> Result<AudioInfo, ProbeError> {
        match self.duration_ms {
            Some(duration_ms) => Ok(AudioInfo {
                duration_ms: Some(duration_ms),
                sample_rate: 48_000,
                channels: 2,
            }),
            None => Err(ProbeError::Malformed("no decodable track".to_string())),
        }
    }
}

// ============================================================================
// MemoryRepository
// ============================================================================

#[derive(Default)]
pub struct MemoryRepository {
    entries: Mutex<Vec<QueueEntry>>,
    failing: AtomicBool,
}

impl MemoryRepository {
    pub fn with_entries(entries: Vec<QueueEntry>) -> Self {
        Self {
            entries: Mutex::new(entries),
            ..Default::default()
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn ids(&self) -> Vec<EntryId> {
        self.entries.lock().unwrap().iter().map(QueueEntry::id).collect()
    }

    fn check(&self) -> Result<(), RepositoryError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(RepositoryError::DatabaseError("database is locked".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl QueueEntryRepositoryPort for MemoryRepository {
    async fn save(&self, entry: &QueueEntry) -> Result<(), RepositoryError> {
        self.check()?;
        self.entries.lock().unwrap().push(entry.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: EntryId) -> Result<Option<QueueEntry>, RepositoryError> {
        self.check()?;
        Ok(self.entries.lock().unwrap().iter().find(|e| e.id() == id).cloned())
    }

    async fn find_by_destination(
        &self,
        destination_id: &DestinationId,
    ) -> Result<Vec<QueueEntry>, RepositoryError> {
        self.check()?;
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.destination_id() == destination_id)
            .cloned()
            .collect())
    }

    async fn find_all_pending(&self) -> Result<Vec<QueueEntry>, RepositoryError> {
        self.check()?;
        Ok(self.entries.lock().unwrap().clone())
    }

    async fn delete(&self, id: EntryId) -> Result<(), RepositoryError> {
        self.check()?;
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|e| e.id() != id);
        if entries.len() == before {
            return Err(RepositoryError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn save_order(
        &self,
        destination_id: &DestinationId,
        order: &[EntryId],
    ) -> Result<(), RepositoryError> {
        self.check()?;
        let mut entries = self.entries.lock().unwrap();
        let (mut ours, others): (Vec<_>, Vec<_>) = entries
            .drain(..)
            .partition(|e| e.destination_id() == destination_id);
        ours.sort_by_key(|e| order.iter().position(|id| *id == e.id()).unwrap_or(usize::MAX));
        entries.extend(others);
        entries.extend(ours);
        Ok(())
    }
}

// ============================================================================
// RecordingVoiceClient
// ============================================================================

/// 语音客户端调用记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceCall {
    Connect,
    Disconnect,
    Join(DestinationId),
    Play {
        destination_id: DestinationId,
        session_id: SessionId,
        entry_id: EntryId,
    },
    Stop(DestinationId),
    Leave(DestinationId),
}

/// 记录调用的语音客户端，事件由测试直接发送给引擎
#[derive(Default)]
pub struct RecordingVoiceClient {
    calls: Mutex<Vec<VoiceCall>>,
    fail_join: AtomicBool,
    hang_join_for: Mutex<Option<DestinationId>>,
    hang_on_leave: AtomicBool,
}

impl RecordingVoiceClient {
    pub fn set_fail_join(&self, fail: bool) {
        self.fail_join.store(fail, Ordering::SeqCst);
    }

    /// 该目的地的 join 永不返回
    pub fn hang_join_for(&self, destination_id: &DestinationId) {
        *self.hang_join_for.lock().unwrap() = Some(destination_id.clone());
    }

    pub fn set_hang_on_leave(&self, hang: bool) {
        self.hang_on_leave.store(hang, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<VoiceCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, matches: impl Fn(&VoiceCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| matches(c)).count()
    }

    /// 所有 play 调用（按顺序）
    pub fn plays(&self) -> Vec<(DestinationId, SessionId, EntryId)> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|c| match c {
                VoiceCall::Play {
                    destination_id,
                    session_id,
                    entry_id,
                } => Some((destination_id.clone(), *session_id, *entry_id)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: VoiceCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl VoiceClientPort for RecordingVoiceClient {
    async fn connect(&self) -> Result<(), VoiceClientError> {
        self.record(VoiceCall::Connect);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), VoiceClientError> {
        self.record(VoiceCall::Disconnect);
        Ok(())
    }

    async fn join(&self, destination_id: &DestinationId) -> Result<(), VoiceClientError> {
        self.record(VoiceCall::Join(destination_id.clone()));
        let hangs = self.hang_join_for.lock().unwrap().as_ref() == Some(destination_id);
        if hangs {
            std::future::pending::<()>().await;
        }
        if self.fail_join.load(Ordering::SeqCst) {
            return Err(VoiceClientError::Unavailable("voice gateway down".to_string()));
        }
        Ok(())
    }

    async fn play(&self, request: PlayRequest) -> Result<(), VoiceClientError> {
        self.record(VoiceCall::Play {
            destination_id: request.destination_id,
            session_id: request.session_id,
            entry_id: request.entry_id,
        });
        Ok(())
    }

    async fn stop(&self, destination_id: &DestinationId) -> Result<(), VoiceClientError> {
        self.record(VoiceCall::Stop(destination_id.clone()));
        Ok(())
    }

    async fn leave(&self, destination_id: &DestinationId) -> Result<(), VoiceClientError> {
        self.record(VoiceCall::Leave(destination_id.clone()));
        if self.hang_on_leave.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}

/// 构造测试条目
pub fn entry(destination_id: &DestinationId, title: &str) -> QueueEntry {
    let id = EntryId::new();
    QueueEntry::with_id(
        id,
        destination_id.clone(),
        title,
        "tester",
        MediaLocator::new(format!("{}.wav", id)),
        Some(1_000),
    )
    .unwrap()
}

/// 生成静音 WAV：16kHz，单声道，16位
pub fn wav_bytes(duration_ms: u64) -> Vec<u8> {
    let sample_rate: u32 = 16_000;
    let num_channels: u16 = 1;
    let bits_per_sample: u16 = 16;
    let num_samples = (sample_rate as u64 * duration_ms / 1000) as usize;

    let data_size = num_samples * (bits_per_sample as usize / 8) * num_channels as usize;
    let mut wav = Vec::with_capacity(44 + data_size);

    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&((36 + data_size) as u32).to_le_bytes());
    wav.extend_from_slice(b"WAVE");

    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes());
    wav.extend_from_slice(&num_channels.to_le_bytes());
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    let byte_rate = sample_rate * num_channels as u32 * (bits_per_sample / 8) as u32;
    wav.extend_from_slice(&byte_rate.to_le_bytes());
    wav.extend_from_slice(&(num_channels * (bits_per_sample / 8)).to_le_bytes());
    wav.extend_from_slice(&bits_per_sample.to_le_bytes());

    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&(data_size as u32).to_le_bytes());
    wav.resize(44 + data_size, 0);

    wav
}
