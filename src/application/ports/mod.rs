//! Application Ports - 端口定义
//!
//! 定义应用层与基础设施层之间的抽象接口

mod audio_probe;
mod media_storage;
mod queue_engine;
mod repositories;
mod voice_client;

pub use audio_probe::{AudioInfo, AudioProbePort, ProbeError};
pub use media_storage::{MediaStorageError, MediaStoragePort, StoredMedia};
pub use queue_engine::{EnqueueReceipt, QueueEnginePort};
pub use repositories::{QueueEntryRepositoryPort, RepositoryError};
pub use voice_client::{
    PlayRequest, VoiceClientError, VoiceClientPort, VoiceEvent, VoiceEventKind, VoiceEventSink,
};
