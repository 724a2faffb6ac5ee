//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（QueueEngine、VoiceClient、MediaStorage、Repository 等）
//! - commands: CQRS 命令及处理器
//! - queries: CQRS 查询及处理器
//! - error: 应用层错误定义

pub mod commands;
pub mod error;
pub mod ports;
pub mod queries;

// Re-exports
pub use commands::{
    handlers::{
        RemoveEntryHandler, ReorderEntryHandler, ResumeQueueHandler, SkipCurrentHandler,
        UploadAudioHandler,
    },
    RemoveEntry, ReorderEntry, ResumeQueue, SkipCurrent, UploadAudio,
};

pub use error::ApplicationError;

pub use ports::{
    // Audio probe
    AudioInfo,
    AudioProbePort,
    ProbeError,
    // Media storage
    MediaStorageError,
    MediaStoragePort,
    StoredMedia,
    // Queue engine
    EnqueueReceipt,
    QueueEnginePort,
    // Repositories
    QueueEntryRepositoryPort,
    RepositoryError,
    // Voice client
    PlayRequest,
    VoiceClientError,
    VoiceClientPort,
    VoiceEvent,
    VoiceEventKind,
    VoiceEventSink,
};

pub use queries::{
    handlers::{GetMediaHandler, GetQueueHandler, ListQueuesHandler},
    GetMedia, GetQueue, ListQueues,
};
