//! Application State
//!
//! 包含所有 Command/Query Handlers 的应用状态

use std::sync::Arc;

use crate::application::{
    // Command handlers
    RemoveEntryHandler, ReorderEntryHandler, ResumeQueueHandler, SkipCurrentHandler,
    UploadAudioHandler,
    // Query handlers
    GetMediaHandler, GetQueueHandler, ListQueuesHandler,
    // Ports
    AudioProbePort, MediaStoragePort, QueueEnginePort, VoiceEventSink,
};
use crate::domain::queue::DestinationId;
use crate::infrastructure::events::EventPublisher;

/// HTTP 层选项
#[derive(Debug, Clone)]
pub struct HttpOptions {
    /// 上传未指定目的地时使用
    pub default_destination: Option<DestinationId>,
    pub max_upload_size: u64,
}

/// 应用状态
pub struct AppState {
    // ========== Ports ==========
    pub event_publisher: Arc<EventPublisher>,
    /// 语音桥回调事件的入口
    pub voice_events: VoiceEventSink,
    pub options: HttpOptions,

    // ========== Command Handlers ==========
    pub upload_audio_handler: UploadAudioHandler,
    pub remove_entry_handler: RemoveEntryHandler,
    pub skip_current_handler: SkipCurrentHandler,
    pub reorder_entry_handler: ReorderEntryHandler,
    pub resume_queue_handler: ResumeQueueHandler,

    // ========== Query Handlers ==========
    pub get_queue_handler: GetQueueHandler,
    pub list_queues_handler: ListQueuesHandler,
    pub get_media_handler: GetMediaHandler,
}

impl AppState {
    /// 创建应用状态
    pub fn new(
        engine: Arc<dyn QueueEnginePort>,
        media_storage: Arc<dyn MediaStoragePort>,
        audio_probe: Arc<dyn AudioProbePort>,
        event_publisher: Arc<EventPublisher>,
        voice_events: VoiceEventSink,
        options: HttpOptions,
    ) -> Self {
        Self {
            event_publisher,
            voice_events,

            // Command handlers
            upload_audio_handler: UploadAudioHandler::new(
                engine.clone(),
                media_storage.clone(),
                audio_probe,
                options.max_upload_size,
            ),
            remove_entry_handler: RemoveEntryHandler::new(engine.clone()),
            skip_current_handler: SkipCurrentHandler::new(engine.clone()),
            reorder_entry_handler: ReorderEntryHandler::new(engine.clone()),
            resume_queue_handler: ResumeQueueHandler::new(engine.clone()),

            // Query handlers
            get_queue_handler: GetQueueHandler::new(engine.clone()),
            list_queues_handler: ListQueuesHandler::new(engine),
            get_media_handler: GetMediaHandler::new(media_storage),

            options,
        }
    }
}
