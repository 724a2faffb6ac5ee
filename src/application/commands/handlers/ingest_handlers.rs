//! Ingest Command Handlers
//!
//! 上传流水线：校验格式与大小 → 探测音频 → 存储媒体 → 入队

use std::path::Path;
use std::sync::Arc;

use crate::application::commands::UploadAudio;
use crate::application::error::ApplicationError;
use crate::application::ports::{
    AudioProbePort, EnqueueReceipt, MediaStoragePort, QueueEnginePort,
};
use crate::domain::queue::{AudioFormat, EntryId, QueueEntry};

const DEFAULT_SUBMITTER: &str = "anonymous";
const DEFAULT_TITLE: &str = "Untitled";

/// UploadAudio Handler
pub struct UploadAudioHandler {
    engine: Arc<dyn QueueEnginePort>,
    media_storage: Arc<dyn MediaStoragePort>,
    audio_probe: Arc<dyn AudioProbePort>,
    max_upload_size: u64,
}

impl UploadAudioHandler {
    pub fn new(
        engine: Arc<dyn QueueEnginePort>,
        media_storage: Arc<dyn MediaStoragePort>,
        audio_probe: Arc<dyn AudioProbePort>,
        max_upload_size: u64,
    ) -> Self {
        Self {
            engine,
            media_storage,
            audio_probe,
            max_upload_size,
        }
    }

    pub async fn handle(&self, command: UploadAudio) -> Result<EnqueueReceipt, ApplicationError> {
        if command.data.is_empty() {
            return Err(ApplicationError::validation("Audio file is empty"));
        }
        if command.data.len() as u64 > self.max_upload_size {
            return Err(ApplicationError::validation(format!(
                "Audio file exceeds {} bytes",
                self.max_upload_size
            )));
        }

        let format = detect_format(command.file_name.as_deref(), command.content_type.as_deref())
            .ok_or_else(|| {
                ApplicationError::validation("Only WAV, MP3, FLAC, OGG audio files are allowed")
            })?;

        let data = command.data;

        // 解码探测是 CPU 密集操作
        let probe = self.audio_probe.clone();
        let probe_data = data.clone();
        let info = tokio::task::spawn_blocking(move || probe.probe(probe_data, format))
            .await
            .map_err(|e| ApplicationError::internal(format!("Audio probe task failed: {}", e)))?
            .map_err(|e| ApplicationError::InvalidEntry(e.to_string()))?;

        let title = command
            .title
            .filter(|t| !t.trim().is_empty())
            .or_else(|| command.file_name.as_deref().and_then(file_stem))
            .unwrap_or_else(|| DEFAULT_TITLE.to_string());
        let submitter = command
            .submitter_id
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SUBMITTER.to_string());

        let entry_id = EntryId::new();
        let media = self.media_storage.store(entry_id, format, &data).await?;

        let entry = match QueueEntry::with_id(
            entry_id,
            command.destination_id.clone(),
            title,
            submitter,
            media.clone(),
            info.duration_ms,
        ) {
            Ok(entry) => entry,
            Err(e) => {
                self.discard_media(&media).await;
                return Err(e.into());
            }
        };

        match self.engine.enqueue(&command.destination_id, entry).await {
            Ok(receipt) => {
                tracing::info!(
                    destination_id = %receipt.destination_id,
                    entry_id = %receipt.entry_id,
                    position = receipt.position,
                    duration_ms = ?info.duration_ms,
                    "Upload accepted"
                );
                Ok(receipt)
            }
            Err(e) => {
                self.discard_media(&media).await;
                Err(e.into())
            }
        }
    }

    async fn discard_media(&self, media: &crate::domain::queue::MediaLocator) {
        if let Err(e) = self.media_storage.delete(media).await {
            tracing::warn!(media = %media, error = %e, "Failed to delete rejected upload");
        }
    }
}

/// 根据文件名扩展名或 Content-Type 判断格式
///
/// 桌面客户端以 application/octet-stream 上传，此时只能依赖扩展名
fn detect_format(file_name: Option<&str>, content_type: Option<&str>) -> Option<AudioFormat> {
    let from_ext = file_name
        .and_then(|f| Path::new(f).extension())
        .and_then(|e| e.to_str())
        .and_then(AudioFormat::from_extension);

    from_ext.or_else(|| content_type.and_then(AudioFormat::from_mime))
}

fn file_stem(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
