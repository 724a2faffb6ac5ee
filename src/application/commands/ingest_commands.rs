//! Ingest Commands - 上传相关命令

use bytes::Bytes;

use crate::domain::queue::DestinationId;

/// 上传音频并加入队列
#[derive(Debug, Clone)]
pub struct UploadAudio {
    pub destination_id: DestinationId,
    pub submitter_id: Option<String>,
    pub title: Option<String>,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}
