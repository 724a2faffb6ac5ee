//! Media Storage Port - 出站端口
//!
//! 上传的原始音频存储

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

use crate::domain::queue::{AudioFormat, EntryId, MediaLocator};

/// 媒体存储错误
#[derive(Debug, Error)]
pub enum MediaStorageError {
    #[error("Media not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    IoError(String),
}

/// 已存储媒体的本地信息（用于下载）
#[derive(Debug, Clone)]
pub struct StoredMedia {
    pub path: PathBuf,
    pub format: AudioFormat,
    pub size_bytes: u64,
}

/// Media Storage Port
#[async_trait]
pub trait MediaStoragePort: Send + Sync {
    /// 保存媒体，返回定位符
    async fn store(
        &self,
        entry_id: EntryId,
        format: AudioFormat,
        data: &[u8],
    ) -> Result<MediaLocator, MediaStorageError>;

    /// 检查媒体是否可达
    async fn exists(&self, locator: &MediaLocator) -> bool;

    /// 根据条目 ID 定位媒体
    async fn locate(&self, entry_id: EntryId) -> Result<StoredMedia, MediaStorageError>;

    /// 删除媒体（不存在时视为成功）
    async fn delete(&self, locator: &MediaLocator) -> Result<(), MediaStorageError>;
}
