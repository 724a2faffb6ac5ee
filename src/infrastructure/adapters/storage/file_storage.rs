//! File Storage - 文件系统媒体存储实现
//!
//! 实现 MediaStoragePort trait，文件以 `{entry_id}.{ext}` 命名

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::application::ports::{MediaStorageError, MediaStoragePort, StoredMedia};
use crate::domain::queue::{AudioFormat, EntryId, MediaLocator};

const ALL_FORMATS: [AudioFormat; 4] = [
    AudioFormat::Wav,
    AudioFormat::Mp3,
    AudioFormat::Flac,
    AudioFormat::Ogg,
];

/// 文件系统媒体存储
pub struct FileMediaStorage {
    /// 存储根目录
    base_dir: PathBuf,
}

impl FileMediaStorage {
    /// 创建新的文件存储
    pub async fn new(base_dir: impl AsRef<Path>) -> Result<Self, MediaStorageError> {
        let base_dir = base_dir.as_ref().to_path_buf();

        fs::create_dir_all(&base_dir)
            .await
            .map_err(|e| MediaStorageError::IoError(e.to_string()))?;

        Ok(Self { base_dir })
    }

    /// 获取存储根目录
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn file_name(entry_id: EntryId, format: AudioFormat) -> String {
        format!("{}.{}", entry_id, format.extension())
    }

    /// 定位符只能是根目录下的文件名
    fn resolve(&self, locator: &MediaLocator) -> Option<PathBuf> {
        let name = locator.as_str();
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return None;
        }
        Some(self.base_dir.join(name))
    }
}

#[async_trait]
impl MediaStoragePort for FileMediaStorage {
    async fn store(
        &self,
        entry_id: EntryId,
        format: AudioFormat,
        data: &[u8],
    ) -> Result<MediaLocator, MediaStorageError> {
        let name = Self::file_name(entry_id, format);
        let path = self.base_dir.join(&name);
        let partial = self.base_dir.join(format!(".{}.part", name));

        // 先写临时文件再重命名，避免语音桥读到半截文件
        fs::write(&partial, data)
            .await
            .map_err(|e| MediaStorageError::IoError(e.to_string()))?;
        if let Err(e) = fs::rename(&partial, &path).await {
            let _ = fs::remove_file(&partial).await;
            return Err(MediaStorageError::IoError(e.to_string()));
        }

        tracing::debug!(
            entry_id = %entry_id,
            size = data.len(),
            path = %path.display(),
            "Stored media"
        );

        Ok(MediaLocator::new(name))
    }

    async fn exists(&self, locator: &MediaLocator) -> bool {
        match self.resolve(locator) {
            Some(path) => fs::metadata(&path).await.map(|m| m.is_file()).unwrap_or(false),
            None => false,
        }
    }

    async fn locate(&self, entry_id: EntryId) -> Result<StoredMedia, MediaStorageError> {
        for format in ALL_FORMATS {
            let path = self.base_dir.join(Self::file_name(entry_id, format));
            if let Ok(metadata) = fs::metadata(&path).await {
                if metadata.is_file() {
                    return Ok(StoredMedia {
                        path,
                        format,
                        size_bytes: metadata.len(),
                    });
                }
            }
        }

        Err(MediaStorageError::NotFound(entry_id.to_string()))
    }

    async fn delete(&self, locator: &MediaLocator) -> Result<(), MediaStorageError> {
        let path = self
            .resolve(locator)
            .ok_or_else(|| MediaStorageError::NotFound(locator.to_string()))?;

        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(media = %locator, "Deleted media");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(MediaStorageError::IoError(e.to_string())),
        }
    }
}
