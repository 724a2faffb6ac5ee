//! Audio Probe Port
//!
//! 上传时探测音频是否可解码并估算时长

use bytes::Bytes;
use thiserror::Error;

use crate::domain::queue::AudioFormat;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("Unsupported audio: {0}")]
    Unsupported(String),

    #[error("Malformed audio: {0}")]
    Malformed(String),
}

/// 音频信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioInfo {
    /// 估算时长，容器未声明帧数时为 None
    pub duration_ms: Option<u64>,
    pub sample_rate: u32,
    pub channels: u8,
}

/// Audio Probe Port
///
/// 纯 CPU 操作，调用方负责放到阻塞线程池；`Bytes` 克隆不复制数据
pub trait AudioProbePort: Send + Sync {
    fn probe(&self, data: Bytes, format: AudioFormat) -> Result<AudioInfo, ProbeError>;
}
