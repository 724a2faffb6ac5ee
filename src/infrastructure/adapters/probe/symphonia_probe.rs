//! Symphonia Probe - 基于 symphonia 的音频探测
//!
//! 只解析容器头并解码首个可用数据包，不做完整解码

use bytes::Bytes;
use std::io::Cursor;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::application::ports::{AudioInfo, AudioProbePort, ProbeError};
use crate::domain::queue::AudioFormat;

/// 读取首个可解码数据包前最多尝试的包数
const MAX_PROBE_PACKETS: usize = 16;

/// 基于 symphonia 实现的音频探测器
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaProbe;

impl SymphoniaProbe {
    pub fn new() -> Self {
        Self
    }
}

impl AudioProbePort for SymphoniaProbe {
    fn probe(&self, data: Bytes, format: AudioFormat) -> Result<AudioInfo, ProbeError> {
        let cursor = Cursor::new(data);
        let mss = MediaSourceStream::new(Box::new(cursor), Default::default());

        let mut hint = Hint::new();
        hint.with_extension(format.extension());
        hint.mime_type(format.mime_type());

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| match e {
                SymphoniaError::Unsupported(msg) => ProbeError::Unsupported(msg.to_string()),
                other => ProbeError::Malformed(format!("Probe failed: {}", other)),
            })?;

        let mut reader = probed.format;

        let track = reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| ProbeError::Malformed("No audio track found".to_string()))?;
        let track_id = track.id;
        let params = track.codec_params.clone();

        let mut decoder = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| ProbeError::Unsupported(format!("Decoder creation failed: {}", e)))?;

        let mut decoded_spec = None;
        for _ in 0..MAX_PROBE_PACKETS {
            let packet = match reader.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    break;
                }
                Err(e) => return Err(ProbeError::Malformed(format!("Packet read error: {}", e))),
            };
            if packet.track_id() != track_id {
                continue;
            }
            match decoder.decode(&packet) {
                Ok(decoded) => {
                    decoded_spec = Some(*decoded.spec());
                    break;
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    tracing::debug!(error = %e, "Decode error while probing (skipping packet)");
                }
                Err(e) => return Err(ProbeError::Malformed(format!("Decode failed: {}", e))),
            }
        }

        let spec = decoded_spec
            .ok_or_else(|| ProbeError::Malformed("No decodable audio packet".to_string()))?;

        let sample_rate = params.sample_rate.unwrap_or(spec.rate);
        let channels = params
            .channels
            .unwrap_or(spec.channels)
            .count() as u8;

        let duration_ms = match (params.n_frames, sample_rate) {
            (Some(frames), rate) if rate > 0 => Some(frames * 1000 / rate as u64),
            _ => None,
        };

        Ok(AudioInfo {
            duration_ms,
            sample_rate,
            channels,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::wav_bytes;

    #[test]
    fn test_probe_wav_duration() {
        let wav = wav_bytes(1_500);

        let info = SymphoniaProbe::new().probe(Bytes::from(wav), AudioFormat::Wav).unwrap();

        assert_eq!(info.duration_ms, Some(1_500));
        assert_eq!(info.sample_rate, 16_000);
        assert_eq!(info.channels, 1);
    }

    #[test]
    fn test_probe_rejects_garbage() {
        let garbage = b"this is definitely not an audio file".repeat(8);

        let result = SymphoniaProbe::new().probe(Bytes::from(garbage), AudioFormat::Mp3);

        assert!(result.is_err());
    }

    #[test]
    fn test_probe_rejects_truncated_wav() {
        let wav = Bytes::from(wav_bytes(500));

        let result = SymphoniaProbe::new().probe(wav.slice(..20), AudioFormat::Wav);

        assert!(result.is_err());
    }
}
