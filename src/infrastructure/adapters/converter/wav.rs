//! WAV 容器头读写
//!
//! 16-bit PCM WAV 的编码（placeholder 引擎输出）
//! 与头部解析（ffprobe 不可用时的时长探测）

/// 解析出的 WAV 音频信息
#[derive(Debug, Clone, Copy)]
pub(crate) struct WavInfo {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub data_size: u32,
}

impl WavInfo {
    /// 由头部字段计算时长
    pub fn duration_secs(&self) -> f64 {
        let byte_rate =
            self.sample_rate as u64 * self.channels as u64 * (self.bits_per_sample / 8) as u64;
        if byte_rate == 0 {
            return 0.0;
        }
        self.data_size as f64 / byte_rate as f64
    }
}

/// 解析 WAV 头，遍历 chunk 找到 fmt 与 data
pub(crate) fn parse_wav_header(data: &[u8]) -> Option<WavInfo> {
    if data.len() < 44 || &data[0..4] != b"RIFF" || &data[8..12] != b"WAVE" {
        return None;
    }

    let mut pos = 12;
    let mut fmt: Option<(u32, u16, u16)> = None;
    let mut data_size: Option<u32> = None;

    while pos + 8 <= data.len() {
        let chunk_id = &data[pos..pos + 4];
        let chunk_size =
            u32::from_le_bytes([data[pos + 4], data[pos + 5], data[pos + 6], data[pos + 7]]);

        match chunk_id {
            b"fmt " if chunk_size >= 16 && pos + 8 + 16 <= data.len() => {
                let f = &data[pos + 8..pos + 24];
                let channels = u16::from_le_bytes([f[2], f[3]]);
                let sample_rate = u32::from_le_bytes([f[4], f[5], f[6], f[7]]);
                let bits_per_sample = u16::from_le_bytes([f[14], f[15]]);
                fmt = Some((sample_rate, channels, bits_per_sample));
            }
            b"data" => {
                data_size = Some(chunk_size);
            }
            _ => {}
        }

        // chunk 按偶数字节对齐
        pos += 8 + chunk_size as usize + (chunk_size as usize & 1);
    }

    let (sample_rate, channels, bits_per_sample) = fmt?;
    Some(WavInfo {
        sample_rate,
        channels,
        bits_per_sample,
        data_size: data_size?,
    })
}

/// 把单声道 f32 样本编码成 16-bit PCM WAV
pub(crate) fn encode_wav_mono(samples: &[f32], sample_rate: u32) -> Vec<u8> {
    let bits_per_sample: u16 = 16;
    let num_channels: u16 = 1;
    let byte_rate = sample_rate * num_channels as u32 * (bits_per_sample / 8) as u32;
    let block_align = num_channels * (bits_per_sample / 8);

    let data_size = samples.len() * 2;
    let file_size = 36 + data_size;

    let mut wav = Vec::with_capacity(44 + data_size);

    // RIFF header
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(file_size as u32).to_le_bytes());
    wav.extend_from_slice(b"WAVE");

    // fmt chunk
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM format
    wav.extend_from_slice(&num_channels.to_le_bytes());
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&byte_rate.to_le_bytes());
    wav.extend_from_slice(&block_align.to_le_bytes());
    wav.extend_from_slice(&bits_per_sample.to_le_bytes());

    // data chunk
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&(data_size as u32).to_le_bytes());
    for sample in samples {
        let clamped = sample.clamp(-1.0, 1.0);
        wav.extend_from_slice(&((clamped * 32767.0) as i16).to_le_bytes());
    }

    wav
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_then_parse_roundtrip() {
        let samples = vec![0.0f32; 22050]; // 1 秒静音
        let wav = encode_wav_mono(&samples, 22050);

        let info = parse_wav_header(&wav).unwrap();
        assert_eq!(info.sample_rate, 22050);
        assert_eq!(info.channels, 1);
        assert_eq!(info.bits_per_sample, 16);
        assert!((info.duration_secs() - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_parse_rejects_non_wav() {
        assert!(parse_wav_header(b"not a wav file at all, nowhere near").is_none());
        assert!(parse_wav_header(b"RIFF").is_none());
    }

    #[test]
    fn test_parse_requires_data_chunk() {
        let mut wav = encode_wav_mono(&[0.0; 100], 8000);
        // 破坏 data chunk 标识
        assert_eq!(&wav[36..40], b"data");
        wav[36] = b'x';
        assert!(parse_wav_header(&wav).is_none());
    }
}
