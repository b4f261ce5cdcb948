//! Placeholder Backend - 信号合成占位引擎
//!
//! 不依赖任何模型制品，由文本确定性地生成一段音调序列 WAV。
//! 用于无 GPU / 无模型环境下的端到端联调。

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

use crate::application::ports::{SynthesisBackendPort, SynthesisError, MIN_OUTPUT_BYTES};
use crate::infrastructure::adapters::converter::wav::encode_wav_mono;

const SAMPLE_RATE: u32 = 22050;

/// 每个词的发声时长（秒）
const SECS_PER_WORD: f64 = 0.3;

/// 词间静音（秒）
const GAP_SECS: f64 = 0.05;

/// 占位合成后端
///
/// 同一文本总是产出相同的音频，保持缓存语义与真实引擎一致
pub struct PlaceholderBackend;

impl PlaceholderBackend {
    pub fn new() -> Self {
        Self
    }

    /// 逐词生成带包络的正弦音，音高由词内容确定
    fn render(text: &str) -> Vec<f32> {
        let mut samples = Vec::new();
        let gap = vec![0.0f32; (SAMPLE_RATE as f64 * GAP_SECS) as usize];

        for word in text.split_whitespace() {
            let freq = word_pitch(word);
            let count = (SAMPLE_RATE as f64 * SECS_PER_WORD) as usize;
            for i in 0..count {
                let t = i as f64 / SAMPLE_RATE as f64;
                // 短促的起落包络，避免爆音
                let envelope = (i.min(count - i) as f64 / (count as f64 * 0.1)).min(1.0);
                let value = (2.0 * std::f64::consts::PI * freq * t).sin() * 0.3 * envelope;
                samples.push(value as f32);
            }
            samples.extend_from_slice(&gap);
        }

        // 尾部留半秒静音，保证最小输出体积
        samples.extend(std::iter::repeat(0.0).take(SAMPLE_RATE as usize / 2));
        samples
    }
}

impl Default for PlaceholderBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// 词 → 120-380Hz 区间内的确定性音高
fn word_pitch(word: &str) -> f64 {
    let sum: u32 = word.bytes().map(u32::from).sum();
    120.0 + (sum % 260) as f64
}

#[async_trait]
impl SynthesisBackendPort for PlaceholderBackend {
    async fn synthesize(
        &self,
        text: &str,
        _model_path: &Path,
        _config_path: &Path,
        output_path: &Path,
        _timeout: Duration,
    ) -> Result<(), SynthesisError> {
        let wav = encode_wav_mono(&Self::render(text), SAMPLE_RATE);
        tokio::fs::write(output_path, &wav).await?;

        if (wav.len() as u64) < MIN_OUTPUT_BYTES {
            let _ = tokio::fs::remove_file(output_path).await;
            return Err(SynthesisError::OutputTooSmall(wav.len() as u64));
        }

        tracing::debug!(bytes = wav.len(), "Placeholder synthesis complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_output_is_valid_wav() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("out.wav");
        let backend = PlaceholderBackend::new();

        backend
            .synthesize(
                "Hello, this is a voice test.",
                Path::new("/unused"),
                Path::new("/unused"),
                &out,
                Duration::from_secs(5),
            )
            .await
            .unwrap();

        let data = tokio::fs::read(&out).await.unwrap();
        assert!(data.len() as u64 >= MIN_OUTPUT_BYTES);
        assert_eq!(&data[0..4], b"RIFF");
        assert_eq!(&data[8..12], b"WAVE");
    }

    #[tokio::test]
    async fn test_deterministic_for_same_text() {
        let dir = tempdir().unwrap();
        let backend = PlaceholderBackend::new();
        let a = dir.path().join("a.wav");
        let b = dir.path().join("b.wav");

        for out in [&a, &b] {
            backend
                .synthesize("same text", Path::new("/x"), Path::new("/x"), out, Duration::from_secs(5))
                .await
                .unwrap();
        }

        assert_eq!(
            tokio::fs::read(&a).await.unwrap(),
            tokio::fs::read(&b).await.unwrap()
        );
    }

    #[test]
    fn test_word_pitch_in_audible_band() {
        for word in ["a", "hello", "synthesis", "longerwordhere"] {
            let f = word_pitch(word);
            assert!((120.0..380.0).contains(&f));
        }
    }
}
