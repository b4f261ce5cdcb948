//! FFmpeg Converter - 外部 ffmpeg/ffprobe 转码与时长探测
//!
//! - Wav: pass-through，原地改名
//! - Ulaw: 8kHz 单声道 μ-law（电话线路）
//! - Mp3: 128kbps libmp3lame
//!
//! 时长优先用 ffprobe；探测失败时退回 WAV 头解析或大小估算

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::application::ports::{ConversionError, FormatConverterPort};
use crate::config::ConverterConfig;
use crate::domain::voice::OutputFormat;
use crate::infrastructure::adapters::converter::wav::parse_wav_header;

/// 大小估算系数：约 60 秒每 MiB（估算值，非权威）
const FALLBACK_SECS_PER_MIB: f64 = 60.0;

/// FFmpeg 转码器
pub struct FfmpegConverter {
    ffmpeg_path: String,
    ffprobe_path: String,
    timeout: Duration,
    probe_timeout: Duration,
}

impl FfmpegConverter {
    pub fn new(cfg: &ConverterConfig) -> Self {
        Self {
            ffmpeg_path: cfg.ffmpeg_path.clone(),
            ffprobe_path: cfg.ffprobe_path.clone(),
            timeout: Duration::from_secs(cfg.timeout_secs),
            probe_timeout: Duration::from_secs(cfg.probe_timeout_secs),
        }
    }

    async fn run_ffmpeg(&self, args: &[&str]) -> Result<(), ConversionError> {
        let child = Command::new(&self.ffmpeg_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ConversionError::SpawnError(e.to_string()))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| ConversionError::Timeout(self.timeout.as_secs()))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            // ffmpeg 的 stderr 很长，只留最后几行
            let tail: Vec<&str> = stderr.lines().rev().take(4).collect();
            let tail: Vec<&str> = tail.into_iter().rev().collect();
            return Err(ConversionError::ToolFailure(tail.join("; ")));
        }

        Ok(())
    }

    /// ffprobe 探测时长
    async fn probe_duration(&self, path: &Path) -> Option<f64> {
        let child = Command::new(&self.ffprobe_path)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .ok()?;

        let output = tokio::time::timeout(self.probe_timeout, child.wait_with_output())
            .await
            .ok()?
            .ok()?;

        if !output.status.success() {
            return None;
        }

        String::from_utf8_lossy(&output.stdout).trim().parse().ok()
    }
}

#[async_trait]
impl FormatConverterPort for FfmpegConverter {
    async fn convert(
        &self,
        raw_wav: &Path,
        format: OutputFormat,
        final_path: &Path,
    ) -> Result<(), ConversionError> {
        let raw = raw_wav.to_string_lossy().to_string();
        let out = final_path.to_string_lossy().to_string();

        match format {
            // 引擎原生输出，不经过 ffmpeg
            OutputFormat::Wav => {
                tokio::fs::rename(raw_wav, final_path).await?;
                return Ok(());
            }
            OutputFormat::Ulaw => {
                ensure_wav_input(raw_wav).await?;
                self.run_ffmpeg(&[
                    "-y", "-i", &raw, "-ar", "8000", "-ac", "1", "-acodec", "pcm_mulaw", "-f",
                    "mulaw", &out,
                ])
                .await?;
            }
            OutputFormat::Mp3 => {
                ensure_wav_input(raw_wav).await?;
                self.run_ffmpeg(&[
                    "-y", "-i", &raw, "-acodec", "libmp3lame", "-b:a", "128k", &out,
                ])
                .await?;
            }
        }

        if tokio::fs::metadata(final_path).await.is_err() {
            return Err(ConversionError::OutputMissing);
        }

        tracing::debug!(%format, output = %out, "Conversion complete");
        Ok(())
    }

    async fn duration_secs(&self, path: &Path) -> f64 {
        if let Some(duration) = self.probe_duration(path).await {
            return duration;
        }

        // WAV 可以直接从头部算出精确时长
        if let Ok(data) = tokio::fs::read(path).await {
            if let Some(info) = parse_wav_header(&data) {
                return info.duration_secs();
            }
        }

        let size = tokio::fs::metadata(path).await.map(|m| m.len()).unwrap_or(0);
        let estimate = size as f64 / (1024.0 * 1024.0) * FALLBACK_SECS_PER_MIB;
        tracing::debug!(path = %path.display(), estimate, "Duration probe failed, using size estimate");
        estimate
    }
}

/// 转码输入必须是引擎产出的 WAV；坏输入不值得再起 ffmpeg 进程
async fn ensure_wav_input(path: &Path) -> Result<(), ConversionError> {
    use tokio::io::AsyncReadExt;

    let mut file = tokio::fs::File::open(path).await?;
    let mut head = vec![0u8; 4096];
    let n = file.read(&mut head).await?;
    head.truncate(n);

    if parse_wav_header(&head).is_none() {
        return Err(ConversionError::InvalidAudio(
            "input does not carry a RIFF/WAVE header".to_string(),
        ));
    }
    Ok(())
}
