//! Piper Backend - 外部 piper 子进程合成
//!
//! 文本经 stdin 写入，引擎把 WAV 写到 --output_file 指定的路径。
//! 超时后子进程被终止，部分输出被删除。

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::application::ports::{SynthesisBackendPort, SynthesisError, MIN_OUTPUT_BYTES};

/// Piper 子进程后端
pub struct PiperBackend {
    piper_path: String,
}

impl PiperBackend {
    pub fn new(piper_path: impl Into<String>) -> Self {
        Self {
            piper_path: piper_path.into(),
        }
    }
}

#[async_trait]
impl SynthesisBackendPort for PiperBackend {
    async fn synthesize(
        &self,
        text: &str,
        model_path: &Path,
        config_path: &Path,
        output_path: &Path,
        timeout: Duration,
    ) -> Result<(), SynthesisError> {
        let mut child = Command::new(&self.piper_path)
            .arg("--model")
            .arg(model_path)
            .arg("--config")
            .arg(config_path)
            .arg("--output_file")
            .arg(output_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SynthesisError::SpawnError(e.to_string()))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| SynthesisError::SpawnError("stdin not captured".to_string()))?;
        stdin.write_all(text.as_bytes()).await?;
        // 关闭 stdin，引擎读到 EOF 才开始收尾
        drop(stdin);

        // 超时后 wait_with_output future 被丢弃，kill_on_drop 回收子进程
        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                let _ = tokio::fs::remove_file(output_path).await;
                tracing::warn!(timeout_secs = timeout.as_secs(), "Piper timed out, killed");
                return Err(SynthesisError::Timeout(timeout));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let _ = tokio::fs::remove_file(output_path).await;
            return Err(SynthesisError::EngineFailure {
                status: output.status.code(),
                stderr,
            });
        }

        // 输出体检：引擎可能成功退出但什么都没写
        let size = match tokio::fs::metadata(output_path).await {
            Ok(meta) => meta.len(),
            Err(_) => return Err(SynthesisError::OutputMissing),
        };
        if size < MIN_OUTPUT_BYTES {
            let _ = tokio::fs::remove_file(output_path).await;
            return Err(SynthesisError::OutputTooSmall(size));
        }

        tracing::debug!(bytes = size, "Piper synthesis complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let dir = tempdir().unwrap();
        let backend = PiperBackend::new("/nonexistent/piper-binary");
        let result = backend
            .synthesize(
                "hello",
                &dir.path().join("m.onnx"),
                &dir.path().join("m.json"),
                &dir.path().join("out.wav"),
                Duration::from_secs(5),
            )
            .await;
        assert!(matches!(result, Err(SynthesisError::SpawnError(_))));
    }

    #[tokio::test]
    async fn test_failing_engine_reports_stderr() {
        let dir = tempdir().unwrap();
        // sh -c 模拟失败的引擎进程
        let script = dir.path().join("fake-piper");
        tokio::fs::write(&script, "#!/bin/sh\ncat > /dev/null\necho 'model load failed' >&2\nexit 3\n")
            .await
            .unwrap();
        let mut perms = tokio::fs::metadata(&script).await.unwrap().permissions();
        use std::os::unix::fs::PermissionsExt;
        perms.set_mode(0o755);
        tokio::fs::set_permissions(&script, perms).await.unwrap();

        let backend = PiperBackend::new(script.to_string_lossy().to_string());
        let result = backend
            .synthesize(
                "hello",
                &dir.path().join("m.onnx"),
                &dir.path().join("m.json"),
                &dir.path().join("out.wav"),
                Duration::from_secs(5),
            )
            .await;

        match result {
            Err(SynthesisError::EngineFailure { status, stderr }) => {
                assert_eq!(status, Some(3));
                assert!(stderr.contains("model load failed"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_undersized_output_rejected_and_removed() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("out.wav");
        let script = dir.path().join("fake-piper");
        // 写一个远小于下限的输出
        tokio::fs::write(
            &script,
            format!("#!/bin/sh\ncat > /dev/null\nprintf 'tiny' > {}\n", out.display()),
        )
        .await
        .unwrap();
        let mut perms = tokio::fs::metadata(&script).await.unwrap().permissions();
        use std::os::unix::fs::PermissionsExt;
        perms.set_mode(0o755);
        tokio::fs::set_permissions(&script, perms).await.unwrap();

        let backend = PiperBackend::new(script.to_string_lossy().to_string());
        let result = backend
            .synthesize(
                "hello",
                &dir.path().join("m.onnx"),
                &dir.path().join("m.json"),
                &out,
                Duration::from_secs(5),
            )
            .await;

        assert!(matches!(result, Err(SynthesisError::OutputTooSmall(4))));
        assert!(!out.exists());
    }
}
