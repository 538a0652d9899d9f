//! Subprocess execution with timeout and output capture.

use crate::error::LlmError;
use crate::types::{LlmConfig, LlmOutput};
use std::process::Stdio;
use std::time::Instant;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::timeout;

/// Runs one completion through the CLI at `path`.
///
/// Spawns the process with piped stdio, captures stdout and stderr
/// concurrently, and kills the child when the configured timeout expires.
pub async fn run_llm(
    path: &std::path::Path,
    prompt: &str,
    config: &LlmConfig,
) -> Result<LlmOutput, LlmError> {
    let args = crate::cmd::build_args(prompt, config);
    let start = Instant::now();

    let mut cmd = Command::new(path);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    if let Some(cwd) = &config.cwd {
        cmd.current_dir(cwd);
    }
    for (k, v) in &config.env {
        cmd.env(k, v);
    }

    let mut child = cmd.spawn()?;
    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| std::io::Error::other("stdout not captured"))?;
    let mut stderr = child
        .stderr
        .take()
        .ok_or_else(|| std::io::Error::other("stderr not captured"))?;

    let stdout_task = tokio::spawn(async move {
        let mut buf = String::new();
        let _ = stdout.read_to_string(&mut buf).await;
        buf
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = String::new();
        let _ = stderr.read_to_string(&mut buf).await;
        buf
    });

    let waited = timeout(config.timeout, child.wait()).await;
    match waited {
        Ok(status) => {
            let status = status?;
            let text = stdout_task.await.unwrap_or_default();
            let err = stderr_task.await.unwrap_or_default();
            let code = status.code().unwrap_or(-1);
            if !status.success() {
                return Err(LlmError::NonZeroExit { code, stderr: err });
            }
            Ok(LlmOutput {
                text,
                stderr: err,
                exit_code: code,
                duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            })
        }
        Err(_) => {
            let _ = child.kill().await;
            Err(LlmError::Timeout(config.timeout))
        }
    }
}
