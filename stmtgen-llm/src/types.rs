//! Shared data types for LLM CLI invocations.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for a single one-shot completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Model name override (e.g. `"claude-sonnet-4-5"`).
    pub model: Option<String>,
    /// System prompt appended to the CLI's default.
    pub system_prompt: Option<String>,
    /// Maximum wall-clock duration before the process is killed.
    pub timeout: Duration,
    /// Working directory for the subprocess.
    pub cwd: Option<PathBuf>,
    /// Extra environment variables passed to the subprocess.
    pub env: Vec<(String, String)>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: None,
            system_prompt: None,
            timeout: Duration::from_secs(300),
            cwd: None,
            env: Vec::new(),
        }
    }
}

/// Result of a completed CLI invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmOutput {
    /// Captured standard output (the completion text).
    pub text: String,
    /// Captured standard error.
    pub stderr: String,
    /// Process exit code (`-1` if unavailable).
    pub exit_code: i32,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}
