//! Error types returned by adapter operations.

use thiserror::Error;

/// Errors from discovering or driving the LLM CLI.
#[derive(Debug, Error)]
pub enum LlmError {
    /// No usable CLI executable could be located.
    #[error("LLM executable not found: {0}")]
    ExecutableNotFound(String),

    /// The subprocess could not be spawned.
    #[error("failed to spawn LLM process: {0}")]
    Spawn(#[from] std::io::Error),

    /// The completion exceeded its wall-clock budget and was killed.
    #[error("LLM process timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The CLI exited with a non-zero status.
    #[error("LLM process exited with status {code}\nstderr: {stderr}")]
    NonZeroExit {
        /// Process exit code (`-1` if unavailable).
        code: i32,
        /// Captured standard error.
        stderr: String,
    },

    /// The CLI exited cleanly but produced no text.
    #[error("LLM process produced an empty response")]
    EmptyResponse,
}
