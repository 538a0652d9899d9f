//! Discovery and resolution of the LLM CLI executable path.

use crate::error::LlmError;
use std::path::PathBuf;
use which::which;

/// Environment variable that overrides the default LLM CLI binary path.
pub const LLM_BIN_ENV_VAR: &str = "STMTGEN_LLM_BIN";

/// Default CLI binary looked up on `$PATH`.
const DEFAULT_BIN: &str = "claude";

/// Locates the LLM CLI executable.
///
/// Resolution order:
/// 1. `explicit_path` if provided and the file exists.
/// 2. The path in the `STMTGEN_LLM_BIN` environment variable.
/// 3. `claude` resolved via `$PATH`.
pub fn discover_llm(explicit_path: Option<PathBuf>) -> Result<PathBuf, LlmError> {
    if let Some(path) = explicit_path {
        if path.exists() {
            return Ok(path);
        }
        return Err(LlmError::ExecutableNotFound(format!(
            "explicit path does not exist: {}",
            path.display()
        )));
    }

    if let Ok(path_str) = std::env::var(LLM_BIN_ENV_VAR) {
        let path = PathBuf::from(path_str);
        if path.exists() {
            return Ok(path);
        }
    }

    which(DEFAULT_BIN).map_err(|e| LlmError::ExecutableNotFound(e.to_string()))
}
