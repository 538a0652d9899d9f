//! Adapter driving a local LLM CLI as the generative provider.
//!
//! This crate provides discovery and one-shot execution of a `claude`-style
//! command-line tool. From the refinement loop's perspective the provider is
//! an opaque async function from prompt to source text; [`LlmCli::provider_fn`]
//! produces exactly that closure.

/// Command-line argument construction for CLI invocations.
pub mod cmd;
/// Discovery and resolution of the CLI executable path.
pub mod discovery;
/// Error types returned by adapter operations.
pub mod error;
/// Subprocess execution with timeout and output capture.
pub mod process;
/// Shared data types for configuration and results.
pub mod types;

pub use discovery::{discover_llm, LLM_BIN_ENV_VAR};
pub use error::LlmError;
pub use process::run_llm;
pub use types::{LlmConfig, LlmOutput};

use std::future::Future;
use std::path::PathBuf;

/// High-level client for the LLM CLI.
#[derive(Debug, Clone)]
pub struct LlmCli {
    /// Filesystem path to the CLI executable.
    pub path: PathBuf,
}

impl LlmCli {
    /// Discovers the CLI and creates a client for it.
    pub fn discover(explicit_path: Option<PathBuf>) -> Result<Self, LlmError> {
        let path = discover_llm(explicit_path)?;
        tracing::debug!(path = %path.display(), "LLM CLI resolved");
        Ok(Self { path })
    }

    /// Creates a client from a known path.
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Obtains one completion, returning the trimmed response text.
    pub async fn complete(&self, prompt: &str, config: &LlmConfig) -> Result<String, LlmError> {
        let output = run_llm(&self.path, prompt, config).await?;
        let text = output.text.trim();
        if text.is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        tracing::debug!(
            duration_ms = output.duration_ms,
            chars = text.len(),
            "completion received"
        );
        Ok(text.to_string())
    }

    /// Bridges this client into the provider-function shape the refinement
    /// loop consumes: `Fn(String) -> Future<Output = Result<String, String>>`.
    #[must_use]
    pub fn provider_fn(
        self,
        config: LlmConfig,
    ) -> impl Fn(String) -> std::pin::Pin<Box<dyn Future<Output = Result<String, String>> + Send>>
    {
        move |prompt: String| {
            let cli = self.clone();
            let config = config.clone();
            Box::pin(async move {
                cli.complete(&prompt, &config)
                    .await
                    .map_err(|e| e.to_string())
            })
        }
    }
}
