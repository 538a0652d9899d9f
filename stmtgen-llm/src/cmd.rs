//! Command-line argument builder for LLM CLI invocations.

use crate::types::LlmConfig;
use std::ffi::OsString;

/// Builds the argument list for a one-shot `--print` completion from the
/// given prompt and configuration.
#[must_use]
pub fn build_args(prompt: &str, config: &LlmConfig) -> Vec<OsString> {
    let mut args = Vec::new();

    args.push(OsString::from("--print"));
    args.push(OsString::from("--output-format"));
    args.push(OsString::from("text"));

    if let Some(ref model) = config.model {
        args.push(OsString::from("--model"));
        args.push(OsString::from(model));
    }

    if let Some(ref system) = config.system_prompt {
        args.push(OsString::from("--append-system-prompt"));
        args.push(OsString::from(system));
    }

    args.push(OsString::from(prompt));

    args
}
