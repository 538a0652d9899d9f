//! Run metrics and token estimation.

use serde::Serialize;
use std::time::Duration;

/// Metrics collected across one refinement run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunMetrics {
    /// Number of synthesis attempts issued.
    pub attempts: usize,
    /// Wall-clock time for the whole run.
    pub wall_time: Duration,
    /// Estimated tokens sent to the provider.
    pub estimated_prompt_tokens: usize,
    /// Estimated tokens received from the provider.
    pub estimated_response_tokens: usize,
}

/// Estimates token count with the standard 4-chars-per-token heuristic.
///
/// Counts chars, not bytes, so UTF-8 content is not over-counted. Ceiling
/// division avoids underestimation.
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("a"), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }
}
