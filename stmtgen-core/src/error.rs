//! Error taxonomy: recoverable per-attempt failures vs. fatal run errors.
//!
//! Everything in [`AttemptFailure`] is recovered inside the refinement loop
//! and converted into feedback for the next attempt. Only [`RunError`]
//! conditions propagate to the caller.

use crate::executor::ExecError;
use crate::oracle::TableDiff;
use crate::publish::PublishError;
use crate::record::RecordError;
use crate::target::TargetError;
use std::time::Duration;
use thiserror::Error;

/// Why one attempt failed. Always recoverable; counts against the budget.
#[derive(Debug, Error)]
pub enum AttemptFailure {
    /// The provider was unreachable or returned an empty/unusable response.
    #[error("synthesis failed: {0}")]
    Synthesis(String),

    /// The candidate failed to load, crashed, or exceeded its timeout.
    #[error("execution failed: {0}")]
    Execution(#[from] ExecError),

    /// The candidate ran but produced a table unequal to the reference.
    #[error("output did not match the reference table: {0}")]
    Mismatch(TableDiff),
}

impl AttemptFailure {
    /// Short tag used in logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Synthesis(_) => "synthesis",
            Self::Execution(_) => "execution",
            Self::Mismatch(_) => "mismatch",
        }
    }
}

/// Record of a single attempt. Append-only across the loop.
#[derive(Debug)]
pub struct AttemptRecord {
    /// The attempt number (1-indexed).
    pub attempt: usize,
    /// Candidate source produced this attempt (empty when synthesis failed).
    pub source: String,
    /// Why the attempt failed.
    pub failure: AttemptFailure,
    /// Rendered feedback handed to subsequent attempts.
    pub feedback: String,
    /// Wall-clock time this attempt took.
    pub elapsed: Duration,
}

/// Fatal, loop-external conditions surfaced to the caller.
#[derive(Debug, Error)]
pub enum RunError {
    /// The target definition directory is missing or malformed.
    #[error("target definition error: {0}")]
    Target(#[from] TargetError),

    /// The reference table could not be read.
    #[error("reference table error: {0}")]
    Record(#[from] RecordError),

    /// The sample document could not be read for prompt context.
    #[error("failed to read sample document: {0}")]
    Document(std::io::Error),

    /// The budget is exhausted and no fallback is registered for the target.
    #[error("no deterministic fallback extractor is registered for target `{target}`")]
    FallbackMissing {
        /// Target name.
        target: String,
    },

    /// The deterministic fallback itself failed the reference check.
    ///
    /// This indicates a defect in the fixed baseline, not a synthesis
    /// failure, and is never converted into feedback.
    #[error("fallback extractor for `{target}` failed its reference check: {failure}")]
    FallbackIntegrity {
        /// Target name.
        target: String,
        /// Rendered failure description.
        failure: String,
    },

    /// The run was cancelled externally at a state boundary.
    #[error("run cancelled")]
    Cancelled,

    /// Persisting the accepted artifacts failed.
    #[error("failed to publish artifacts: {0}")]
    Publish(#[from] PublishError),
}

impl From<crate::synth::GatherError> for RunError {
    fn from(e: crate::synth::GatherError) -> Self {
        match e {
            crate::synth::GatherError::Reference(e) => Self::Record(e),
            crate::synth::GatherError::Document(e) => Self::Document(e),
        }
    }
}
