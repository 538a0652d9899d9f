//! The bounded synthesize → execute → compare refinement loop.
//!
//! Drives `SYNTHESIZE(i) → EXECUTE(i) → COMPARE(i)` for a bounded number of
//! attempts, converting every per-attempt failure into feedback for the next
//! prompt, and falls back to the deterministic extractor when the budget is
//! exhausted. Exactly one accepted extractor comes out of a successful run,
//! and it has always been verified against the reference, the fallback
//! included.

use crate::cancel::CancelFlag;
use crate::error::{AttemptFailure, AttemptRecord, RunError};
use crate::executor::Executor;
use crate::fallback::Fallbacks;
use crate::feedback;
use crate::metrics::{estimate_tokens, RunMetrics};
use crate::oracle::{self, Comparison};
use crate::record::Table;
use crate::synth::{build_prompt, extract_source, SynthInput};
use crate::target::Target;
use serde::Serialize;
use std::future::Future;
use tokio::time::Instant;

/// Refinement loop configuration.
#[derive(Debug, Clone)]
pub struct RefineConfig {
    /// Maximum synthesis attempts before falling back (default: 3).
    pub max_attempts: usize,
    /// Cap on the document excerpt included in prompts, in characters.
    pub excerpt_chars: usize,
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            excerpt_chars: 2000,
        }
    }
}

/// How the accepted extractor was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Acceptance {
    /// A synthesized candidate passed the reference check.
    Synthesized {
        /// Attempt number that produced it.
        attempts: usize,
    },
    /// The deterministic fallback passed the reference check.
    Fallback,
}

/// Result of a successful run: exactly one accepted extractor.
#[derive(Debug)]
pub struct RunOutcome {
    /// How the extractor was accepted.
    pub acceptance: Acceptance,
    /// The accepted extractor's source.
    pub source: String,
    /// The table it produced, equal to the reference by construction.
    pub table: Table,
    /// Metrics across the run.
    pub metrics: RunMetrics,
    /// Append-only record of every failed attempt.
    pub history: Vec<AttemptRecord>,
}

/// Runs the refinement loop for one target.
///
/// Owns no shared mutable state: independent targets can run concurrently,
/// each with its own `Refiner`.
#[derive(Debug)]
pub struct Refiner {
    target: Target,
    reference: Table,
    executor: Executor,
    fallbacks: Fallbacks,
    config: RefineConfig,
}

impl Refiner {
    /// Creates a refiner, loading the target's reference table.
    pub fn new(
        target: Target,
        executor: Executor,
        fallbacks: Fallbacks,
        config: RefineConfig,
    ) -> Result<Self, RunError> {
        let reference = Table::read_reference(&target.reference)?;
        Ok(Self {
            target,
            reference,
            executor,
            fallbacks,
            config,
        })
    }

    /// The loaded reference table.
    #[must_use]
    pub const fn reference(&self) -> &Table {
        &self.reference
    }

    /// Runs the loop to one accepted extractor or a fatal error.
    ///
    /// `provider` is the opaque generative function: prompt in, candidate
    /// source text out. Provider errors count against the attempt budget
    /// like any other attempt failure. The cancel flag is checked at state
    /// boundaries only; a cancelled run discards its staged candidate and
    /// returns [`RunError::Cancelled`], never a fallback outcome.
    pub async fn run<F, Fut>(
        &self,
        provider: F,
        cancel: &CancelFlag,
    ) -> Result<RunOutcome, RunError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<String, String>>,
    {
        let start = Instant::now();
        let input = SynthInput::gather(&self.target, &self.reference, self.config.excerpt_chars)?;
        let mut history: Vec<AttemptRecord> = Vec::new();
        let mut metrics = RunMetrics::default();

        for attempt in 1..=self.config.max_attempts {
            if cancel.is_cancelled() {
                self.executor.discard(&self.target.name);
                return Err(RunError::Cancelled);
            }

            let attempt_start = Instant::now();
            let prompt = build_prompt(&input, &history, self.config.max_attempts);
            metrics.estimated_prompt_tokens += estimate_tokens(&prompt);
            metrics.attempts = attempt;
            tracing::info!(
                target = %self.target.name,
                attempt,
                max = self.config.max_attempts,
                "synthesizing candidate"
            );

            let (source, failure) = match provider(prompt).await {
                Err(message) => (String::new(), AttemptFailure::Synthesis(message)),
                Ok(response) => {
                    metrics.estimated_response_tokens += estimate_tokens(&response);
                    match extract_source(&response) {
                        None => (
                            String::new(),
                            AttemptFailure::Synthesis(
                                "provider response contained no script source".to_string(),
                            ),
                        ),
                        Some(candidate) => match self.try_candidate(&candidate).await {
                            Ok(table) => {
                                metrics.wall_time = start.elapsed();
                                tracing::info!(
                                    target = %self.target.name,
                                    attempt,
                                    "candidate accepted"
                                );
                                return Ok(RunOutcome {
                                    acceptance: Acceptance::Synthesized { attempts: attempt },
                                    source: candidate,
                                    table,
                                    metrics,
                                    history,
                                });
                            }
                            Err(failure) => (candidate, failure),
                        },
                    }
                }
            };

            tracing::warn!(
                target = %self.target.name,
                attempt,
                kind = failure.kind(),
                "attempt failed"
            );
            let rendered = feedback::render(&failure, attempt, self.config.max_attempts);
            history.push(AttemptRecord {
                attempt,
                source,
                failure,
                feedback: rendered,
                elapsed: attempt_start.elapsed(),
            });
        }

        if cancel.is_cancelled() {
            self.executor.discard(&self.target.name);
            return Err(RunError::Cancelled);
        }

        tracing::warn!(
            target = %self.target.name,
            attempts = self.config.max_attempts,
            "attempt budget exhausted, engaging deterministic fallback"
        );
        let source = self
            .fallbacks
            .get(&self.target.name)
            .ok_or_else(|| RunError::FallbackMissing {
                target: self.target.name.clone(),
            })?
            .to_string();

        // The fallback is re-verified through the same execute/compare path
        // as any candidate. A failure here is a defect in the fixed baseline
        // and is fatal, not feedback.
        match self.try_candidate(&source).await {
            Ok(table) => {
                metrics.wall_time = start.elapsed();
                tracing::info!(target = %self.target.name, "fallback accepted");
                Ok(RunOutcome {
                    acceptance: Acceptance::Fallback,
                    source,
                    table,
                    metrics,
                    history,
                })
            }
            Err(failure) => Err(RunError::FallbackIntegrity {
                target: self.target.name.clone(),
                failure: failure.to_string(),
            }),
        }
    }

    async fn try_candidate(&self, source: &str) -> Result<Table, AttemptFailure> {
        let staged = self.executor.stage(&self.target.name, source)?;
        let table = self
            .executor
            .run(&staged, &self.target.document, self.reference.schema())
            .await?;
        match oracle::compare(&self.reference, &table) {
            Comparison::Equal => Ok(table),
            Comparison::Diff(diff) => Err(AttemptFailure::Mismatch(diff)),
        }
    }
}
