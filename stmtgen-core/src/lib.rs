//! Runtime synthesis of bank-statement extraction scripts.
//!
//! This crate implements the generate → validate → refine control loop that
//! turns an unstructured statement document into a structured tabular record:
//! a bounded number of synthesis attempts, each executed in a fresh sandboxed
//! subprocess and compared against a ground-truth reference, with structured
//! diff feedback driving the next attempt and a deterministic fallback
//! extractor guaranteeing the run never fails outright.

/// External cancellation signal.
pub mod cancel;
/// Recoverable attempt failures and fatal run errors.
pub mod error;
/// Staging and sandboxed execution of candidate scripts.
pub mod executor;
/// Deterministic fallback extractor registry.
pub mod fallback;
/// Rendering of attempt failures into retry feedback.
pub mod feedback;
/// Run metrics and token estimation.
pub mod metrics;
/// Order-sensitive table comparison.
pub mod oracle;
/// Durable artifact output.
pub mod publish;
/// Tabular record model and CSV I/O.
pub mod record;
/// The bounded refinement loop.
pub mod refine;
/// Prompt assembly for candidate synthesis.
pub mod synth;
/// Target definitions.
pub mod target;

pub use cancel::CancelFlag;
pub use error::{AttemptFailure, AttemptRecord, RunError};
pub use executor::{discover_interpreter, ExecError, Executor, INTERPRETER_ENV_VAR};
pub use fallback::Fallbacks;
pub use metrics::RunMetrics;
pub use oracle::{compare, Comparison, TableDiff};
pub use publish::{PublishError, PublishedArtifacts, Publisher};
pub use record::{Field, FieldKind, RecordError, Schema, Table, Value};
pub use refine::{Acceptance, RefineConfig, Refiner, RunOutcome};
pub use target::{Target, TargetError};
