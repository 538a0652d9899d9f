//! Durable artifact output for the accepted extractor.
//!
//! Side effects only; no decision logic. The accepted source is stored at a
//! deterministic path keyed by target name so the verification surface can
//! find it later.

use crate::metrics::RunMetrics;
use crate::record::RecordError;
use crate::refine::{Acceptance, RunOutcome};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors while persisting artifacts.
#[derive(Debug, Error)]
pub enum PublishError {
    /// Filesystem failure.
    #[error("failed to write artifact: {0}")]
    Io(#[from] std::io::Error),

    /// The produced table could not be rendered to CSV.
    #[error("failed to render produced table: {0}")]
    Record(#[from] RecordError),

    /// Atomic replacement of an artifact failed.
    #[error("failed to persist artifact: {0}")]
    Persist(String),

    /// The run summary could not be encoded.
    #[error("failed to encode run summary: {0}")]
    Summary(#[from] serde_json::Error),
}

/// Paths of the artifacts written for one accepted run.
#[derive(Debug, Clone)]
pub struct PublishedArtifacts {
    /// The accepted extractor's source.
    pub source: PathBuf,
    /// The produced table in the external tabular format.
    pub table: PathBuf,
    /// The machine-readable run summary.
    pub summary: PathBuf,
}

/// Machine-readable summary written alongside the artifacts.
#[derive(Debug, Serialize)]
struct RunSummary<'a> {
    target: &'a str,
    acceptance: Acceptance,
    metrics: &'a RunMetrics,
}

/// Writes accepted extractors and their produced records under a root dir.
#[derive(Debug, Clone)]
pub struct Publisher {
    root: PathBuf,
}

impl Publisher {
    /// Creates a publisher rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The deterministic path of a target's published extractor source.
    #[must_use]
    pub fn source_path(&self, target: &str) -> PathBuf {
        self.root.join(target).join("parser.py")
    }

    /// Durably stores the accepted extractor, its produced table, and a run
    /// summary under `<root>/<target>/`. Each file is replaced atomically.
    pub fn publish(
        &self,
        target: &str,
        outcome: &RunOutcome,
    ) -> Result<PublishedArtifacts, PublishError> {
        let dir = self.root.join(target);
        std::fs::create_dir_all(&dir)?;

        let source = self.source_path(target);
        atomic_write(&dir, &source, outcome.source.as_bytes())?;

        let table = dir.join("parsed.csv");
        atomic_write(&dir, &table, outcome.table.to_csv_string()?.as_bytes())?;

        let summary_json = serde_json::to_vec_pretty(&RunSummary {
            target,
            acceptance: outcome.acceptance,
            metrics: &outcome.metrics,
        })?;
        let summary = dir.join("run.json");
        atomic_write(&dir, &summary, &summary_json)?;

        tracing::info!(target, source = %source.display(), "artifacts published");
        Ok(PublishedArtifacts {
            source,
            table,
            summary,
        })
    }
}

fn atomic_write(dir: &Path, dest: &Path, bytes: &[u8]) -> Result<(), PublishError> {
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.persist(dest)
        .map_err(|e| PublishError::Persist(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Schema, Table};
    use crate::refine::{Acceptance, RunOutcome};

    fn outcome() -> RunOutcome {
        let schema = Schema::infer(
            &["Date".to_string(), "Amount".to_string()],
            &[vec!["05-01-2024".to_string(), "1.00".to_string()]],
        );
        let table =
            Table::parse_with_schema("Date,Amount\n05-01-2024,1.00\n", &schema).unwrap();
        RunOutcome {
            acceptance: Acceptance::Synthesized { attempts: 2 },
            source: "print('extractor')".to_string(),
            table,
            metrics: RunMetrics::default(),
            history: Vec::new(),
        }
    }

    #[test]
    fn publishes_source_table_and_summary() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = Publisher::new(dir.path());
        let artifacts = publisher.publish("icici", &outcome()).unwrap();

        assert_eq!(
            std::fs::read_to_string(&artifacts.source).unwrap(),
            "print('extractor')"
        );
        let csv = std::fs::read_to_string(&artifacts.table).unwrap();
        assert!(csv.starts_with("Date,Amount\n"));
        let summary = std::fs::read_to_string(&artifacts.summary).unwrap();
        assert!(summary.contains("\"mode\": \"synthesized\""));
        assert!(summary.contains("\"attempts\": 2"));
    }

    #[test]
    fn republishing_overwrites_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = Publisher::new(dir.path());
        publisher.publish("icici", &outcome()).unwrap();
        let mut second = outcome();
        second.source = "print('newer')".to_string();
        let artifacts = publisher.publish("icici", &second).unwrap();
        assert_eq!(
            std::fs::read_to_string(&artifacts.source).unwrap(),
            "print('newer')"
        );
    }
}
