//! Atomic staging and sandboxed execution of candidate extraction scripts.
//!
//! Every candidate runs in a fresh interpreter subprocess, so state from a
//! failed attempt cannot leak into the next one. A wall-clock timeout bounds
//! each execution, and every failure class is captured as a typed
//! [`ExecError`] rather than escaping the loop boundary.

use crate::record::{RecordError, Schema, Table};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::timeout;

/// Environment variable that overrides the default interpreter path.
pub const INTERPRETER_ENV_VAR: &str = "STMTGEN_PYTHON";

/// Errors produced while staging or executing a candidate.
#[derive(Debug, Error)]
pub enum ExecError {
    /// No usable interpreter could be located.
    #[error("interpreter not found: {0}")]
    InterpreterNotFound(String),

    /// Writing or atomically replacing the staged candidate failed.
    #[error("failed to stage candidate: {0}")]
    Staging(String),

    /// The interpreter subprocess could not be spawned.
    #[error("failed to spawn interpreter: {0}")]
    Spawn(#[from] std::io::Error),

    /// The candidate exceeded its wall-clock budget and was killed.
    #[error("candidate timed out after {0:?}")]
    Timeout(Duration),

    /// The candidate exited with a non-zero status.
    #[error("candidate exited with status {code}\nstderr: {stderr}")]
    NonZeroExit {
        /// Process exit code (`-1` if unavailable).
        code: i32,
        /// Captured standard error.
        stderr: String,
    },

    /// The candidate exited cleanly but its stdout is not a valid table.
    #[error("candidate output is not a valid table: {0}")]
    InvalidOutput(#[from] RecordError),
}

/// Locates the script interpreter.
///
/// Resolution order: `explicit_path` if provided, the `STMTGEN_PYTHON`
/// environment variable, then `python3` on `$PATH`.
pub fn discover_interpreter(explicit_path: Option<PathBuf>) -> Result<PathBuf, ExecError> {
    if let Some(path) = explicit_path {
        if path.exists() {
            return Ok(path);
        }
        return Err(ExecError::InterpreterNotFound(format!(
            "explicit path does not exist: {}",
            path.display()
        )));
    }

    if let Ok(path_str) = std::env::var(INTERPRETER_ENV_VAR) {
        let path = PathBuf::from(path_str);
        if path.exists() {
            return Ok(path);
        }
    }

    which::which("python3").map_err(|e| ExecError::InterpreterNotFound(e.to_string()))
}

/// Stages and runs candidate extraction scripts against a sample document.
#[derive(Debug, Clone)]
pub struct Executor {
    interpreter: PathBuf,
    work_dir: PathBuf,
    timeout: Duration,
}

impl Executor {
    /// Creates an executor staging into `work_dir` with a per-run timeout.
    #[must_use]
    pub fn new(interpreter: PathBuf, work_dir: PathBuf, timeout: Duration) -> Self {
        Self {
            interpreter,
            work_dir,
            timeout,
        }
    }

    /// Atomically stages a candidate's source at the target's staging path.
    ///
    /// The source is written to a temporary file in the same directory and
    /// renamed over any previous attempt, so a half-written candidate is
    /// never executed.
    pub fn stage(&self, target: &str, source: &str) -> Result<PathBuf, ExecError> {
        std::fs::create_dir_all(&self.work_dir).map_err(|e| ExecError::Staging(e.to_string()))?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.work_dir)
            .map_err(|e| ExecError::Staging(e.to_string()))?;
        tmp.write_all(source.as_bytes())
            .map_err(|e| ExecError::Staging(e.to_string()))?;
        let dest = self.staged_path(target);
        tmp.persist(&dest)
            .map_err(|e| ExecError::Staging(e.to_string()))?;
        Ok(dest)
    }

    /// The deterministic staging path for a target's current candidate.
    #[must_use]
    pub fn staged_path(&self, target: &str) -> PathBuf {
        self.work_dir.join(format!("{target}_parser.py"))
    }

    /// Removes a target's staged candidate, if any.
    pub fn discard(&self, target: &str) {
        let path = self.staged_path(target);
        if let Err(e) = std::fs::remove_file(&path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::debug!(path = %path.display(), error = %e, "failed to remove staged candidate");
            }
        }
    }

    /// Runs a script against a document and parses its stdout as a table.
    ///
    /// Spawns `<interpreter> <script> <document>` with piped stdio, enforces
    /// the wall-clock timeout (killing the child on expiry), and parses
    /// stdout against `schema`.
    pub async fn run(
        &self,
        script: &Path,
        document: &Path,
        schema: &Schema,
    ) -> Result<Table, ExecError> {
        let mut child = Command::new(&self.interpreter)
            .arg(script)
            .arg(document)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("stdout not captured"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| std::io::Error::other("stderr not captured"))?;

        let stdout_task = tokio::spawn(async move {
            let mut buf = String::new();
            let _ = stdout.read_to_string(&mut buf).await;
            buf
        });
        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf).await;
            buf
        });

        let waited = timeout(self.timeout, child.wait()).await;
        match waited {
            Ok(status) => {
                let status = status?;
                let out = stdout_task.await.unwrap_or_default();
                let err = stderr_task.await.unwrap_or_default();
                if !status.success() {
                    return Err(ExecError::NonZeroExit {
                        code: status.code().unwrap_or(-1),
                        stderr: err,
                    });
                }
                Ok(Table::parse_with_schema(&out, schema)?)
            }
            Err(_) => {
                let _ = child.kill().await;
                Err(ExecError::Timeout(self.timeout))
            }
        }
    }
}

#[cfg(test)]
#[cfg(unix)]
mod tests {
    use super::*;
    use crate::record::Schema;

    fn schema() -> Schema {
        Schema::infer(
            &["Date".to_string(), "Amount".to_string()],
            &[vec!["05-01-2024".to_string(), "1.00".to_string()]],
        )
    }

    fn sh_executor(dir: &Path, timeout: Duration) -> Executor {
        Executor::new(PathBuf::from("sh"), dir.to_path_buf(), timeout)
    }

    #[tokio::test]
    async fn staging_replaces_previous_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let executor = sh_executor(dir.path(), Duration::from_secs(5));
        let first = executor.stage("t", "echo one").unwrap();
        let second = executor.stage("t", "echo two").unwrap();
        assert_eq!(first, second);
        assert_eq!(std::fs::read_to_string(&second).unwrap(), "echo two");
    }

    #[tokio::test]
    async fn clean_exit_parses_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let executor = sh_executor(dir.path(), Duration::from_secs(5));
        let script = executor
            .stage("t", "printf 'Date,Amount\\n05-01-2024,1.00\\n'")
            .unwrap();
        let doc = dir.path().join("doc.txt");
        std::fs::write(&doc, "irrelevant").unwrap();

        let table = executor.run(&script, &doc, &schema()).await.unwrap();
        assert_eq!(table.row_count(), 1);
    }

    #[tokio::test]
    async fn nonzero_exit_captures_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let executor = sh_executor(dir.path(), Duration::from_secs(5));
        let script = executor
            .stage("t", "echo 'division by zero on empty amount row' >&2; exit 3")
            .unwrap();
        let doc = dir.path().join("doc.txt");
        std::fs::write(&doc, "irrelevant").unwrap();

        let err = executor.run(&script, &doc, &schema()).await.unwrap_err();
        match err {
            ExecError::NonZeroExit { code, stderr } => {
                assert_eq!(code, 3);
                assert!(stderr.contains("division by zero"));
            }
            other => panic!("expected NonZeroExit, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn runaway_candidate_is_killed() {
        let dir = tempfile::tempdir().unwrap();
        let executor = sh_executor(dir.path(), Duration::from_millis(200));
        let script = executor.stage("t", "sleep 30").unwrap();
        let doc = dir.path().join("doc.txt");
        std::fs::write(&doc, "irrelevant").unwrap();

        let err = executor.run(&script, &doc, &schema()).await.unwrap_err();
        assert!(matches!(err, ExecError::Timeout(_)));
    }

    #[tokio::test]
    async fn garbage_stdout_is_invalid_output() {
        let dir = tempfile::tempdir().unwrap();
        let executor = sh_executor(dir.path(), Duration::from_secs(5));
        let script = executor.stage("t", "echo 'not,a\nvalid table at all'").unwrap();
        let doc = dir.path().join("doc.txt");
        std::fs::write(&doc, "irrelevant").unwrap();

        let err = executor.run(&script, &doc, &schema()).await.unwrap_err();
        assert!(matches!(err, ExecError::InvalidOutput(_)));
    }
}
