//! Renders attempt failures into specific, actionable retry feedback.
//!
//! The synthesizer has no signal to improve on other than this text, so it
//! names exactly which rows and columns diverged and how. A bare pass/fail
//! would make retries no better than random resampling.

use crate::error::AttemptFailure;
use crate::executor::ExecError;
use crate::oracle::TableDiff;
use std::fmt::Write;

/// Longest stderr excerpt echoed back to the synthesizer.
const MAX_STDERR_CHARS: usize = 1500;

/// Renders one attempt's failure into the feedback block for later prompts.
#[must_use]
pub fn render(failure: &AttemptFailure, attempt: usize, max_attempts: usize) -> String {
    match failure {
        AttemptFailure::Synthesis(msg) => build_synthesis_feedback(msg, attempt, max_attempts),
        AttemptFailure::Execution(err) => build_execution_feedback(err, attempt, max_attempts),
        AttemptFailure::Mismatch(diff) => build_mismatch_feedback(diff, attempt, max_attempts),
    }
}

/// Feedback for a provider-side failure (unreachable, empty response).
#[must_use]
pub fn build_synthesis_feedback(message: &str, attempt: usize, max_attempts: usize) -> String {
    format!("Attempt {attempt}/{max_attempts}: no usable script was produced.\n\nReason: {message}")
}

/// Feedback for a candidate that failed to run.
#[must_use]
pub fn build_execution_feedback(error: &ExecError, attempt: usize, max_attempts: usize) -> String {
    let mut feedback = format!("Attempt {attempt}/{max_attempts}: the script failed to run.\n\n");
    match error {
        ExecError::NonZeroExit { code, stderr } => {
            let _ = writeln!(feedback, "Exit status: {code}");
            feedback.push_str("Captured stderr:\n");
            feedback.push_str(&truncate(stderr, MAX_STDERR_CHARS));
        }
        ExecError::Timeout(limit) => {
            let _ = write!(
                feedback,
                "The script exceeded the {limit:?} time limit and was killed. \
                 Remove unbounded loops and avoid reading the document repeatedly."
            );
        }
        ExecError::InvalidOutput(reason) => {
            let _ = write!(
                feedback,
                "The script exited cleanly but its stdout is not the expected CSV table: {reason}. \
                 Print only the CSV table, starting with the exact header row."
            );
        }
        other => {
            let _ = write!(feedback, "{other}");
        }
    }
    feedback.push_str("\n\nFix the problem and resubmit the complete corrected script.");
    feedback
}

/// Feedback for a candidate that ran but diverged from the reference.
#[must_use]
pub fn build_mismatch_feedback(diff: &TableDiff, attempt: usize, max_attempts: usize) -> String {
    let mut feedback = format!(
        "Attempt {attempt}/{max_attempts}: the script ran but its output does not match the expected table.\n\n"
    );

    if let Some((expected, actual)) = diff.row_counts {
        let _ = writeln!(
            feedback,
            "Row count: expected {expected} rows, the script produced {actual}."
        );
    }

    if !diff.missing_rows.is_empty() {
        feedback.push_str("Expected rows the script did not produce:\n");
        for row in &diff.missing_rows {
            let _ = writeln!(feedback, "  - row {}: {}", row.row, row.preview);
        }
    }

    if !diff.extra_rows.is_empty() {
        feedback.push_str("Rows the script produced beyond the expected table:\n");
        for row in &diff.extra_rows {
            let _ = writeln!(feedback, "  - row {}: {}", row.row, row.preview);
        }
    }

    if !diff.cells.is_empty() {
        feedback.push_str("Cell mismatches (row, column: expected vs. produced):\n");
        for cell in &diff.cells {
            let _ = writeln!(
                feedback,
                "  - row {}, column \"{}\": expected {}, got {}",
                cell.row, cell.column, cell.expected, cell.actual
            );
        }
    }

    feedback.push_str("\nFix every mismatch and resubmit the complete corrected script.");
    feedback
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars).collect();
    format!("{truncated}...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{CellDiff, RowSummary};

    #[test]
    fn mismatch_feedback_names_rows_and_columns() {
        let diff = TableDiff {
            row_counts: Some((2, 1)),
            missing_rows: vec![RowSummary {
                row: 2,
                preview: "06-01-2024,Y,250.00".to_string(),
            }],
            extra_rows: Vec::new(),
            cells: vec![CellDiff {
                row: 1,
                column: "Amount".to_string(),
                expected: "-100.00".to_string(),
                actual: "(empty)".to_string(),
            }],
        };

        let feedback = build_mismatch_feedback(&diff, 1, 3);
        assert!(feedback.contains("Attempt 1/3"));
        assert!(feedback.contains("expected 2 rows, the script produced 1"));
        assert!(feedback.contains("row 2: 06-01-2024,Y,250.00"));
        assert!(feedback.contains("row 1, column \"Amount\": expected -100.00, got (empty)"));
        assert!(feedback.contains("resubmit the complete corrected script"));
    }

    #[test]
    fn execution_feedback_carries_stderr() {
        let err = ExecError::NonZeroExit {
            code: 1,
            stderr: "ZeroDivisionError: division by zero".to_string(),
        };
        let feedback = build_execution_feedback(&err, 2, 3);
        assert!(feedback.contains("Attempt 2/3"));
        assert!(feedback.contains("Exit status: 1"));
        assert!(feedback.contains("ZeroDivisionError"));
    }

    #[test]
    fn long_stderr_is_truncated() {
        let err = ExecError::NonZeroExit {
            code: 1,
            stderr: "x".repeat(5000),
        };
        let feedback = build_execution_feedback(&err, 1, 3);
        assert!(feedback.contains("..."));
        assert!(feedback.len() < 2000);
    }
}
