//! Order-sensitive table comparison with row- and column-level diff output.
//!
//! Rows are matched positionally: statement rows are chronological, so a
//! candidate that reorders them is defective and the diff says so.

use crate::record::{Table, Value};
use serde::Serialize;
use std::fmt;

/// Outcome of comparing a produced table against the reference.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Comparison {
    /// Same row count and every value pairwise equal.
    Equal,
    /// At least one divergence; see the diff for where.
    Diff(TableDiff),
}

/// One diverging cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellDiff {
    /// 1-indexed data row.
    pub row: usize,
    /// Column name.
    pub column: String,
    /// Rendered expected value.
    pub expected: String,
    /// Rendered actual value.
    pub actual: String,
}

/// A row present on only one side, with a preview for feedback.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowSummary {
    /// 1-indexed data row.
    pub row: usize,
    /// Comma-joined rendered values.
    pub preview: String,
}

/// Row/column-indexed mismatch summary between two tables.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableDiff {
    /// `(expected, actual)` row counts when they differ.
    pub row_counts: Option<(usize, usize)>,
    /// Expected rows with no produced counterpart.
    pub missing_rows: Vec<RowSummary>,
    /// Produced rows beyond the expected count.
    pub extra_rows: Vec<RowSummary>,
    /// Diverging cells over the common row prefix.
    pub cells: Vec<CellDiff>,
}

impl fmt::Display for TableDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some((expected, actual)) = self.row_counts {
            parts.push(format!("{expected} rows expected, {actual} produced"));
        }
        if !self.cells.is_empty() {
            parts.push(format!("{} cell mismatch(es)", self.cells.len()));
        }
        write!(f, "{}", parts.join("; "))
    }
}

/// Compares a produced table against the reference.
///
/// Pure and deterministic: the same pair of tables always yields the same
/// [`Comparison`]. Collects every divergence, not just the first, because
/// the feedback loop needs the full picture to improve on.
#[must_use]
pub fn compare(expected: &Table, actual: &Table) -> Comparison {
    let exp_rows = expected.rows();
    let act_rows = actual.rows();
    let common = exp_rows.len().min(act_rows.len());

    let mut cells = Vec::new();
    for row in 0..common {
        for (col, field) in expected.schema().fields.iter().enumerate() {
            let exp = &exp_rows[row][col];
            let act = &act_rows[row][col];
            if exp != act {
                cells.push(CellDiff {
                    row: row + 1,
                    column: field.name.clone(),
                    expected: render(exp),
                    actual: render(act),
                });
            }
        }
    }

    let missing_rows = summarize(&exp_rows[common..], common);
    let extra_rows = summarize(&act_rows[common..], common);
    let row_counts = (exp_rows.len() != act_rows.len())
        .then_some((exp_rows.len(), act_rows.len()));

    if cells.is_empty() && row_counts.is_none() {
        Comparison::Equal
    } else {
        Comparison::Diff(TableDiff {
            row_counts,
            missing_rows,
            extra_rows,
            cells,
        })
    }
}

fn summarize(rows: &[Vec<Value>], offset: usize) -> Vec<RowSummary> {
    rows.iter()
        .enumerate()
        .map(|(i, row)| RowSummary {
            row: offset + i + 1,
            preview: row.iter().map(render).collect::<Vec<_>>().join(","),
        })
        .collect()
}

fn render(value: &Value) -> String {
    match value {
        Value::Null => "(empty)".to_string(),
        other => other.to_string(),
    }
}
