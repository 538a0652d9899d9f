//! Tabular record model: schema inference, value normalization, and CSV I/O.
//!
//! A [`Table`] is the unit every extractor (synthesized or fallback) must
//! produce and the unit the reference oracle compares against. Values are
//! normalized at parse time so that `"1,234.50"` and `1234.5` compare equal
//! and differently formatted dates collapse to one representation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Date representations accepted from statements and candidate output.
const DATE_FORMATS: &[&str] = &["%d-%m-%Y", "%d/%m/%Y", "%Y-%m-%d", "%d %b %Y"];

/// Errors produced while reading, parsing, or rendering tables.
#[derive(Debug, Error)]
pub enum RecordError {
    /// Underlying CSV read/write failure.
    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    /// The reference table contained a header but no data rows.
    #[error("reference table at {path} has no data rows")]
    EmptyReference {
        /// Path the reference was read from.
        path: String,
    },

    /// Output header did not match the expected schema.
    #[error("header mismatch: expected [{expected}], got [{actual}]")]
    HeaderMismatch {
        /// Comma-joined expected field names.
        expected: String,
        /// Comma-joined actual field names.
        actual: String,
    },

    /// A data row had the wrong number of fields.
    #[error("row {row} has {actual} fields, expected {expected}")]
    RowWidth {
        /// 1-indexed data row number.
        row: usize,
        /// Field count the schema requires.
        expected: usize,
        /// Field count found.
        actual: usize,
    },

    /// Rendering a table back to CSV failed.
    #[error("failed to render table: {0}")]
    Render(String),
}

/// The typed kind of a column, inferred from the reference table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    /// Calendar date.
    Date,
    /// Numeric amount (debit/credit/balance).
    Amount,
    /// Free text.
    Text,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Date => write!(f, "date"),
            Self::Amount => write!(f, "number"),
            Self::Text => write!(f, "text"),
        }
    }
}

/// One named, typed column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Column name as it appears in the CSV header.
    pub name: String,
    /// Inferred kind.
    pub kind: FieldKind,
}

/// Ordered set of named, typed columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    /// Columns in header order.
    pub fields: Vec<Field>,
}

impl Schema {
    /// Infers a schema from a header and raw string rows.
    ///
    /// A column whose every non-empty cell parses as a date is `Date`; every
    /// non-empty cell numeric is `Amount`; anything else (or an all-empty
    /// column) is `Text`.
    #[must_use]
    pub fn infer(header: &[String], rows: &[Vec<String>]) -> Self {
        let fields = header
            .iter()
            .enumerate()
            .map(|(col, name)| {
                let cells: Vec<&str> = rows
                    .iter()
                    .filter_map(|row| row.get(col))
                    .map(String::as_str)
                    .filter(|cell| !cell.trim().is_empty())
                    .collect();
                let kind = if cells.is_empty() {
                    FieldKind::Text
                } else if cells.iter().all(|cell| parse_date(cell.trim()).is_some()) {
                    FieldKind::Date
                } else if cells.iter().all(|cell| parse_amount(cell.trim()).is_some()) {
                    FieldKind::Amount
                } else {
                    FieldKind::Text
                };
                Field {
                    name: name.trim().to_string(),
                    kind,
                }
            })
            .collect();
        Self { fields }
    }

    /// Column names in header order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Human-readable one-line-per-column description used in prompts.
    #[must_use]
    pub fn describe(&self) -> String {
        self.fields
            .iter()
            .map(|f| format!("- {} ({})", f.name, f.kind))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// One normalized cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Normalized calendar date.
    Date(NaiveDate),
    /// Normalized numeric amount. Equality is exact after normalization.
    Amount(f64),
    /// Trimmed text with internal newlines collapsed.
    Text(String),
    /// Legitimately absent cell (e.g. only one of debit/credit per row).
    Null,
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Date(d) => write!(f, "{}", d.format("%d-%m-%Y")),
            Self::Amount(a) => write!(f, "{a:.2}"),
            Self::Text(t) => write!(f, "{t}"),
            Self::Null => Ok(()),
        }
    }
}

/// Ordered rows of normalized values under a fixed schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    schema: Schema,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Reads the ground-truth reference table, inferring its schema.
    pub fn read_reference(path: &Path) -> Result<Self, RecordError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)?;
        let header: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let mut raw_rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            raw_rows.push(record.iter().map(str::to_string).collect::<Vec<_>>());
        }
        if raw_rows.is_empty() {
            return Err(RecordError::EmptyReference {
                path: path.display().to_string(),
            });
        }
        let schema = Schema::infer(&header, &raw_rows);
        let rows = convert_rows(&schema, &raw_rows)?;
        Ok(Self { schema, rows })
    }

    /// Parses candidate output against a known schema.
    ///
    /// The header must match the schema's field names exactly (after
    /// trimming); every row must have the schema's width.
    pub fn parse_with_schema(text: &str, schema: &Schema) -> Result<Self, RecordError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(text.as_bytes());
        let header: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let expected = schema.names();
        if header != expected {
            return Err(RecordError::HeaderMismatch {
                expected: expected.join(", "),
                actual: header.join(", "),
            });
        }
        let mut raw_rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            raw_rows.push(record.iter().map(str::to_string).collect::<Vec<_>>());
        }
        let rows = convert_rows(schema, &raw_rows)?;
        Ok(Self {
            schema: schema.clone(),
            rows,
        })
    }

    /// The table's schema.
    #[must_use]
    pub const fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Rows in order of appearance.
    #[must_use]
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Number of data rows.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Renders the table in the external tabular format.
    pub fn to_csv_string(&self) -> Result<String, RecordError> {
        self.render_csv(self.rows.len())
    }

    /// Renders the header and the first `n` rows, used as prompt context.
    pub fn head_csv(&self, n: usize) -> Result<String, RecordError> {
        self.render_csv(n.min(self.rows.len()))
    }

    fn render_csv(&self, rows: usize) -> Result<String, RecordError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(self.schema.names())?;
        for row in &self.rows[..rows] {
            writer.write_record(row.iter().map(ToString::to_string))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| RecordError::Render(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| RecordError::Render(e.to_string()))
    }
}

fn convert_rows(schema: &Schema, raw_rows: &[Vec<String>]) -> Result<Vec<Vec<Value>>, RecordError> {
    let width = schema.fields.len();
    let mut rows = Vec::with_capacity(raw_rows.len());
    for (i, raw) in raw_rows.iter().enumerate() {
        if raw.len() != width {
            return Err(RecordError::RowWidth {
                row: i + 1,
                expected: width,
                actual: raw.len(),
            });
        }
        let row = raw
            .iter()
            .zip(&schema.fields)
            .map(|(cell, field)| parse_cell(cell, field.kind))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

/// Normalizes one raw cell according to its column kind.
///
/// A cell that fails its kind's parse is kept as [`Value::Text`] so the
/// oracle reports it as a typed mismatch instead of aborting the attempt.
#[must_use]
pub fn parse_cell(raw: &str, kind: FieldKind) -> Value {
    let text = normalize_text(raw);
    if text.is_empty() {
        return Value::Null;
    }
    match kind {
        FieldKind::Date => parse_date(&text).map_or(Value::Text(text), Value::Date),
        FieldKind::Amount => parse_amount(&text).map_or(Value::Text(text), Value::Amount),
        FieldKind::Text => Value::Text(text),
    }
}

/// Trims and collapses all internal whitespace runs (including newlines
/// carried over from wrapped PDF cells) to a single space.
#[must_use]
pub fn normalize_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
}

fn parse_amount(text: &str) -> Option<f64> {
    let cleaned: String = text.chars().filter(|c| *c != ',' && *c != ' ').collect();
    cleaned.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn amount_strings_normalize_to_numbers() {
        assert_eq!(
            parse_cell("-100.00", FieldKind::Amount),
            Value::Amount(-100.0)
        );
        assert_eq!(
            parse_cell("250.00", FieldKind::Amount),
            Value::Amount(250.0)
        );
        assert_eq!(
            parse_cell("1,234.50", FieldKind::Amount),
            Value::Amount(1234.5)
        );
    }

    #[test]
    fn date_formats_collapse_to_one_representation() {
        for raw in ["05-01-2024", "05/01/2024", "2024-01-05", "05 Jan 2024"] {
            assert_eq!(
                parse_cell(raw, FieldKind::Date),
                Value::Date(date(2024, 1, 5)),
                "raw = {raw}"
            );
        }
    }

    #[test]
    fn empty_cells_are_null() {
        assert_eq!(parse_cell("", FieldKind::Amount), Value::Null);
        assert_eq!(parse_cell("   ", FieldKind::Text), Value::Null);
    }

    #[test]
    fn unparseable_typed_cell_degrades_to_text() {
        assert_eq!(
            parse_cell("n/a", FieldKind::Amount),
            Value::Text("n/a".to_string())
        );
    }

    #[test]
    fn text_newlines_collapse() {
        assert_eq!(
            normalize_text("UPI PAYMENT\nREF 12345  "),
            "UPI PAYMENT REF 12345"
        );
    }

    #[test]
    fn schema_inference_picks_kinds_per_column() {
        let header = vec![
            "Date".to_string(),
            "Description".to_string(),
            "Debit Amt".to_string(),
            "Credit Amt".to_string(),
        ];
        let rows = vec![
            vec![
                "05-01-2024".to_string(),
                "X".to_string(),
                "100.00".to_string(),
                String::new(),
            ],
            vec![
                "06-01-2024".to_string(),
                "Y".to_string(),
                String::new(),
                "250.00".to_string(),
            ],
        ];
        let schema = Schema::infer(&header, &rows);
        let kinds: Vec<FieldKind> = schema.fields.iter().map(|f| f.kind).collect();
        assert_eq!(
            kinds,
            vec![
                FieldKind::Date,
                FieldKind::Text,
                FieldKind::Amount,
                FieldKind::Amount
            ]
        );
    }

    #[test]
    fn parse_with_schema_rejects_wrong_header() {
        let header = vec!["Date".to_string(), "Amount".to_string()];
        let rows = vec![vec!["05-01-2024".to_string(), "1.00".to_string()]];
        let schema = Schema::infer(&header, &rows);
        let err = Table::parse_with_schema("Date,Amt\n05-01-2024,1.00\n", &schema).unwrap_err();
        assert!(matches!(err, RecordError::HeaderMismatch { .. }));
    }

    #[test]
    fn parse_with_schema_rejects_ragged_rows() {
        let header = vec!["Date".to_string(), "Amount".to_string()];
        let rows = vec![vec!["05-01-2024".to_string(), "1.00".to_string()]];
        let schema = Schema::infer(&header, &rows);
        let err = Table::parse_with_schema("Date,Amount\n05-01-2024,1.00,extra\n", &schema)
            .unwrap_err();
        assert!(matches!(
            err,
            RecordError::RowWidth {
                row: 1,
                expected: 2,
                actual: 3
            }
        ));
    }

    #[test]
    fn csv_round_trip_preserves_values() {
        let header = vec![
            "Date".to_string(),
            "Description".to_string(),
            "Amount".to_string(),
        ];
        let rows = vec![vec![
            "05-01-2024".to_string(),
            "X".to_string(),
            "-100.00".to_string(),
        ]];
        let schema = Schema::infer(&header, &rows);
        let table = Table::parse_with_schema("Date,Description,Amount\n05-01-2024,X,-100.00\n", &schema)
            .unwrap();
        let rendered = table.to_csv_string().unwrap();
        let reparsed = Table::parse_with_schema(&rendered, &schema).unwrap();
        assert_eq!(table, reparsed);
    }
}
