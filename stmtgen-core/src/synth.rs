//! Prompt assembly for candidate synthesis.
//!
//! Stateless from the loop's perspective: this module builds the synthesis
//! request text and post-processes the provider's response. All retry logic
//! lives in the refinement loop.

use crate::error::AttemptRecord;
use crate::record::{RecordError, Schema, Table};
use crate::target::Target;
use std::fmt::Write;
use std::path::Path;

/// Rows of the reference table included as ground-truth context.
const REFERENCE_HEAD_ROWS: usize = 3;

/// Minimum printable run length kept by the document scrape.
const MIN_RUN_LEN: usize = 4;

/// Static context for one target's synthesis requests, gathered once per run.
#[derive(Debug, Clone)]
pub struct SynthInput {
    /// Target name.
    pub target_name: String,
    /// Schema of the expected output.
    pub schema: Schema,
    /// Header plus first rows of the reference table, rendered as CSV.
    pub reference_head: String,
    /// Bounded excerpt of the raw document content.
    pub excerpt: String,
}

impl SynthInput {
    /// Gathers prompt context from the target's document and reference.
    pub fn gather(
        target: &Target,
        reference: &Table,
        max_excerpt_chars: usize,
    ) -> Result<Self, GatherError> {
        let reference_head = reference.head_csv(REFERENCE_HEAD_ROWS)?;
        let excerpt = document_excerpt(&target.document, max_excerpt_chars)
            .map_err(GatherError::Document)?;
        Ok(Self {
            target_name: target.name.clone(),
            schema: reference.schema().clone(),
            reference_head,
            excerpt,
        })
    }
}

/// Errors while gathering prompt context.
#[derive(Debug, thiserror::Error)]
pub enum GatherError {
    /// The reference head could not be rendered.
    #[error("failed to render reference context: {0}")]
    Reference(#[from] RecordError),
    /// The sample document could not be read.
    #[error("failed to read sample document: {0}")]
    Document(std::io::Error),
}

/// Builds the synthesis prompt for the next attempt.
///
/// Includes the extraction contract, schema description, reference context,
/// document excerpt, and the feedback from **every** prior attempt in order.
/// History is never truncated to the latest entry: a partially fixed mistake
/// from attempt 1 can resurface at attempt 3 if its feedback is omitted.
#[must_use]
pub fn build_prompt(input: &SynthInput, history: &[AttemptRecord], max_attempts: usize) -> String {
    let header = input.schema.names().join(",");
    let mut prompt = String::new();

    let _ = write!(
        prompt,
        "You write standalone Python scripts that extract the transaction table \
         from bank statement documents.\n\n\
         Script contract:\n\
         - The script is run as: python3 script.py <document-path>\n\
         - It must print the extracted table as CSV to stdout and nothing else.\n\
         - The first output line must be exactly this header: {header}\n\
         - Leave a cell empty when the statement has no value for it.\n\
         - Exit with status 0 on success.\n\n\
         Columns:\n{}\n\n\
         First rows of the expected output for the sample document:\n{}\n\
         Excerpt of the raw sample document ({}):\n{}\n",
        input.schema.describe(),
        input.reference_head,
        input.target_name,
        input.excerpt,
    );

    if !history.is_empty() {
        prompt.push_str("\nPrevious attempts failed. All feedback so far, oldest first:\n");
        for record in history {
            let _ = write!(
                prompt,
                "\n--- attempt {} of {} ---\n{}\n",
                record.attempt, max_attempts, record.feedback
            );
        }
    }

    prompt.push_str("\nRespond with ONLY the complete script source. No commentary.");
    prompt
}

/// Extracts usable script source from a provider response.
///
/// Strips a Markdown code fence when the response carries one; returns
/// `None` when the response is empty or contains no code.
#[must_use]
pub fn extract_source(response: &str) -> Option<String> {
    let trimmed = response.trim();
    if trimmed.is_empty() {
        return None;
    }

    let source = if let Some(start) = trimmed.find("```") {
        let after_fence = &trimmed[start + 3..];
        // Skip the optional language tag on the fence line.
        let body_start = after_fence.find('\n').map_or(after_fence.len(), |i| i + 1);
        let body = &after_fence[body_start..];
        let body_end = body.find("```").unwrap_or(body.len());
        body[..body_end].trim()
    } else {
        trimmed
    };

    if source.is_empty() {
        None
    } else {
        Some(source.to_string())
    }
}

/// Scrapes a bounded excerpt of printable text from a document.
///
/// Keeps runs of printable ASCII of at least [`MIN_RUN_LEN`] characters,
/// newline-separated, truncated to `max_chars`. Enough context for the
/// synthesizer to see the document's layout without a full text extraction
/// pipeline.
pub fn document_excerpt(path: &Path, max_chars: usize) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    let mut excerpt = String::new();
    let mut run = String::new();

    for &byte in &bytes {
        if (0x20..0x7f).contains(&byte) {
            run.push(byte as char);
        } else {
            if run.trim().len() >= MIN_RUN_LEN {
                excerpt.push_str(run.trim());
                excerpt.push('\n');
            }
            run.clear();
            if excerpt.len() >= max_chars {
                break;
            }
        }
    }
    if run.trim().len() >= MIN_RUN_LEN && excerpt.len() < max_chars {
        excerpt.push_str(run.trim());
        excerpt.push('\n');
    }

    if excerpt.len() > max_chars {
        let cut = excerpt
            .char_indices()
            .take_while(|(i, _)| *i < max_chars)
            .last()
            .map_or(0, |(i, c)| i + c.len_utf8());
        excerpt.truncate(cut);
    }
    Ok(excerpt)
}
