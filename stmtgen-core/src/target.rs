//! Target definitions: one document family to learn an extractor for.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors produced while resolving a target definition directory.
#[derive(Debug, Error)]
pub enum TargetError {
    /// The named directory does not exist under the data root.
    #[error("target directory not found: {0}")]
    NotFound(String),

    /// The directory could not be read.
    #[error("failed to read target directory {dir}: {source}")]
    Io {
        /// Directory that failed to read.
        dir: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The directory must contain exactly one reference `.csv` file.
    #[error("target `{name}` must contain exactly one reference .csv file (found {count})")]
    ReferenceCount {
        /// Target name.
        name: String,
        /// Number of `.csv` files found.
        count: usize,
    },

    /// The directory must contain exactly one sample document.
    #[error("target `{name}` must contain exactly one sample document (found {count})")]
    DocumentCount {
        /// Target name.
        name: String,
        /// Number of non-`.csv` files found.
        count: usize,
    },
}

/// One document family: a name, a sample document, and a reference table.
///
/// Immutable for the duration of a run.
#[derive(Debug, Clone)]
pub struct Target {
    /// Target name (the directory name under the data root).
    pub name: String,
    /// Path to the sample source document.
    pub document: PathBuf,
    /// Path to the ground-truth reference CSV.
    pub reference: PathBuf,
}

impl Target {
    /// Resolves a target from `data_dir/<name>/`.
    ///
    /// The directory must contain exactly one `.csv` file (the reference) and
    /// exactly one other regular file (the sample document). Hidden files and
    /// subdirectories are ignored.
    pub fn discover(data_dir: &Path, name: &str) -> Result<Self, TargetError> {
        let dir = data_dir.join(name);
        if !dir.is_dir() {
            return Err(TargetError::NotFound(dir.display().to_string()));
        }

        let entries = std::fs::read_dir(&dir).map_err(|source| TargetError::Io {
            dir: dir.display().to_string(),
            source,
        })?;

        let mut references = Vec::new();
        let mut documents = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| TargetError::Io {
                dir: dir.display().to_string(),
                source,
            })?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with('.'))
            {
                continue;
            }
            if path.extension().is_some_and(|ext| ext == "csv") {
                references.push(path);
            } else {
                documents.push(path);
            }
        }

        if references.len() != 1 {
            return Err(TargetError::ReferenceCount {
                name: name.to_string(),
                count: references.len(),
            });
        }
        if documents.len() != 1 {
            return Err(TargetError::DocumentCount {
                name: name.to_string(),
                count: documents.len(),
            });
        }

        Ok(Self {
            name: name.to_string(),
            document: documents.remove(0),
            reference: references.remove(0),
        })
    }
}
