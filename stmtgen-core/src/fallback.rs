//! Registry of deterministic fallback extractors.
//!
//! Fallbacks are author-maintained scripts embedded at compile time, keyed
//! by target name. They give the loop a guaranteed-terminating success path
//! and a baseline oracle for testing the pipeline independent of the
//! provider. A fallback is always re-verified against the reference before
//! acceptance, never assumed correct.

use std::collections::HashMap;

/// Maintained fallback for the ICICI statement layout.
const ICICI: &str = include_str!("../fallback/icici.py");

/// Target-name-keyed fallback extractor sources.
#[derive(Debug, Clone, Default)]
pub struct Fallbacks {
    scripts: HashMap<String, String>,
}

impl Fallbacks {
    /// An empty registry (no fallback for any target).
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// The registry of fallbacks shipped in-tree.
    #[must_use]
    pub fn builtin() -> Self {
        Self::default().with("icici", ICICI)
    }

    /// Registers (or overrides) a fallback for a target.
    #[must_use]
    pub fn with(mut self, target: &str, source: &str) -> Self {
        self.scripts.insert(target.to_string(), source.to_string());
        self
    }

    /// Looks up the fallback source for a target.
    #[must_use]
    pub fn get(&self, target: &str) -> Option<&str> {
        self.scripts.get(target).map(String::as_str)
    }
}
