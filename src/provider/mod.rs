pub mod memory;
pub mod rest;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{CorpusInfo, ReferenceUnit};

/// Read-only reference-corpus lookup service.
///
/// Implementations own retry policy; the engine treats any failure as a
/// transition-aborting provider error.
#[async_trait]
pub trait CorpusProvider: Send + Sync {
    /// Fetch one unit, `None` if absent.
    async fn unit(&self, corpus_id: u32, unit_id: u32) -> Result<Option<ReferenceUnit>>;

    /// All units on a page, in traversal order.
    async fn units_by_page(&self, page: u32) -> Result<Vec<ReferenceUnit>>;

    /// All units in a section, in traversal order.
    async fn units_by_section(&self, section: u32) -> Result<Vec<ReferenceUnit>>;

    /// Corpus-level metadata, `None` if the corpus is unknown.
    async fn corpus_info(&self, corpus_id: u32) -> Result<Option<CorpusInfo>>;
}

/// Unit record as stored by the corpus backend, before word resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawUnit {
    pub corpus_id: u32,
    pub unit_id: u32,
    pub text: String,
    /// Pre-tokenized words; absent or empty falls back to splitting `text`
    #[serde(default)]
    pub words_array: Option<Vec<String>>,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub section: u32,
    #[serde(default)]
    pub subsection: u32,
}

/// Resolve a raw record into a [`ReferenceUnit`].
///
/// The word-array fallback lives here, in the adapter, so the alignment
/// core never sees corpus-specific defaulting.
pub fn resolve_unit(raw: RawUnit) -> ReferenceUnit {
    let words = match raw.words_array {
        Some(words) if !words.is_empty() => words,
        _ => raw.text.split_whitespace().map(str::to_string).collect(),
    };
    ReferenceUnit {
        corpus_id: raw.corpus_id,
        unit_id: raw.unit_id,
        text: raw.text,
        words,
        page: raw.page,
        section: raw.section,
        subsection: raw.subsection,
    }
}
