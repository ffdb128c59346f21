use serde::{Deserialize, Serialize};

/// One addressable chunk of the reference text (e.g. a verse) with its
/// ordered expected-word sequence and traversal locators.
///
/// Units are immutable once fetched; the corpus provider owns them and the
/// engine only caches copies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReferenceUnit {
    /// Corpus this unit belongs to (e.g. a surah id)
    pub corpus_id: u32,
    /// Position of the unit within its corpus (1-based in source data)
    pub unit_id: u32,
    /// Raw reference text of the unit
    pub text: String,
    /// Tokenized expected words, in recitation order
    pub words: Vec<String>,
    /// Page locator used by page-sequential traversal
    pub page: u32,
    /// Section locator used by section-sequential traversal (e.g. a juz)
    pub section: u32,
    /// Finer-grained locator within the section (e.g. a quarter-hizb)
    pub subsection: u32,
}

impl ReferenceUnit {
    /// Number of expected words in this unit
    pub fn word_count(&self) -> usize {
        self.words.len()
    }
}

/// Corpus-level metadata needed for unit-sequential traversal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CorpusInfo {
    /// Total number of units in the corpus
    pub unit_count: u32,
}
