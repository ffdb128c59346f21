use serde::{Deserialize, Serialize};

/// Verdict for one expected word after aligning it against the spoken words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WordStatus {
    /// Final fragment, similarity at or above the match threshold
    Matched,
    /// Final fragment, similarity in the partial-match band
    Mismatched,
    /// No spoken word scored above the partial-match floor
    Skipped,
    /// Provisional fragment, would be `Matched` if finalized
    ProvisionalMatched,
    /// Provisional fragment, would be `Mismatched` if finalized
    ProvisionalMismatched,
}

/// Per-word outcome of one alignment call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlignmentResult {
    /// Index of the expected word (absolute within the unit once re-based)
    pub position: usize,
    /// The expected word, verbatim from the reference unit
    pub expected: String,
    /// The spoken word consumed for this expected word, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spoken: Option<String>,
    pub status: WordStatus,
    /// Best similarity score found, absent when no candidate was consumed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
}

/// Aggregate counts over one alignment call.
///
/// Only final fragments increment `matched`/`mismatched`/`skipped`;
/// `total` always equals the expected-word count.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AlignmentSummary {
    pub matched: usize,
    pub mismatched: usize,
    pub skipped: usize,
    pub total: usize,
}
