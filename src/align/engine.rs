use std::fmt;
use std::str::FromStr;

use crate::error::EngineError;
use crate::models::{AlignmentResult, AlignmentSummary, WordStatus};

use super::normalize::{normalize, Script};
use super::similarity::{similarity, MATCH_THRESHOLD};

/// Best scores at or below this floor leave the expected word skipped
const PARTIAL_FLOOR: f64 = 0.3;

/// Align an expected word sequence against a spoken transcript fragment.
///
/// Greedy, single-pass, non-backtracking: each expected word consumes at
/// most one spoken word, searching from its own index forward and wrapping
/// around, so roughly positional recitation aligns cheaply while limited
/// out-of-order recovery stays possible. O(n·m) in expected x spoken words.
///
/// Summary counts only accumulate for final fragments; provisional calls
/// produce provisional statuses and a zeroed summary apart from `total`.
pub fn compare(
    expected: &[String],
    spoken_text: &str,
    is_final: bool,
) -> (Vec<AlignmentResult>, AlignmentSummary) {
    let mut summary = AlignmentSummary::default();
    if expected.is_empty() {
        return (Vec::new(), summary);
    }
    summary.total = expected.len();

    let normalized = normalize(spoken_text, Script::detect(spoken_text));
    let spoken_words: Vec<&str> = normalized.split_whitespace().collect();

    let mut results = Vec::with_capacity(expected.len());

    // An empty fragment never counts as a match attempt, final or not
    if spoken_words.is_empty() {
        for (position, word) in expected.iter().enumerate() {
            results.push(AlignmentResult {
                position,
                expected: word.clone(),
                spoken: None,
                status: WordStatus::Skipped,
                similarity: None,
            });
        }
        if is_final {
            summary.skipped = expected.len();
        }
        return (results, summary);
    }

    let mut consumed = vec![false; spoken_words.len()];

    for (position, expected_word) in expected.iter().enumerate() {
        // Search from the positionally aligned index, wrapping to the start
        let search_start = position.min(spoken_words.len() - 1);
        let mut best_score = 0.0;
        let mut best_idx = None;

        for idx in (search_start..spoken_words.len()).chain(0..search_start) {
            if consumed[idx] {
                continue;
            }
            let score = similarity(expected_word, spoken_words[idx]);
            if score > best_score {
                best_score = score;
                best_idx = Some(idx);
            }
        }

        let mut result = AlignmentResult {
            position,
            expected: expected_word.clone(),
            spoken: None,
            status: WordStatus::Skipped,
            similarity: None,
        };

        match best_idx {
            Some(idx) if best_score >= MATCH_THRESHOLD => {
                consumed[idx] = true;
                result.spoken = Some(spoken_words[idx].to_string());
                result.similarity = Some(best_score);
                if is_final {
                    result.status = WordStatus::Matched;
                    summary.matched += 1;
                } else {
                    result.status = WordStatus::ProvisionalMatched;
                }
            }
            // Partial matches still consume the spoken word
            Some(idx) if best_score > PARTIAL_FLOOR => {
                consumed[idx] = true;
                result.spoken = Some(spoken_words[idx].to_string());
                result.similarity = Some(best_score);
                if is_final {
                    result.status = WordStatus::Mismatched;
                    summary.mismatched += 1;
                } else {
                    result.status = WordStatus::ProvisionalMismatched;
                }
            }
            _ => {
                if is_final {
                    summary.skipped += 1;
                }
            }
        }

        results.push(result);
    }

    (results, summary)
}

/// Dotted `corpus.unit.word` address of a single expected word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionIndex {
    pub corpus_id: u32,
    pub unit_id: u32,
    pub word_position: u32,
}

impl fmt::Display for PositionIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.corpus_id, self.unit_id, self.word_position)
    }
}

impl FromStr for PositionIndex {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 3 {
            return Err(EngineError::Format(s.to_string()));
        }
        let parse = |part: &str| {
            part.parse::<u32>()
                .map_err(|_| EngineError::Format(s.to_string()))
        };
        Ok(PositionIndex {
            corpus_id: parse(parts[0])?,
            unit_id: parse(parts[1])?,
            word_position: parse(parts[2])?,
        })
    }
}
