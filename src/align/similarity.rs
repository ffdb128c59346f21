use super::normalize::{is_arabic, normalize, Script};

/// Similarity at or above this counts as a word match
pub const MATCH_THRESHOLD: f64 = 0.7;

/// Blended similarity between two strings, in [0, 1].
///
/// Combines a matching-blocks ratio, a normalized Levenshtein score and,
/// for multi-token inputs, a greedy token-set score. Returns 0.0 when
/// either raw input is empty. Deterministic for identical inputs.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let mut norm_a = normalize(a, Script::Arabic);
    let mut norm_b = normalize(b, Script::Arabic);

    // If either side is not Arabic, compare both on the Latin path
    if !is_arabic(a) || !is_arabic(b) {
        norm_a = normalize(a, Script::Latin);
        norm_b = normalize(b, Script::Latin);
    }

    let seq = sequence_ratio(&norm_a, &norm_b);

    let max_len = norm_a.chars().count().max(norm_b.chars().count());
    let lev = if max_len == 0 {
        1.0
    } else {
        1.0 - strsim::levenshtein(&norm_a, &norm_b) as f64 / max_len as f64
    };

    let tokens_a: Vec<&str> = norm_a.split_whitespace().collect();
    let tokens_b: Vec<&str> = norm_b.split_whitespace().collect();

    if tokens_a.len() > 1 || tokens_b.len() > 1 {
        let word_sim = token_set_similarity(&tokens_a, &tokens_b);
        seq * 0.4 + lev * 0.4 + word_sim * 0.2
    } else {
        seq * 0.6 + lev * 0.4
    }
}

/// Classic matching-blocks ratio over characters: 2·M / (len_a + len_b),
/// where M is the total length of recursively found longest common blocks.
pub fn sequence_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let matches = matching_block_total(&a, &b);
    2.0 * matches as f64 / (a.len() + b.len()) as f64
}

/// Total matched characters: find the longest common block, then recurse
/// on the pieces before and after it.
fn matching_block_total(a: &[char], b: &[char]) -> usize {
    let (best_a, best_b, best_len) = longest_common_block(a, b);
    if best_len == 0 {
        return 0;
    }
    best_len
        + matching_block_total(&a[..best_a], &b[..best_b])
        + matching_block_total(&a[best_a + best_len..], &b[best_b + best_len..])
}

fn longest_common_block(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    // Rolling row of common-suffix lengths ending at (i, j)
    let mut row = vec![0usize; b.len() + 1];
    for (i, &ca) in a.iter().enumerate() {
        let mut prev = 0;
        for (j, &cb) in b.iter().enumerate() {
            let diag = prev;
            prev = row[j + 1];
            row[j + 1] = if ca == cb { diag + 1 } else { 0 };
            if row[j + 1] > best.2 {
                best = (i + 1 - row[j + 1], j + 1 - row[j + 1], row[j + 1]);
            }
        }
    }
    best
}

/// Greedy token-set similarity: each token of `tokens_a` consumes its best
/// unconsumed counterpart in `tokens_b` whose block ratio meets the match
/// threshold; the score sum is divided by the longer list's length.
pub fn token_set_similarity(tokens_a: &[&str], tokens_b: &[&str]) -> f64 {
    if tokens_a.is_empty() && tokens_b.is_empty() {
        return 1.0;
    }
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let total = tokens_a.len().max(tokens_b.len());
    let mut consumed = vec![false; tokens_b.len()];
    let mut score_sum = 0.0;

    for word_a in tokens_a {
        let mut best_score = 0.0;
        let mut best_idx = None;
        for (j, word_b) in tokens_b.iter().enumerate() {
            if consumed[j] {
                continue;
            }
            let score = sequence_ratio(word_a, word_b);
            if score > best_score && score >= MATCH_THRESHOLD {
                best_score = score;
                best_idx = Some(j);
            }
        }
        if let Some(j) = best_idx {
            score_sum += best_score;
            consumed[j] = true;
        }
    }

    score_sum / total as f64
}
