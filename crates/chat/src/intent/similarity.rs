//! Typo-tolerant matching on normalized text.

use strsim::normalized_levenshtein;

/// Minimum similarity for a fuzzy hit.
pub const FUZZY_CUTOFF: f64 = 0.82;

/// Tokens shorter than this never take part in fuzzy matching.
pub const MIN_FUZZY_LEN: usize = 4;

/// Similarity in [0, 1]; 1.0 for identical strings.
pub fn ratio(a: &str, b: &str) -> f64 {
    normalized_levenshtein(a, b)
}

/// Best ratio of `token` against `candidates`, when it clears the cutoff.
pub fn best_match<'a>(token: &str, candidates: impl IntoIterator<Item = &'a str>) -> Option<f64> {
    if token.chars().count() < MIN_FUZZY_LEN {
        return None;
    }
    candidates
        .into_iter()
        .map(|c| ratio(token, c))
        .filter(|r| *r >= FUZZY_CUTOFF)
        .max_by(|a, b| a.total_cmp(b))
}

/// Word-bounded containment of `phrase` in `text` (both normalized).
pub fn contains_phrase(text: &str, phrase: &str) -> bool {
    if phrase.is_empty() {
        return false;
    }
    format!(" {text} ").contains(&format!(" {phrase} "))
}

/// Similarity of `name` to the whole text or to any window of the same
/// word count, whichever is highest. `None` below the cutoff.
pub fn name_similarity(tokens: &[&str], name: &str) -> Option<f64> {
    let whole = ratio(&tokens.join(" "), name);
    let width = name.split(' ').count();
    let windows = if tokens.len() >= width {
        tokens
            .windows(width)
            .map(|w| w.join(" "))
            .filter(|w| w.chars().count() >= MIN_FUZZY_LEN)
            .map(|w| ratio(&w, name))
            .fold(0.0_f64, f64::max)
    } else {
        0.0
    };
    let best = whole.max(windows);
    (best >= FUZZY_CUTOFF).then_some(best)
}
