//! Approximate matching via bounded Levenshtein edit distance.
//!
//! This is a secondary pass only: aggregators consult it per candidate when
//! an exact/substring match has already failed, the query term is long
//! enough, and the candidate is short enough to bound the quadratic cost.

/// Default maximum edit distance for a fuzzy match.
pub const DEFAULT_MAX_DISTANCE: u8 = 2;

/// Candidates longer than this are never fuzzy-matched (bounds the O(n·m) DP).
pub const MAX_CANDIDATE_CHARS: usize = 80;

/// Query terms shorter than this are never fuzzy-matched.
pub const MIN_TERM_CHARS: usize = 3;

/// Bounded-edit-distance matcher.
#[derive(Debug, Clone, Copy)]
pub struct FuzzyMatcher {
    max_distance: u8,
}

impl Default for FuzzyMatcher {
    fn default() -> Self {
        Self { max_distance: DEFAULT_MAX_DISTANCE }
    }
}

impl FuzzyMatcher {
    pub fn new(max_distance: u8) -> Self {
        Self { max_distance }
    }

    /// Approximate-match a query term against a candidate string.
    ///
    /// Returns the similarity `1 − distance / max(len)` when the distance is
    /// within the threshold, `None` otherwise. Gates: term length ≥ 3 chars,
    /// candidate length ≤ 80 chars. Both sides are compared lowercased.
    pub fn matches(&self, term: &str, candidate: &str) -> Option<f64> {
        let term_len = term.chars().count();
        let cand_len = candidate.chars().count();
        if term_len < MIN_TERM_CHARS || cand_len > MAX_CANDIDATE_CHARS {
            return None;
        }

        let term = term.to_lowercase();
        let candidate = candidate.to_lowercase();
        let distance = levenshtein_bounded(&term, &candidate, self.max_distance)?;
        let max_len = term_len.max(cand_len).max(1);
        Some(1.0 - distance as f64 / max_len as f64)
    }
}

/// Levenshtein edit distance with threshold pruning.
/// Rolling two-row DP; a whole row above `max_dist` aborts early, and a
/// length-difference prune skips the DP entirely.
/// Returns `Some(distance)` if distance ≤ `max_dist`, `None` otherwise.
pub fn levenshtein_bounded(a: &str, b: &str, max_dist: u8) -> Option<u8> {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let m = a_chars.len();
    let n = b_chars.len();
    let max_d = max_dist as usize;

    if m.abs_diff(n) > max_d {
        return None;
    }

    let mut prev: Vec<usize> = (0..=n).collect();
    let mut curr = vec![0usize; n + 1];

    for i in 1..=m {
        curr[0] = i;
        let mut row_min = curr[0];

        for j in 1..=n {
            let cost = if a_chars[i - 1] == b_chars[j - 1] { 0 } else { 1 };
            curr[j] = (prev[j] + 1)
                .min(curr[j - 1] + 1)
                .min(prev[j - 1] + cost);
            row_min = row_min.min(curr[j]);
        }

        if row_min > max_d {
            return None;
        }

        std::mem::swap(&mut prev, &mut curr);
    }

    let result = prev[n];
    if result <= max_d {
        Some(result as u8)
    } else {
        None
    }
}
