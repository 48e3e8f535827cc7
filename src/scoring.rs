//! Relevance scoring.
//!
//! Additive, occurrence-weighted model: exact and prefix title matches
//! dominate raw term frequency, and actionable result kinds (flashcards)
//! outrank passive ones (tags) when match counts are equal. Commands bypass
//! the formula entirely and receive a fixed score.

use crate::interface::ResultKind;

pub const TITLE_OCCURRENCE_WEIGHT: f64 = 10.0;
pub const TITLE_EXACT_BONUS: f64 = 50.0;
pub const TITLE_PREFIX_BONUS: f64 = 20.0;
pub const CONTENT_OCCURRENCE_WEIGHT: f64 = 1.0;
pub const PRESENCE_BONUS: f64 = 5.0;

/// Raw scores are clamped to [0, this] before normalizing to [0, 1].
pub const SCORE_CEILING: f64 = 100.0;

/// Fixed normalized score for command results: above a weak content match,
/// below a strong title match.
pub const COMMAND_SCORE: f64 = 0.6;

/// Per-kind weight applied to the raw sum.
pub fn kind_weight(kind: ResultKind) -> f64 {
    match kind {
        ResultKind::Document => 1.0,
        ResultKind::Extract => 1.2,
        ResultKind::Flashcard => 1.5,
        ResultKind::Category => 0.8,
        ResultKind::Tag => 0.5,
        // Commands never reach the formula; weight is irrelevant.
        ResultKind::Command => 1.0,
    }
}

/// Score a candidate against the query terms. Returns a value in [0, 1].
pub fn score(kind: ResultKind, title: &str, content: Option<&str>, terms: &[String]) -> f64 {
    if kind == ResultKind::Command {
        return COMMAND_SCORE;
    }

    let title_lower = title.to_lowercase();
    let content_lower = content.map(str::to_lowercase);

    let mut sum = 0.0;
    let mut seen: Vec<&str> = Vec::with_capacity(terms.len());
    for term in terms {
        let term = term.as_str();
        if term.is_empty() || seen.contains(&term) {
            continue;
        }
        seen.push(term);

        let title_count = count_occurrences(&title_lower, term);
        sum += title_count as f64 * TITLE_OCCURRENCE_WEIGHT;
        if title_lower == term {
            sum += TITLE_EXACT_BONUS;
        }
        if title_lower.starts_with(term) {
            sum += TITLE_PREFIX_BONUS;
        }

        let content_count = content_lower
            .as_deref()
            .map(|c| count_occurrences(c, term))
            .unwrap_or(0);
        sum += content_count as f64 * CONTENT_OCCURRENCE_WEIGHT;

        if title_count > 0 || content_count > 0 {
            sum += PRESENCE_BONUS;
        }
    }

    (sum * kind_weight(kind)).clamp(0.0, SCORE_CEILING) / SCORE_CEILING
}

/// Non-overlapping occurrence count of `needle` in `haystack` (both lowercased).
fn count_occurrences(haystack: &str, needle: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }
    haystack.match_indices(needle).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_score_in_unit_range() {
        let s = score(
            ResultKind::Document,
            "machine learning machine learning",
            Some(&"machine ".repeat(500)),
            &terms(&["machine", "learning"]),
        );
        assert!((0.0..=1.0).contains(&s), "score out of range: {s}");
    }

    #[test]
    fn test_exact_title_beats_content_only() {
        let title_hit = score(ResultKind::Document, "rust", None, &terms(&["rust"]));
        let content_hit = score(
            ResultKind::Document,
            "Some notes",
            Some("a paragraph about rust here"),
            &terms(&["rust"]),
        );
        assert!(
            title_hit > content_hit,
            "exact title {title_hit} should beat content-only {content_hit}"
        );
    }

    #[test]
    fn test_prefix_title_bonus() {
        let prefix = score(ResultKind::Document, "rust in action", None, &terms(&["rust"]));
        let middle = score(ResultKind::Document, "learning rust now", None, &terms(&["rust"]));
        assert!(prefix > middle);
    }

    #[test]
    fn test_kind_weight_ordering() {
        let t = terms(&["energy"]);
        let flashcard = score(ResultKind::Flashcard, "energy basics", None, &t);
        let document = score(ResultKind::Document, "energy basics", None, &t);
        let tag = score(ResultKind::Tag, "energy basics", None, &t);
        assert!(flashcard > document);
        assert!(document > tag);
    }

    #[test]
    fn test_command_fixed_score() {
        let s = score(ResultKind::Command, "Open Settings", None, &terms(&["settings"]));
        assert!((s - COMMAND_SCORE).abs() < 1e-9);
        // Unrelated terms still yield the constant.
        let s = score(ResultKind::Command, "Open Settings", None, &terms(&["zzz"]));
        assert!((s - COMMAND_SCORE).abs() < 1e-9);
    }

    #[test]
    fn test_no_match_scores_zero() {
        let s = score(ResultKind::Document, "Cooking", None, &terms(&["machine"]));
        assert_eq!(s, 0.0);
    }

    #[test]
    fn test_duplicate_terms_counted_once() {
        let once = score(ResultKind::Document, "rust guide", None, &terms(&["rust"]));
        let twice = score(ResultKind::Document, "rust guide", None, &terms(&["rust", "rust"]));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_content_occurrences_weighted_low() {
        // 10 content occurrences (10 pts + 5 presence) < 2 title occurrences
        // (20 pts + 5 presence).
        let content = score(
            ResultKind::Document,
            "Notes",
            Some(&"rust ".repeat(10)),
            &terms(&["rust"]),
        );
        let title = score(ResultKind::Document, "learning rust with rust", None, &terms(&["rust"]));
        assert!(title > content);
    }

    #[test]
    fn test_clamp_at_ceiling() {
        let s = score(
            ResultKind::Flashcard,
            "rust rust rust rust rust rust rust rust rust rust rust",
            None,
            &terms(&["rust"]),
        );
        assert_eq!(s, 1.0);
    }
}
