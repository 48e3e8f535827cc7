//! Term occurrence location and excerpt construction.
//!
//! Finds every case-insensitive term occurrence, then chooses a bounded
//! excerpt window by sliding a ±50-char window around each match and keeping
//! the window that covers the most matches (ties break toward the earliest
//! occurrence). Matches inside the excerpt are wrapped in explicit markers.
//!
//! All offsets are in characters. Case folding is per-char so that offsets
//! into the folded text line up with the original.

use crate::interface::HighlightSpan;

/// Bound on excerpt length, in characters.
pub const EXCERPT_MAX_CHARS: usize = 200;

/// Context radius around a match when scoring candidate windows.
pub const WINDOW_RADIUS_CHARS: usize = 50;

pub const MARK_OPEN: &str = "<mark>";
pub const MARK_CLOSE: &str = "</mark>";

const ELLIPSIS: char = '\u{2026}';

/// Per-char lowercase fold that preserves a 1:1 char mapping with the input.
/// Multi-char expansions (rare) keep only the first char so offsets stay
/// aligned.
fn fold_chars(s: &str) -> Vec<char> {
    s.chars()
        .map(|c| c.to_lowercase().next().unwrap_or(c))
        .collect()
}

/// Locate all case-insensitive occurrences of every term, sorted by start
/// offset with overlapping ranges merged.
pub fn find_occurrences(text: &str, terms: &[String]) -> Vec<HighlightSpan> {
    let hay = fold_chars(text);
    let original: Vec<char> = text.chars().collect();

    let mut ranges: Vec<(usize, usize)> = Vec::new();
    let mut seen_terms: Vec<&str> = Vec::new();
    for term in terms {
        let term = term.as_str();
        if term.is_empty() || seen_terms.contains(&term) {
            continue;
        }
        seen_terms.push(term);

        let needle = fold_chars(term);
        if needle.is_empty() || needle.len() > hay.len() {
            continue;
        }
        for start in 0..=(hay.len() - needle.len()) {
            if hay[start..start + needle.len()] == needle[..] {
                ranges.push((start, start + needle.len()));
            }
        }
    }

    ranges.sort_unstable();

    // Merge overlapping ranges so nested markers never occur.
    let mut merged: Vec<(usize, usize)> = Vec::with_capacity(ranges.len());
    for (start, end) in ranges {
        if let Some(last) = merged.last_mut() {
            if start < last.1 {
                last.1 = last.1.max(end);
                continue;
            }
        }
        merged.push((start, end));
    }

    merged
        .into_iter()
        .map(|(start, end)| HighlightSpan {
            start,
            len: end - start,
            text: original[start..end].iter().collect(),
        })
        .collect()
}

/// Pick the excerpt window start: for each match, a window of
/// ±`WINDOW_RADIUS_CHARS` around it is scored by how many matches it covers;
/// the densest window wins, earliest on ties.
fn best_window_start(spans: &[HighlightSpan]) -> usize {
    let mut best_start = 0;
    let mut best_count = 0;

    for span in spans {
        let win_start = span.start.saturating_sub(WINDOW_RADIUS_CHARS);
        let win_end = span.start + span.len + WINDOW_RADIUS_CHARS;
        let count = spans
            .iter()
            .filter(|s| s.start >= win_start && s.start < win_end)
            .count();
        if count > best_count {
            best_count = count;
            best_start = win_start;
        }
    }

    best_start
}

/// Build a bounded excerpt with matched substrings wrapped in
/// `<mark>`/`</mark>`. With no matches, falls back to the first `max_chars`
/// characters, appending an ellipsis if truncated.
pub fn build_excerpt(text: &str, spans: &[HighlightSpan], max_chars: usize) -> String {
    let chars: Vec<char> = text.chars().collect();

    if spans.is_empty() {
        let mut excerpt: String = chars.iter().take(max_chars).collect();
        if chars.len() > max_chars {
            excerpt.push(ELLIPSIS);
        }
        return excerpt;
    }

    let start = best_window_start(spans).min(chars.len());
    let end = (start + max_chars).min(chars.len());

    let mut excerpt = String::with_capacity(max_chars + 16);
    if start > 0 {
        excerpt.push(ELLIPSIS);
    }
    for (i, ch) in chars[start..end].iter().enumerate() {
        let pos = start + i;
        if spans.iter().any(|s| s.start == pos && s.start + s.len <= end) {
            excerpt.push_str(MARK_OPEN);
        }
        excerpt.push(*ch);
        if spans.iter().any(|s| s.start + s.len == pos + 1 && s.start >= start) {
            excerpt.push_str(MARK_CLOSE);
        }
    }
    if end < chars.len() {
        excerpt.push(ELLIPSIS);
    }

    excerpt
}
