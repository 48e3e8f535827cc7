//! Query parsing and normalization.
//!
//! Two passes over the raw string: advanced filter tokens (`type:`, `tag:`,
//! `category:`, `title:`, `content:`, `before:`, `after:`) are stripped into
//! structured filters first, then the remaining free text is normalized into
//! terms, phrases, and operators.
//!
//! Normalization is deliberately conservative about what counts as a
//! *meaningful* term: stopwords and very short tokens restrict matching to
//! titles only, so cheap queries never trigger content scans.

use crate::interface::ResultKind;
use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Common words that carry no search signal on their own.
static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "an", "and", "are", "as", "at", "be", "been", "but", "by", "can",
        "could", "did", "do", "does", "for", "from", "had", "has", "have",
        "he", "her", "his", "how", "i", "if", "in", "into", "is", "it", "its",
        "just", "may", "me", "might", "my", "no", "not", "of", "on", "or",
        "our", "she", "should", "so", "some", "than", "that", "the", "their",
        "them", "then", "there", "they", "this", "to", "up", "was", "we",
        "were", "what", "when", "which", "who", "will", "with", "would",
        "you", "your",
    ]
    .into_iter()
    .collect()
});

/// Short domain acronyms that are meaningful despite being under 3 chars.
static SHORT_ACRONYMS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    ["ai", "ml", "3d", "2d", "ar", "vr", "ui", "ux", "js", "db", "os"]
        .into_iter()
        .collect()
});

const MIN_MEANINGFUL_CHARS: usize = 3;
const MIN_NUMERIC_CHARS: usize = 2;

/// Operator extracted from the free-text query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorKind {
    Not,
    Or,
    Phrase,
    Wildcard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOperator {
    pub kind: OperatorKind,
    pub value: String,
}

/// Structured filters parsed from the advanced inline syntax.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryFilters {
    pub kinds: Option<Vec<ResultKind>>,
    pub tags: Vec<String>,
    pub categories: Vec<String>,
    /// Terms that must appear in the title (`title:` tokens).
    pub title_terms: Vec<String>,
    /// Terms that must appear in the content (`content:` tokens).
    pub content_terms: Vec<String>,
    pub after: Option<DateTime<Utc>>,
    pub before: Option<DateTime<Utc>>,
}

impl QueryFilters {
    pub fn allows_kind(&self, kind: ResultKind) -> bool {
        match &self.kinds {
            Some(kinds) => kinds.contains(&kind),
            None => true,
        }
    }
}

/// A parsed, normalized query ready for source fan-out.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub raw: String,
    /// Normalized terms (meaningful terms, or the whole lowercased query as a
    /// single fallback term). Never contains empty strings.
    pub terms: Vec<String>,
    pub operators: Vec<SearchOperator>,
    pub filters: QueryFilters,
    /// Whether full content may be scanned. False when no meaningful term
    /// exists — matching is then restricted to titles.
    pub content_search: bool,
}

impl SearchQuery {
    pub fn parse(raw: &str) -> Self {
        let (filters, free_text) = parse_filters(raw);
        let (terms, operators, content_search) = normalize(&free_text);
        Self {
            raw: raw.to_string(),
            terms,
            operators,
            filters,
            content_search,
        }
    }

    /// Terms used for scoring and highlighting: free-text terms, field-scoped
    /// filter terms, and wildcard stems (so `mach*` matches rank by how often
    /// the stem occurs instead of all tying at zero).
    pub fn scoring_terms(&self) -> Vec<String> {
        let mut all = self.terms.clone();
        for t in self.filters.title_terms.iter().chain(&self.filters.content_terms) {
            if !all.contains(t) {
                all.push(t.clone());
            }
        }
        for stem in self.wildcard_stems() {
            if !all.contains(&stem) {
                all.push(stem);
            }
        }
        all
    }

    /// Terms matched against titles.
    pub fn title_terms(&self) -> Vec<String> {
        let mut all = self.terms.clone();
        for t in &self.filters.title_terms {
            if !all.contains(t) {
                all.push(t.clone());
            }
        }
        all
    }

    /// Terms matched against content.
    pub fn content_terms(&self) -> Vec<String> {
        let mut all = self.terms.clone();
        for t in &self.filters.content_terms {
            if !all.contains(t) {
                all.push(t.clone());
            }
        }
        all
    }

    /// Values of NOT operators (results containing these are excluded).
    pub fn not_terms(&self) -> Vec<&str> {
        self.operators
            .iter()
            .filter(|op| op.kind == OperatorKind::Not)
            .map(|op| op.value.as_str())
            .collect()
    }

    /// Wildcard stems (`mach*` → `mach`), matched as word prefixes.
    pub fn wildcard_stems(&self) -> Vec<String> {
        self.operators
            .iter()
            .filter(|op| op.kind == OperatorKind::Wildcard)
            .map(|op| op.value.trim_end_matches('*').to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// Strip recognized `field:value` tokens into structured filters.
/// Unrecognized values (bad dates, unknown types) silently fall through:
/// a malformed `before:` yields no date filter, an unknown `type:` value
/// drops the token rather than poisoning the free text.
fn parse_filters(raw: &str) -> (QueryFilters, String) {
    let mut filters = QueryFilters::default();
    let mut free = Vec::new();

    for token in raw.split_whitespace() {
        let Some((field, value)) = token.split_once(':') else {
            free.push(token);
            continue;
        };
        if value.is_empty() {
            free.push(token);
            continue;
        }
        match field.to_lowercase().as_str() {
            "type" => {
                if let Some(kind) = ResultKind::parse_filter(value) {
                    filters.kinds.get_or_insert_with(Vec::new).push(kind);
                }
            }
            "tag" => filters.tags.push(value.to_lowercase()),
            "category" => filters.categories.push(value.to_lowercase()),
            "title" => filters.title_terms.push(value.to_lowercase()),
            "content" => filters.content_terms.push(value.to_lowercase()),
            "after" => filters.after = parse_date(value),
            "before" => filters.before = parse_date(value),
            // Unknown field prefix — treat the whole token as free text
            // (URLs and timestamps legitimately contain colons).
            _ => free.push(token),
        }
    }

    (filters, free.join(" "))
}

/// Lenient date parsing for `before:`/`after:` values.
/// Malformed expressions resolve to no filter, never an error.
fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(value, "%Y/%m/%d"))
        .ok()?;
    let midnight = date.and_hms_opt(0, 0, 0)?;
    Some(DateTime::from_naive_utc_and_offset(midnight, Utc))
}

/// Normalize free text into (terms, operators, content_search).
fn normalize(text: &str) -> (Vec<String>, Vec<SearchOperator>, bool) {
    let mut operators = Vec::new();
    let mut candidates: Vec<String> = Vec::new();

    // Quoted phrases come out first, verbatim.
    let mut remainder = String::with_capacity(text.len());
    let mut rest = text;
    loop {
        let Some(open) = rest.find('"') else {
            remainder.push_str(rest);
            break;
        };
        remainder.push_str(&rest[..open]);
        let after_open = &rest[open + 1..];
        let Some(close) = after_open.find('"') else {
            // Unbalanced quote — keep the rest as plain text.
            remainder.push_str(after_open);
            break;
        };
        let phrase = after_open[..close].trim().to_lowercase();
        if !phrase.is_empty() {
            operators.push(SearchOperator { kind: OperatorKind::Phrase, value: phrase.clone() });
            candidates.push(phrase);
        }
        remainder.push(' ');
        rest = &after_open[close + 1..];
    }

    let mut negate_next = false;
    for token in remainder.split_whitespace() {
        match token {
            "AND" => continue,
            "OR" => {
                operators.push(SearchOperator { kind: OperatorKind::Or, value: String::new() });
                continue;
            }
            "NOT" => {
                negate_next = true;
                continue;
            }
            _ => {}
        }

        if let Some(rest) = token.strip_prefix('-') {
            let value = clean_token(rest);
            if !value.is_empty() {
                operators.push(SearchOperator { kind: OperatorKind::Not, value });
            }
            negate_next = false;
            continue;
        }

        // `+term` marks a required term; conjunction is already the default,
        // so the bare value joins the term list.
        let bare = token.strip_prefix('+').unwrap_or(token);

        if bare.contains('*') {
            let value = bare.to_lowercase();
            if value.trim_matches('*') != "" {
                operators.push(SearchOperator { kind: OperatorKind::Wildcard, value });
            }
            negate_next = false;
            continue;
        }

        let value = clean_token(bare);
        if value.is_empty() {
            continue;
        }
        if negate_next {
            operators.push(SearchOperator { kind: OperatorKind::Not, value });
            negate_next = false;
        } else {
            candidates.push(value);
        }
    }

    let mut terms: Vec<String> = Vec::new();
    for candidate in &candidates {
        if is_meaningful(candidate) && !terms.contains(candidate) {
            terms.push(candidate.clone());
        }
    }

    if !terms.is_empty() {
        return (terms, operators, true);
    }

    // No meaningful term: fall back to the whole lowercased query as one
    // term and restrict matching to titles (content search disabled).
    let fallback = text.trim().to_lowercase();
    let terms = if fallback.is_empty() { Vec::new() } else { vec![fallback] };
    (terms, operators, false)
}

/// Lowercase a token and trim surrounding punctuation.
fn clean_token(token: &str) -> String {
    token
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
}

/// Whether a term carries enough signal to justify content scanning.
fn is_meaningful(term: &str) -> bool {
    if term.contains(' ') {
        // Multi-word phrase: meaningful when at least one word is not a
        // stopword. An all-stopword phrase ("to be or not to be") is not.
        return term.split_whitespace().any(|w| !STOPWORDS.contains(w));
    }
    if term.chars().all(|c| c.is_ascii_digit()) {
        return term.len() >= MIN_NUMERIC_CHARS;
    }
    if STOPWORDS.contains(term) {
        return false;
    }
    if term.chars().count() >= MIN_MEANINGFUL_CHARS {
        return true;
    }
    SHORT_ACRONYMS.contains(term)
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── meaningful-term classification ───────────────────────────

    #[test]
    fn test_regular_word_is_meaningful() {
        assert!(is_meaningful("machine"));
        assert!(is_meaningful("cat"));
    }

    #[test]
    fn test_stopword_not_meaningful() {
        assert!(!is_meaningful("the"));
        assert!(!is_meaningful("with"));
    }

    #[test]
    fn test_short_acronym_allow_list() {
        assert!(is_meaningful("ai"));
        assert!(is_meaningful("3d"));
        assert!(!is_meaningful("zz"));
        assert!(!is_meaningful("q"));
    }

    #[test]
    fn test_numeric_tokens() {
        assert!(!is_meaningful("7"));
        assert!(is_meaningful("42"));
        assert!(is_meaningful("2024"));
    }

    #[test]
    fn test_phrase_with_non_stopword_is_meaningful() {
        assert!(is_meaningful("the machine"));
        assert!(!is_meaningful("to be or not"));
    }

    // ── normalization ────────────────────────────────────────────

    #[test]
    fn test_parse_basic_terms() {
        let q = SearchQuery::parse("machine learning");
        assert_eq!(q.terms, vec!["machine", "learning"]);
        assert!(q.content_search);
    }

    #[test]
    fn test_stopword_only_query_falls_back_to_title_search() {
        let q = SearchQuery::parse("the");
        assert_eq!(q.terms, vec!["the"]);
        assert!(!q.content_search);
    }

    #[test]
    fn test_short_acronym_query_is_meaningful() {
        let q = SearchQuery::parse("ai");
        assert_eq!(q.terms, vec!["ai"]);
        assert!(q.content_search);
    }

    #[test]
    fn test_quoted_phrase_extracted_verbatim() {
        let q = SearchQuery::parse("\"spaced repetition\" review");
        assert!(q.terms.contains(&"spaced repetition".to_string()));
        assert!(q.terms.contains(&"review".to_string()));
        assert!(q
            .operators
            .iter()
            .any(|op| op.kind == OperatorKind::Phrase && op.value == "spaced repetition"));
    }

    #[test]
    fn test_unbalanced_quote_treated_as_text() {
        let q = SearchQuery::parse("\"machine learning");
        assert_eq!(q.terms, vec!["machine", "learning"]);
    }

    #[test]
    fn test_minus_token_becomes_not_operator() {
        let q = SearchQuery::parse("rust -async");
        assert_eq!(q.terms, vec!["rust"]);
        assert_eq!(q.not_terms(), vec!["async"]);
    }

    #[test]
    fn test_reserved_word_not_negates_next_token() {
        let q = SearchQuery::parse("rust NOT async");
        assert_eq!(q.terms, vec!["rust"]);
        assert_eq!(q.not_terms(), vec!["async"]);
    }

    #[test]
    fn test_reserved_words_dropped_from_terms() {
        let q = SearchQuery::parse("cats AND dogs OR birds");
        assert_eq!(q.terms, vec!["cats", "dogs", "birds"]);
        assert!(q.operators.iter().any(|op| op.kind == OperatorKind::Or));
    }

    #[test]
    fn test_plus_prefix_stripped() {
        let q = SearchQuery::parse("+rust learning");
        assert_eq!(q.terms, vec!["rust", "learning"]);
    }

    #[test]
    fn test_wildcard_operator() {
        let q = SearchQuery::parse("mach* learning");
        assert_eq!(q.terms, vec!["learning"]);
        assert_eq!(q.wildcard_stems(), vec!["mach"]);
    }

    #[test]
    fn test_wildcard_stems_feed_scoring_terms() {
        let q = SearchQuery::parse("mach* learning");
        assert!(q.scoring_terms().contains(&"mach".to_string()));
        // Matching terms stay as-is, the stem is appended once.
        assert!(q.scoring_terms().contains(&"learning".to_string()));
    }

    #[test]
    fn test_terms_never_contain_empty_strings() {
        let q = SearchQuery::parse("  -  ++ \"\"  ... ");
        assert!(q.terms.iter().all(|t| !t.is_empty()));
        assert!(q.operators.iter().all(|op| op.kind == OperatorKind::Or || !op.value.is_empty()));
    }

    #[test]
    fn test_duplicate_terms_deduplicated() {
        let q = SearchQuery::parse("rust rust RUST");
        assert_eq!(q.terms, vec!["rust"]);
    }

    // ── advanced filter syntax ───────────────────────────────────

    #[test]
    fn test_type_filter_stripped_from_free_text() {
        let q = SearchQuery::parse("type:document rust");
        assert_eq!(q.filters.kinds, Some(vec![ResultKind::Document]));
        assert_eq!(q.terms, vec!["rust"]);
    }

    #[test]
    fn test_tag_and_category_filters() {
        let q = SearchQuery::parse("tag:Physics category:Science energy");
        assert_eq!(q.filters.tags, vec!["physics"]);
        assert_eq!(q.filters.categories, vec!["science"]);
        assert_eq!(q.terms, vec!["energy"]);
    }

    #[test]
    fn test_title_and_content_scoped_terms() {
        let q = SearchQuery::parse("title:intro content:gradient");
        assert_eq!(q.filters.title_terms, vec!["intro"]);
        assert_eq!(q.filters.content_terms, vec!["gradient"]);
        assert!(q.title_terms().contains(&"intro".to_string()));
        assert!(q.content_terms().contains(&"gradient".to_string()));
    }

    #[test]
    fn test_date_filters() {
        let q = SearchQuery::parse("after:2024-01-01 before:2024/06/30 notes");
        assert!(q.filters.after.is_some());
        assert!(q.filters.before.is_some());
        assert_eq!(q.terms, vec!["notes"]);
    }

    #[test]
    fn test_malformed_date_silently_ignored() {
        let q = SearchQuery::parse("before:notadate rust");
        assert!(q.filters.before.is_none());
        assert_eq!(q.terms, vec!["rust"]);
    }

    #[test]
    fn test_unknown_colon_token_kept_as_free_text() {
        let q = SearchQuery::parse("https://example.com");
        assert!(!q.terms.is_empty());
    }

    #[test]
    fn test_kind_filter_allows() {
        let q = SearchQuery::parse("type:document rust");
        assert!(q.filters.allows_kind(ResultKind::Document));
        assert!(!q.filters.allows_kind(ResultKind::Command));
        let unfiltered = SearchQuery::parse("rust");
        assert!(unfiltered.filters.allows_kind(ResultKind::Command));
    }
}
