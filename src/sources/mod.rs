//! Source aggregators and their shared plumbing.
//!
//! Each aggregator adapts one backing store (documents, extracts, flashcards,
//! commands) to the uniform result shape. Aggregators run concurrently per
//! generation; a failing aggregator degrades to zero results for that source
//! and never fails the merged search.
//!
//! Shared here: the `ItemSource` data access trait, scan caps, the per-query
//! content fetch budget, the LRU content cache, and the filter/match/score
//! pipeline every snapshot-based aggregator funnels through.

pub mod commands;
pub mod documents;
pub mod extracts;

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lru::LruCache;
use parking_lot::Mutex;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::fuzzy::FuzzyMatcher;
use crate::highlight;
use crate::interface::{ResultKind, ResultMetadata, SearchResult};
use crate::query::SearchQuery;
use crate::scoring;

/// Per-source scan ceiling. Sources with more items than this only have their
/// most recent `max_items` considered.
pub const DEFAULT_MAX_ITEMS: usize = 500;

/// Per-source result ceiling after ranking.
pub const DEFAULT_MAX_RESULTS: usize = 50;

/// Default capacity of the transcript content cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source unavailable: {0}")]
    Unavailable(String),
    #[error("content fetch failed for {id}: {reason}")]
    Fetch { id: String, reason: String },
}

/// A raw item as a backing store exposes it, before matching.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceItem {
    pub id: String,
    pub kind: ResultKind,
    pub title: String,
    /// Content available synchronously at scan time. `None` for items whose
    /// content must be fetched lazily (document transcripts).
    pub content: Option<String>,
    pub tags: Vec<String>,
    pub category: Option<String>,
    pub document_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Data access seam for a backing store. Implemented over the app's stores in
/// production and over in-memory fixtures in tests.
#[async_trait]
pub trait ItemSource: Send + Sync {
    /// Current items, most recent first. Aggregators cap how many they scan.
    async fn snapshot(&self) -> Result<Vec<SourceItem>, SourceError>;

    /// Lazily fetch the full content for one item (document transcript).
    /// `Ok(None)` means the item has no content.
    async fn fetch_content(&self, id: &str) -> Result<Option<String>, SourceError>;
}

/// Everything an aggregator needs for one generation.
pub struct SearchContext {
    pub query: SearchQuery,
    pub caps: ScanCaps,
    pub fuzzy: FuzzyMatcher,
    pub excerpt_max_chars: usize,
    /// Shared across aggregators: total lazy content fetches for this query.
    pub fetch_budget: FetchBudget,
    pub cancel: CancellationToken,
}

/// One source's contribution to a generation.
#[async_trait]
pub trait SourceAggregator: Send + Sync {
    /// Short name for logging.
    fn name(&self) -> &'static str;

    async fn search(&self, ctx: &SearchContext) -> Result<Vec<SearchResult>, SourceError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanCaps {
    pub max_items: usize,
    pub max_results: usize,
}

impl Default for ScanCaps {
    fn default() -> Self {
        Self { max_items: DEFAULT_MAX_ITEMS, max_results: DEFAULT_MAX_RESULTS }
    }
}

/// Decrementing counter shared by aggregators within one query. Exhausted
/// budget skips further lazy fetches rather than queueing them.
#[derive(Debug)]
pub struct FetchBudget(AtomicUsize);

impl FetchBudget {
    pub fn new(limit: usize) -> Self {
        Self(AtomicUsize::new(limit))
    }

    /// Claim one fetch slot. Returns false once the budget is exhausted.
    pub fn try_take(&self) -> bool {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
    }

    pub fn remaining(&self) -> usize {
        self.0.load(Ordering::Acquire)
    }
}

/// Thread-safe LRU cache of lazily fetched content, keyed by item id.
/// Shared between the query path and the background indexer.
pub struct ContentCache {
    inner: Mutex<LruCache<String, String>>,
}

impl ContentCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self { inner: Mutex::new(LruCache::new(capacity)) }
    }

    pub fn get(&self, id: &str) -> Option<String> {
        self.inner.lock().get(id).cloned()
    }

    pub fn put(&self, id: &str, content: String) {
        self.inner.lock().put(id.to_string(), content);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.lock().contains(id)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl Default for ContentCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

// ─── shared match pipeline ───────────────────────────────────────────────────

/// Structural filters that can be checked before any content is fetched.
pub fn passes_filters(item: &SourceItem, query: &SearchQuery) -> bool {
    let filters = &query.filters;
    if !filters.allows_kind(item.kind) {
        return false;
    }
    if !filters.tags.is_empty() {
        let item_tags: Vec<String> = item.tags.iter().map(|t| t.to_lowercase()).collect();
        if !filters.tags.iter().all(|t| item_tags.contains(t)) {
            return false;
        }
    }
    if !filters.categories.is_empty() {
        let Some(category) = item.category.as_deref().map(str::to_lowercase) else {
            return false;
        };
        if !filters.categories.contains(&category) {
            return false;
        }
    }
    if let Some(after) = filters.after {
        match item.created_at {
            Some(created) if created >= after => {}
            _ => return false,
        }
    }
    if let Some(before) = filters.before {
        match item.created_at {
            Some(created) if created < before => {}
            _ => return false,
        }
    }
    true
}

/// Whether the query permits scanning item content at all. Explicit
/// `content:` terms override the meaningful-term gate.
pub fn content_allowed(query: &SearchQuery) -> bool {
    query.content_search || !query.filters.content_terms.is_empty()
}

/// Title match: substring first, then wildcard word prefixes, then the fuzzy
/// secondary pass over individual title words.
pub fn title_matches(title: &str, query: &SearchQuery, fuzzy: &FuzzyMatcher) -> bool {
    let lower = title.to_lowercase();
    let terms = query.title_terms();
    if terms.iter().any(|t| lower.contains(t.as_str())) {
        return true;
    }
    for stem in query.wildcard_stems() {
        if lower.split_whitespace().any(|w| w.starts_with(stem.as_str())) {
            return true;
        }
    }
    // Fuzzy is a secondary pass, and only for queries with real signal:
    // fallback (title-only) queries match by substring alone.
    if !query.content_search {
        return false;
    }
    for term in &terms {
        for word in lower.split_whitespace() {
            if fuzzy.matches(term, word).is_some() {
                return true;
            }
        }
    }
    false
}

fn content_matches(content: &str, query: &SearchQuery) -> bool {
    let lower = content.to_lowercase();
    query.content_terms().iter().any(|t| lower.contains(t.as_str()))
        || query
            .wildcard_stems()
            .iter()
            .any(|s| lower.split_whitespace().any(|w| w.starts_with(s.as_str())))
}

fn violates_not(query: &SearchQuery, title_lower: &str, content_lower: Option<&str>) -> bool {
    query.not_terms().iter().any(|t| {
        title_lower.contains(t) || content_lower.map(|c| c.contains(t)).unwrap_or(false)
    })
}

/// Normalized score for a pure-filter query (no terms to score against).
fn filter_only_score(kind: ResultKind) -> f64 {
    (25.0 * scoring::kind_weight(kind)).clamp(0.0, scoring::SCORE_CEILING) / scoring::SCORE_CEILING
}

fn metadata_for(item: &SourceItem, transcript_match: bool) -> ResultMetadata {
    match item.kind {
        ResultKind::Document => ResultMetadata::Document {
            document_id: item.id.clone(),
            tags: item.tags.clone(),
            category: item.category.clone(),
            transcript_match,
        },
        ResultKind::Extract => ResultMetadata::Extract {
            extract_id: item.id.clone(),
            document_id: item.document_id.clone(),
            tags: item.tags.clone(),
        },
        ResultKind::Flashcard => ResultMetadata::Flashcard {
            card_id: item.id.clone(),
            document_id: item.document_id.clone(),
        },
        ResultKind::Command => ResultMetadata::Command { command_id: item.id.clone() },
        ResultKind::Category => ResultMetadata::Category { name: item.title.clone() },
        ResultKind::Tag => ResultMetadata::Tag { name: item.title.clone() },
    }
}

/// Run one item through the match pipeline. `content` is whatever content is
/// in hand (sync or fetched); `transcript_match` marks lazily fetched content.
/// Returns `None` when the item does not match.
pub fn build_result(
    item: &SourceItem,
    content: Option<&str>,
    transcript_match: bool,
    query: &SearchQuery,
    fuzzy: &FuzzyMatcher,
    excerpt_max_chars: usize,
) -> Option<SearchResult> {
    let title_lower = item.title.to_lowercase();
    let content_lower = content.map(str::to_lowercase);

    if violates_not(query, &title_lower, content_lower.as_deref()) {
        return None;
    }

    // Field-scoped terms are hard requirements.
    if !query.filters.title_terms.iter().all(|t| title_lower.contains(t.as_str())) {
        return None;
    }
    if !query.filters.content_terms.is_empty() {
        let Some(ref lower) = content_lower else { return None };
        if !query.filters.content_terms.iter().all(|t| lower.contains(t.as_str())) {
            return None;
        }
    }

    let scoring_terms = query.scoring_terms();
    let title_hit = title_matches(&item.title, query, fuzzy);
    let content_hit = content_allowed(query)
        && content.map(|c| content_matches(c, query)).unwrap_or(false);

    let filter_only = scoring_terms.is_empty();
    if !filter_only && !title_hit && !content_hit {
        return None;
    }

    let score = if filter_only {
        filter_only_score(item.kind)
    } else {
        scoring::score(item.kind, &item.title, content, &scoring_terms)
    };

    let (excerpt, highlights) = if content_hit {
        let text = content.unwrap_or_default();
        let spans = highlight::find_occurrences(text, &scoring_terms);
        let excerpt = highlight::build_excerpt(text, &spans, excerpt_max_chars);
        (Some(excerpt), spans)
    } else {
        let spans = highlight::find_occurrences(&item.title, &scoring_terms);
        (None, spans)
    };

    Some(SearchResult {
        id: item.id.clone(),
        kind: item.kind,
        title: item.title.clone(),
        excerpt,
        highlights,
        score,
        metadata: metadata_for(item, transcript_match && content_hit),
    })
}

/// Rank and cap one source's matches: score descending, title ascending on
/// ties for a stable order.
pub fn rank_and_cap(mut results: Vec<SearchResult>, max_results: usize) -> Vec<SearchResult> {
    results.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.title.cmp(&b.title))
    });
    results.truncate(max_results);
    results
}
