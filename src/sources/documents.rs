//! Document source with lazy transcript fetching.
//!
//! Document metadata (title, tags, category) is cheap and scanned directly.
//! Transcript text is expensive: it is fetched only when the query permits
//! content search, the title alone did not match, the transcript is not
//! already cached, the per-query fetch budget has a slot left, and no other
//! task is fetching the same transcript. Fetched transcripts land in the
//! shared LRU cache so repeat queries and the background indexer both
//! benefit.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use crate::interface::{ResultKind, SearchResult};

use super::{
    build_result, content_allowed, passes_filters, rank_and_cap, title_matches, ContentCache,
    ItemSource, SearchContext, SourceAggregator, SourceError, SourceItem,
};

pub struct DocumentAggregator {
    source: Arc<dyn ItemSource>,
    transcripts: Arc<ContentCache>,
    /// Ids with a fetch already underway somewhere, so concurrent generations
    /// never issue duplicate fetches for the same transcript.
    in_flight: Mutex<HashSet<String>>,
}

impl DocumentAggregator {
    pub fn new(source: Arc<dyn ItemSource>, transcripts: Arc<ContentCache>) -> Self {
        Self { source, transcripts, in_flight: Mutex::new(HashSet::new()) }
    }

    /// Transcript text for one document, via cache or a budgeted fetch.
    /// Every miss path returns `None` rather than blocking or erroring: a
    /// failed fetch just means this document matches on title only.
    async fn transcript_for(&self, item: &SourceItem, ctx: &SearchContext) -> Option<String> {
        if let Some(cached) = self.transcripts.get(&item.id) {
            return Some(cached);
        }
        // Win the in-flight slot before spending budget: a deduplicated skip
        // must leave the budget intact for other documents in this query.
        if !self.in_flight.lock().insert(item.id.clone()) {
            return None;
        }
        if !ctx.fetch_budget.try_take() {
            self.in_flight.lock().remove(&item.id);
            return None;
        }

        let fetched = self.source.fetch_content(&item.id).await;
        self.in_flight.lock().remove(&item.id);

        match fetched {
            Ok(Some(text)) => {
                self.transcripts.put(&item.id, text.clone());
                Some(text)
            }
            Ok(None) => None,
            Err(e) => {
                debug!(document = %item.id, error = %e, "transcript fetch failed");
                None
            }
        }
    }
}

#[async_trait]
impl SourceAggregator for DocumentAggregator {
    fn name(&self) -> &'static str {
        "documents"
    }

    async fn search(&self, ctx: &SearchContext) -> Result<Vec<SearchResult>, SourceError> {
        if !ctx.query.filters.allows_kind(ResultKind::Document) {
            return Ok(Vec::new());
        }

        let items = self.source.snapshot().await?;
        let mut results = Vec::new();

        for item in items.into_iter().take(ctx.caps.max_items) {
            if ctx.cancel.is_cancelled() {
                break;
            }
            if item.kind != ResultKind::Document || !passes_filters(&item, &ctx.query) {
                continue;
            }

            let title_hit = title_matches(&item.title, &ctx.query, &ctx.fuzzy);

            // Fetch the transcript only when the title alone cannot decide
            // the match and the query is allowed to look at content.
            let transcript = if content_allowed(&ctx.query) && !title_hit {
                self.transcript_for(&item, ctx).await
            } else if content_allowed(&ctx.query) {
                // Title already matched; use the transcript only if cached.
                self.transcripts.get(&item.id)
            } else {
                None
            };

            if let Some(result) = build_result(
                &item,
                transcript.as_deref(),
                transcript.is_some(),
                &ctx.query,
                &ctx.fuzzy,
                ctx.excerpt_max_chars,
            ) {
                results.push(result);
            }
        }

        Ok(rank_and_cap(results, ctx.caps.max_results))
    }
}
