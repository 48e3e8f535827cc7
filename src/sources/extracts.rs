//! Snapshot-based sources: extracts, flashcards, categories, tags.
//!
//! These stores are small and fully in memory, so one aggregator covers all
//! of them: take a snapshot, filter to the aggregator's kind, and run each
//! item through the shared match pipeline. Content (extract text, card
//! front/back) is available synchronously, so there is no lazy fetch path
//! here.

use std::sync::Arc;

use async_trait::async_trait;

use crate::interface::{ResultKind, SearchResult};

use super::{
    build_result, passes_filters, rank_and_cap, ItemSource, SearchContext, SourceAggregator,
    SourceError,
};

pub struct SnapshotAggregator {
    source: Arc<dyn ItemSource>,
    kind: ResultKind,
    name: &'static str,
}

impl SnapshotAggregator {
    pub fn extracts(source: Arc<dyn ItemSource>) -> Self {
        Self { source, kind: ResultKind::Extract, name: "extracts" }
    }

    pub fn flashcards(source: Arc<dyn ItemSource>) -> Self {
        Self { source, kind: ResultKind::Flashcard, name: "flashcards" }
    }

    pub fn categories(source: Arc<dyn ItemSource>) -> Self {
        Self { source, kind: ResultKind::Category, name: "categories" }
    }

    pub fn tags(source: Arc<dyn ItemSource>) -> Self {
        Self { source, kind: ResultKind::Tag, name: "tags" }
    }
}

#[async_trait]
impl SourceAggregator for SnapshotAggregator {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn search(&self, ctx: &SearchContext) -> Result<Vec<SearchResult>, SourceError> {
        if !ctx.query.filters.allows_kind(self.kind) {
            return Ok(Vec::new());
        }

        let items = self.source.snapshot().await?;
        let mut results = Vec::new();

        for item in items.into_iter().take(ctx.caps.max_items) {
            if ctx.cancel.is_cancelled() {
                break;
            }
            if item.kind != self.kind || !passes_filters(&item, &ctx.query) {
                continue;
            }
            if let Some(result) = build_result(
                &item,
                item.content.as_deref(),
                false,
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
