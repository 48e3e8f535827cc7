//! Background transcript prefetcher.
//!
//! Walks the document list sequentially during idle time and warms the
//! shared content cache, so later queries hit cached transcripts instead of
//! spending their fetch budget. Strictly one fetch at a time, cancellable
//! between items; a fetch that completes after cancellation is discarded
//! rather than cached.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::interface::ResultKind;
use crate::sources::{ContentCache, ItemSource, SourceError};

pub struct BackgroundIndexer {
    source: Arc<dyn ItemSource>,
    cache: Arc<ContentCache>,
    /// Ids this indexer has already tried, successful or not. Failed fetches
    /// are not retried within the indexer's lifetime.
    attempted: Mutex<HashSet<String>>,
    token: Mutex<CancellationToken>,
}

impl BackgroundIndexer {
    pub fn new(source: Arc<dyn ItemSource>, cache: Arc<ContentCache>) -> Self {
        Self {
            source,
            cache,
            attempted: Mutex::new(HashSet::new()),
            token: Mutex::new(CancellationToken::new()),
        }
    }

    /// One indexing sweep over the current document snapshot. Returns how
    /// many transcripts were newly cached. Safe to call repeatedly; items
    /// already cached or already attempted are skipped.
    pub async fn run(&self) -> Result<usize, SourceError> {
        let token = {
            let mut guard = self.token.lock();
            *guard = CancellationToken::new();
            guard.clone()
        };

        let items = self.source.snapshot().await?;
        let mut cached = 0usize;

        for item in items {
            if token.is_cancelled() {
                debug!(cached, "indexing sweep cancelled");
                break;
            }
            if item.kind != ResultKind::Document
                || item.content.is_some()
                || self.cache.contains(&item.id)
            {
                continue;
            }
            if !self.attempted.lock().insert(item.id.clone()) {
                continue;
            }

            match self.source.fetch_content(&item.id).await {
                // A cancel that lands mid-fetch discards the result; the
                // attempted mark stays so the next sweep moves on.
                Ok(Some(text)) if !token.is_cancelled() => {
                    self.cache.put(&item.id, text);
                    cached += 1;
                }
                Ok(_) => {}
                Err(e) => {
                    debug!(document = %item.id, error = %e, "indexer fetch failed");
                }
            }
        }

        info!(cached, "indexing sweep finished");
        Ok(cached)
    }

    /// Cancel the in-progress sweep, if any.
    pub fn cancel(&self) {
        self.token.lock().cancel();
    }
}
