//! The search session: debounce, generations, fan-out, commit.
//!
//! Every keystroke becomes a *generation*. Starting a generation cancels the
//! previous one through its `CancellationToken`, then waits out the debounce
//! window before touching any source. Sources run concurrently; a failing
//! source logs and contributes nothing. Results commit only if the
//! generation is still the newest, so a slow old search can never overwrite
//! a fresh one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::fuzzy::FuzzyMatcher;
use crate::history::HistoryStore;
use crate::interface::{SearchError, SearchResult};
use crate::query::SearchQuery;
use crate::sources::{FetchBudget, ScanCaps, SearchContext, SourceAggregator};

/// Default debounce window between input and source fan-out.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Transcript fetches allowed per query in each mode.
pub const FULL_FETCH_BUDGET: usize = 5;
pub const CONSTRAINED_FETCH_BUDGET: usize = 2;

/// How aggressively a query may reach into slow content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Normal interactive operation.
    Full,
    /// Reduced fetch budget, for low-power or metered conditions.
    Constrained,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub debounce: Duration,
    pub caps: ScanCaps,
    pub mode: ExecutionMode,
    pub excerpt_max_chars: usize,
    pub fuzzy_max_distance: u8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            caps: ScanCaps::default(),
            mode: ExecutionMode::Full,
            excerpt_max_chars: crate::highlight::EXCERPT_MAX_CHARS,
            fuzzy_max_distance: crate::fuzzy::DEFAULT_MAX_DISTANCE,
        }
    }
}

impl EngineConfig {
    fn fetch_budget(&self) -> usize {
        match self.mode {
            ExecutionMode::Full => FULL_FETCH_BUDGET,
            ExecutionMode::Constrained => CONSTRAINED_FETCH_BUDGET,
        }
    }
}

pub struct SearchEngine {
    config: EngineConfig,
    sources: Vec<Arc<dyn SourceAggregator>>,
    history: Option<Arc<HistoryStore>>,
    generation: AtomicU64,
    active: Mutex<CancellationToken>,
    committed: RwLock<(u64, Vec<SearchResult>)>,
}

impl SearchEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            sources: Vec::new(),
            history: None,
            generation: AtomicU64::new(0),
            active: Mutex::new(CancellationToken::new()),
            committed: RwLock::new((0, Vec::new())),
        }
    }

    pub fn add_source(&mut self, source: Arc<dyn SourceAggregator>) {
        self.sources.push(source);
    }

    pub fn set_history(&mut self, history: Arc<HistoryStore>) {
        self.history = Some(history);
    }

    /// Handle one input edit. Debounces, then fans out to all sources and
    /// returns the merged ranked results. Returns `Err(Cancelled)` when a
    /// newer edit superseded this one at any point.
    pub async fn on_input(&self, raw: &str) -> Result<Vec<SearchResult>, SearchError> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let token = CancellationToken::new();
        {
            let mut active = self.active.lock();
            active.cancel();
            *active = token.clone();
        }

        let trimmed = raw.trim().to_string();
        if trimmed.is_empty() {
            // Empty input clears results immediately, skipping debounce and
            // sources entirely.
            self.commit(generation, Vec::new());
            return Ok(Vec::new());
        }

        tokio::select! {
            _ = token.cancelled() => return Err(SearchError::Cancelled),
            _ = tokio::time::sleep(self.config.debounce) => {}
        }

        let results = self.run_generation(&trimmed, &token).await;
        if token.is_cancelled() || !self.commit(generation, results.clone()) {
            return Err(SearchError::Cancelled);
        }

        self.record_history(trimmed, results.len() as u32);
        Ok(results)
    }

    async fn run_generation(&self, raw: &str, token: &CancellationToken) -> Vec<SearchResult> {
        let ctx = SearchContext {
            query: SearchQuery::parse(raw),
            caps: self.config.caps,
            fuzzy: FuzzyMatcher::new(self.config.fuzzy_max_distance),
            excerpt_max_chars: self.config.excerpt_max_chars,
            fetch_budget: FetchBudget::new(self.config.fetch_budget()),
            cancel: token.clone(),
        };
        debug!(query = %raw, terms = ctx.query.terms.len(), "running search generation");

        let searches = self.sources.iter().map(|source| {
            let source = source.clone();
            let ctx = &ctx;
            async move {
                match source.search(ctx).await {
                    Ok(results) => results,
                    Err(e) => {
                        warn!(source = source.name(), error = %e, "source failed, degrading");
                        Vec::new()
                    }
                }
            }
        });

        let mut merged: Vec<SearchResult> =
            join_all(searches).await.into_iter().flatten().collect();
        merged.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.title.cmp(&b.title))
        });
        merged
    }

    /// Store results for `generation` unless a newer generation exists.
    fn commit(&self, generation: u64, results: Vec<SearchResult>) -> bool {
        if generation != self.generation.load(Ordering::SeqCst) {
            return false;
        }
        let mut committed = self.committed.write();
        if generation < committed.0 {
            return false;
        }
        *committed = (generation, results);
        true
    }

    /// Latest committed results.
    pub fn visible_results(&self) -> Vec<SearchResult> {
        self.committed.read().1.clone()
    }

    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Cancel whatever generation is in flight.
    pub fn cancel_active(&self) {
        self.active.lock().cancel();
    }

    pub fn suggestions(&self, prefix: &str, limit: usize) -> Result<Vec<String>, SearchError> {
        match &self.history {
            Some(history) => Ok(history.suggestions(prefix, limit)?),
            None => Ok(Vec::new()),
        }
    }

    fn record_history(&self, query: String, result_count: u32) {
        let Some(history) = self.history.clone() else { return };
        // Off the query path; a broken store only produces a log line.
        tokio::task::spawn_blocking(move || {
            if let Err(e) = history.append(&query, result_count) {
                warn!(error = %e, "failed to record search history");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::{ResultKind, ResultMetadata};
    use crate::sources::SourceError;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    struct FixedSource {
        results: Vec<SearchResult>,
        calls: AtomicUsize,
        delay: Duration,
    }

    impl FixedSource {
        fn new(results: Vec<SearchResult>) -> Self {
            Self { results, calls: AtomicUsize::new(0), delay: Duration::ZERO }
        }
    }

    #[async_trait]
    impl SourceAggregator for FixedSource {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn search(&self, ctx: &SearchContext) -> Result<Vec<SearchResult>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::select! {
                    _ = ctx.cancel.cancelled() => return Ok(Vec::new()),
                    _ = tokio::time::sleep(self.delay) => {}
                }
            }
            Ok(self.results.clone())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl SourceAggregator for FailingSource {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn search(&self, _ctx: &SearchContext) -> Result<Vec<SearchResult>, SourceError> {
            Err(SourceError::Unavailable("store offline".into()))
        }
    }

    fn result(id: &str, score: f64) -> SearchResult {
        SearchResult {
            id: id.to_string(),
            kind: ResultKind::Document,
            title: id.to_string(),
            excerpt: None,
            highlights: vec![],
            score,
            metadata: ResultMetadata::Document {
                document_id: id.to_string(),
                tags: vec![],
                category: None,
                transcript_match: false,
            },
        }
    }

    fn engine_with(sources: Vec<Arc<dyn SourceAggregator>>) -> Arc<SearchEngine> {
        let mut engine = SearchEngine::new(EngineConfig::default());
        for source in sources {
            engine.add_source(source);
        }
        Arc::new(engine)
    }

    #[tokio::test(start_paused = true)]
    async fn test_results_merged_and_sorted() {
        let engine = engine_with(vec![
            Arc::new(FixedSource::new(vec![result("low", 0.2)])),
            Arc::new(FixedSource::new(vec![result("high", 0.9)])),
        ]);
        let results = engine.on_input("anything").await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "high");
        assert_eq!(engine.visible_results().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_input_bypasses_sources() {
        let source = Arc::new(FixedSource::new(vec![result("a", 0.5)]));
        let engine = engine_with(vec![source.clone()]);
        engine.on_input("hello").await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        let results = engine.on_input("   ").await.unwrap();
        assert!(results.is_empty());
        assert!(engine.visible_results().is_empty());
        // No extra source call for the empty edit.
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_edits_coalesce_to_one_search() {
        let source = Arc::new(FixedSource::new(vec![result("a", 0.5)]));
        let engine = engine_with(vec![source.clone()]);

        let first = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.on_input("m").await })
        };
        tokio::task::yield_now().await;
        let second = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.on_input("ma").await })
        };
        tokio::task::yield_now().await;

        let final_results = engine.on_input("mac").await.unwrap();
        assert_eq!(final_results.len(), 1);

        assert!(matches!(first.await.unwrap(), Err(SearchError::Cancelled)));
        assert!(matches!(second.await.unwrap(), Err(SearchError::Cancelled)));
        // Only the surviving edit reached the source.
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_old_generation_never_overwrites_new() {
        let slow = Arc::new(FixedSource {
            results: vec![result("stale", 0.9)],
            calls: AtomicUsize::new(0),
            delay: Duration::from_secs(5),
        });
        let engine = engine_with(vec![slow]);

        let old = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.on_input("first").await })
        };
        // Let the old generation get past its debounce and into the slow
        // source before the new edit lands.
        tokio::time::sleep(Duration::from_millis(400)).await;

        let fresh = engine.on_input("").await.unwrap();
        assert!(fresh.is_empty());

        assert!(matches!(old.await.unwrap(), Err(SearchError::Cancelled)));
        assert!(engine.visible_results().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_source_degrades_gracefully() {
        let engine = engine_with(vec![
            Arc::new(FailingSource),
            Arc::new(FixedSource::new(vec![result("ok", 0.5)])),
        ]);
        let results = engine.on_input("query").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "ok");
    }

    #[tokio::test]
    async fn test_history_recorded_after_commit() {
        let history = Arc::new(HistoryStore::open_in_memory().unwrap());
        let config = EngineConfig { debounce: Duration::from_millis(1), ..Default::default() };
        let mut engine = SearchEngine::new(config);
        engine.add_source(Arc::new(FixedSource::new(vec![result("a", 0.5)])));
        engine.set_history(history.clone());
        let engine = Arc::new(engine);

        engine.on_input("machine learning").await.unwrap();
        // The append runs on a blocking task; give it a moment.
        for _ in 0..100 {
            if !history.recent(10).unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let recent = history.recent(10).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].query, "machine learning");
        assert_eq!(recent[0].result_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_suggestions_come_from_history() {
        let history = Arc::new(HistoryStore::open_in_memory().unwrap());
        history.append("machine learning", 4).unwrap();
        let mut engine = SearchEngine::new(EngineConfig::default());
        engine.set_history(history);
        let got = engine.suggestions("mach", 5).unwrap();
        assert_eq!(got, vec!["machine learning".to_string()]);
    }

    #[test]
    fn test_mode_budgets() {
        let full = EngineConfig::default();
        assert_eq!(full.fetch_budget(), FULL_FETCH_BUDGET);
        let constrained = EngineConfig { mode: ExecutionMode::Constrained, ..full };
        assert_eq!(constrained.fetch_budget(), CONSTRAINED_FETCH_BUDGET);
    }
}
