//! Unified relevance search across an app's documents, extracts, flashcards,
//! commands, categories, and tags.
//!
//! Layering, bottom to top:
//! - [`query`]: raw input to normalized terms, operators, and filters
//! - [`fuzzy`], [`scoring`], [`highlight`]: the matching and ranking passes
//! - [`sources`]: per-store aggregators behind one trait, with caps, a lazy
//!   content cache, and a per-query fetch budget
//! - [`session`]: debounced generations fanning out to all sources, with
//!   commit-if-current semantics so stale results never surface
//! - [`indexer`]: idle-time cache warming
//! - [`history`]: SQLite-backed query history and saved searches

pub mod fuzzy;
pub mod highlight;
pub mod history;
pub mod indexer;
pub mod interface;
pub mod query;
pub mod scoring;
mod session;
pub mod sources;

pub use interface::{
    HighlightSpan, HistoryEntry, ResultKind, ResultMetadata, SavedSearch, SearchError,
    SearchResult,
};
pub use session::{
    EngineConfig, ExecutionMode, SearchEngine, CONSTRAINED_FETCH_BUDGET, DEFAULT_DEBOUNCE,
    FULL_FETCH_BUDGET,
};
