//! Public interface types for the search surface.
//!
//! These are the envelope shapes the app's frontend consumes (camelCase on
//! the wire). One uniform `SearchResult` carries every result kind so the
//! merged list can be ranked and sorted as a whole; kind-specific fields live
//! in the tagged `ResultMetadata` union.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// ENUMS
// ═══════════════════════════════════════════════════════════════════════════════

/// The kind of item a search result refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResultKind {
    Document,
    Extract,
    Command,
    Flashcard,
    Category,
    Tag,
}

impl ResultKind {
    /// Parse a `type:` filter token. Unknown values yield `None` (the token
    /// is then treated as free text).
    pub fn parse_filter(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "document" | "doc" => Some(ResultKind::Document),
            "extract" => Some(ResultKind::Extract),
            "command" => Some(ResultKind::Command),
            "flashcard" | "card" => Some(ResultKind::Flashcard),
            "category" => Some(ResultKind::Category),
            "tag" => Some(ResultKind::Tag),
            _ => None,
        }
    }
}

/// Kind-specific result payload.
///
/// A command result carries an opaque command id resolved against the
/// registry at selection time — never a live action value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ResultMetadata {
    #[serde(rename_all = "camelCase")]
    Document {
        document_id: String,
        tags: Vec<String>,
        category: Option<String>,
        /// Whether the content match came from a lazily fetched transcript.
        transcript_match: bool,
    },
    #[serde(rename_all = "camelCase")]
    Extract {
        extract_id: String,
        document_id: Option<String>,
        tags: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    Flashcard {
        card_id: String,
        document_id: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Command { command_id: String },
    #[serde(rename_all = "camelCase")]
    Category { name: String },
    #[serde(rename_all = "camelCase")]
    Tag { name: String },
}

// ═══════════════════════════════════════════════════════════════════════════════
// RECORDS
// ═══════════════════════════════════════════════════════════════════════════════

/// One case-insensitive term occurrence in a title or content string.
/// Offsets and lengths are in characters, not bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightSpan {
    pub start: usize,
    pub len: usize,
    /// The matched substring as it appears in the original text.
    pub text: String,
}

/// A single ranked search result.
///
/// Invariants: `score` is in [0, 1]; `excerpt` is present only when a
/// content (not just title) match occurred.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub id: String,
    pub kind: ResultKind,
    pub title: String,
    pub excerpt: Option<String>,
    pub highlights: Vec<HighlightSpan>,
    pub score: f64,
    pub metadata: ResultMetadata,
}

/// One entry in the query history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub query: String,
    pub timestamp: DateTime<Utc>,
    pub result_count: u32,
}

/// A named, persisted search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedSearch {
    pub id: i64,
    pub name: String,
    pub query: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

/// Error type for search operations.
///
/// Source failures never surface here — a failing source degrades to zero
/// results inside its generation. These variants cover the persistence layer
/// and explicit cancellation.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("history error: {0}")]
    History(String),
    #[error("source error: {0}")]
    Source(String),
    #[error("operation cancelled")]
    Cancelled,
}

impl From<crate::history::HistoryError> for SearchError {
    fn from(e: crate::history::HistoryError) -> Self {
        SearchError::History(e.to_string())
    }
}

impl From<crate::sources::SourceError> for SearchError {
    fn from(e: crate::sources::SourceError) -> Self {
        SearchError::Source(e.to_string())
    }
}
