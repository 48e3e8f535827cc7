//! Command palette source.
//!
//! Commands are an in-memory registry, matched synchronously on label and
//! keywords. They carry a fixed score and never produce an excerpt; the
//! result references the command by opaque id only, resolution back to an
//! action happens at selection time.

use async_trait::async_trait;

use crate::interface::{ResultKind, ResultMetadata, SearchResult};
use crate::scoring::COMMAND_SCORE;

use super::{SearchContext, SourceAggregator, SourceError};

/// One registered command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandEntry {
    pub id: String,
    pub label: String,
    pub description: Option<String>,
    pub keywords: Vec<String>,
}

/// Provider of the current command set.
pub trait CommandRegistry: Send + Sync {
    fn commands(&self) -> Vec<CommandEntry>;
}

/// Static registry backed by a fixed list.
pub struct StaticCommands(pub Vec<CommandEntry>);

impl CommandRegistry for StaticCommands {
    fn commands(&self) -> Vec<CommandEntry> {
        self.0.clone()
    }
}

pub struct CommandAggregator<R> {
    registry: R,
}

impl<R: CommandRegistry> CommandAggregator<R> {
    pub fn new(registry: R) -> Self {
        Self { registry }
    }

    fn entry_matches(entry: &CommandEntry, ctx: &SearchContext) -> bool {
        let label = entry.label.to_lowercase();
        let terms = ctx.query.title_terms();
        if terms.is_empty() {
            return false;
        }
        for term in &terms {
            if label.contains(term.as_str()) {
                return true;
            }
            if entry.keywords.iter().any(|k| k.to_lowercase().contains(term.as_str())) {
                return true;
            }
            if entry
                .description
                .as_deref()
                .map(|d| d.to_lowercase().contains(term.as_str()))
                .unwrap_or(false)
            {
                return true;
            }
            if ctx.query.content_search
                && label
                    .split_whitespace()
                    .any(|w| ctx.fuzzy.matches(term, w).is_some())
            {
                return true;
            }
        }
        false
    }
}

#[async_trait]
impl<R: CommandRegistry> SourceAggregator for CommandAggregator<R> {
    fn name(&self) -> &'static str {
        "commands"
    }

    async fn search(&self, ctx: &SearchContext) -> Result<Vec<SearchResult>, SourceError> {
        if !ctx.query.filters.allows_kind(ResultKind::Command) {
            return Ok(Vec::new());
        }
        // Structural filters never apply to commands.
        if !ctx.query.filters.tags.is_empty()
            || !ctx.query.filters.categories.is_empty()
            || !ctx.query.filters.content_terms.is_empty()
        {
            return Ok(Vec::new());
        }

        let not_terms: Vec<String> =
            ctx.query.not_terms().iter().map(|t| t.to_string()).collect();

        let mut results = Vec::new();
        for entry in self.registry.commands().into_iter().take(ctx.caps.max_items) {
            if ctx.cancel.is_cancelled() {
                break;
            }
            let label_lower = entry.label.to_lowercase();
            if not_terms.iter().any(|t| label_lower.contains(t.as_str())) {
                continue;
            }
            if !Self::entry_matches(&entry, ctx) {
                continue;
            }
            results.push(SearchResult {
                id: entry.id.clone(),
                kind: ResultKind::Command,
                title: entry.label.clone(),
                excerpt: None,
                highlights: crate::highlight::find_occurrences(
                    &entry.label,
                    &ctx.query.title_terms(),
                ),
                score: COMMAND_SCORE,
                metadata: ResultMetadata::Command { command_id: entry.id },
            });
            if results.len() >= ctx.caps.max_results {
                break;
            }
        }
        Ok(results)
    }
}
