//! Extension sources and the final truncation stage.
//!
//! Other systems may keep page creations somewhere the creation indexes do
//! not see, or may want to hide some of the rows found. They plug in by
//! implementing [`ExtensionSource`] and registering with an
//! [`ExtensionRegistry`].
//!
//! ```text
//! base rows ──▶ source 1 (per namespace) ──▶ source 2 ──▶ … ──▶ dedup + cap
//! ```
//!
//! Sources are untrusted with respect to the row cap, so [`finalize`]
//! re-applies it once, after every source has run.
//!
//! # Example
//!
//! ```rust
//! use anyhow::Result;
//! use async_trait::async_trait;
//! use mass_nuke::extension::{ExtensionRegistry, ExtensionSource, SourceFilter};
//! use mass_nuke::models::{ContentItem, ResultRow};
//!
//! pub struct ArchivedUploads;
//!
//! #[async_trait]
//! impl ExtensionSource for ArchivedUploads {
//!     fn name(&self) -> &str { "archived-uploads" }
//!
//!     async fn contribute(&self, filter: &SourceFilter, rows: &mut Vec<ResultRow>) -> Result<()> {
//!         if filter.namespace.unwrap_or(6) == 6 {
//!             rows.push(ResultRow::new(ContentItem::new(6, "Archived.png"), None));
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let mut registry = ExtensionRegistry::new();
//! registry.register(Box::new(ArchivedUploads));
//! ```

use anyhow::Result;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashSet};

use crate::models::{ContentItem, Filter, NamespaceId, ResultRow};

/// The original request filters, as handed to one source invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFilter {
    pub actors: BTreeSet<String>,
    pub pattern: Option<String>,
    /// The single namespace this invocation covers, or `None` when the
    /// request was not restricted to any namespace.
    pub namespace: Option<NamespaceId>,
    pub limit: i64,
}

/// A pluggable contributor of additional (or removed) discovery rows.
#[async_trait]
pub trait ExtensionSource: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Add rows to or remove rows from the shared accumulator.
    ///
    /// Returning an error discards whatever this invocation changed; rows
    /// accumulated before it are kept.
    async fn contribute(&self, filter: &SourceFilter, rows: &mut Vec<ResultRow>) -> Result<()>;
}

/// Ordered collection of extension sources.
pub struct ExtensionRegistry {
    sources: Vec<Box<dyn ExtensionSource>>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    /// Register a source. Sources run in registration order.
    pub fn register(&mut self, source: Box<dyn ExtensionSource>) {
        self.sources.push(source);
    }

    pub fn sources(&self) -> &[Box<dyn ExtensionSource>] {
        &self.sources
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }
}

impl Default for ExtensionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Run every source over the base rows, then deduplicate and cap.
///
/// Each source is invoked once per namespace in `filter`'s scope, or once
/// with no namespace when the scope is unrestricted. Every invocation works
/// on a scratch copy of the accumulator that is only committed on success.
/// The result holds `min(limit, distinct rows)` rows in accumulated order.
pub async fn finalize(
    base_rows: Vec<ResultRow>,
    registry: &ExtensionRegistry,
    filter: &Filter,
    limit: i64,
) -> Vec<ResultRow> {
    let mut rows = base_rows;
    if registry.is_empty() {
        return truncate_distinct(rows, limit);
    }

    let invocations: Vec<SourceFilter> = match &filter.namespace_ids {
        Some(namespaces) => namespaces
            .iter()
            .map(|ns| source_filter(filter, Some(*ns)))
            .collect(),
        None => vec![source_filter(filter, None)],
    };
    tracing::debug!(
        sources = registry.len(),
        invocations = invocations.len(),
        "Running extension sources"
    );

    for source in registry.sources() {
        for invocation in &invocations {
            let mut scratch = rows.clone();
            match source.contribute(invocation, &mut scratch).await {
                Ok(()) => rows = scratch,
                Err(e) => {
                    tracing::warn!(
                        source = source.name(),
                        namespace = ?invocation.namespace,
                        error = %e,
                        "Extension source failed; keeping rows accumulated so far."
                    );
                }
            }
        }
    }

    truncate_distinct(rows, limit)
}

fn source_filter(filter: &Filter, namespace: Option<NamespaceId>) -> SourceFilter {
    SourceFilter {
        actors: filter.actor_names.clone(),
        pattern: filter.title_pattern.clone(),
        namespace,
        limit: filter.limit,
    }
}

/// Drop repeated items (first occurrence wins) and cap at `limit`.
pub fn truncate_distinct(rows: Vec<ResultRow>, limit: i64) -> Vec<ResultRow> {
    let cap = usize::try_from(limit).unwrap_or(0);
    let mut seen: HashSet<ContentItem> = HashSet::with_capacity(rows.len());
    rows.into_iter()
        .filter(|row| seen.insert(row.item.clone()))
        .take(cap)
        .collect()
}
