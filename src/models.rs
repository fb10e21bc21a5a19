//! Core data models used throughout the discovery pipeline.
//!
//! These types represent the content items, filters, and result rows that
//! flow from the caller through the query builder and extension stage.

use serde::Serialize;
use std::collections::BTreeSet;

/// Numeric namespace identifier.
pub type NamespaceId = i64;

/// The namespace holding binary asset description pages.
pub const NS_FILE: NamespaceId = 6;

/// A content item, identified by namespace and database-key title.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ContentItem {
    pub namespace: NamespaceId,
    pub title: String,
}

impl ContentItem {
    pub fn new(namespace: NamespaceId, title: impl Into<String>) -> Self {
        Self {
            namespace,
            title: title.into(),
        }
    }

    /// Title with database-key underscores shown as spaces.
    pub fn display_title(&self) -> String {
        self.title.replace('_', " ")
    }
}

/// A discovered item, optionally attributed to the actor who created it.
///
/// `attributed_actor` is only populated for global searches. When an actor
/// filter narrowed the search every row shares that known actor, so it is
/// left as `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultRow {
    #[serde(flatten)]
    pub item: ContentItem,
    #[serde(rename = "actor")]
    pub attributed_actor: Option<String>,
}

impl ResultRow {
    pub fn new(item: ContentItem, attributed_actor: Option<String>) -> Self {
        Self {
            item,
            attributed_actor,
        }
    }
}

/// Which backing index a discovery query runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexStrategy {
    /// Revisions keyed by the actor who made them.
    ByActorHistory,
    /// The time-ordered index of all recent changes.
    ByRecentActivity,
}

impl IndexStrategy {
    /// Pick the index for an actor set.
    ///
    /// Scanning the actor-keyed index without an actor predicate is a full
    /// scan, so actor-less searches go to the recent-activity index where
    /// cost is bounded by time instead.
    pub fn select(actors: &BTreeSet<String>) -> Self {
        if actors.is_empty() {
            IndexStrategy::ByRecentActivity
        } else {
            IndexStrategy::ByActorHistory
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IndexStrategy::ByActorHistory => "by_actor_history",
            IndexStrategy::ByRecentActivity => "by_recent_activity",
        }
    }
}

/// Fully resolved discovery filter, built fresh for every query.
#[derive(Debug, Clone)]
pub struct Filter {
    /// Actors to match. Empty means no actor filtering at all.
    pub actor_names: BTreeSet<String>,
    /// Raw `%`/`_` wildcard pattern with `\` escapes.
    pub title_pattern: Option<String>,
    /// Namespaces to search. `None` means every namespace.
    pub namespace_ids: Option<BTreeSet<NamespaceId>>,
    /// Inclusive lower bound, Unix seconds.
    pub from_timestamp: i64,
    /// Exclusive upper bound, Unix seconds.
    pub to_timestamp: Option<i64>,
    pub limit: i64,
    pub index_strategy: IndexStrategy,
}

impl Filter {
    /// Whether rows must carry their own actor attribution.
    pub fn is_global(&self) -> bool {
        self.actor_names.is_empty()
    }
}

/// Parse namespace ids from free-form input.
///
/// Entries may be separated by newlines or commas. Entries that are not
/// integers are ignored; if nothing valid remains the result is `None`,
/// meaning every namespace.
pub fn parse_namespace_list<S: AsRef<str>>(inputs: &[S]) -> Option<BTreeSet<NamespaceId>> {
    let ids: BTreeSet<NamespaceId> = inputs
        .iter()
        .flat_map(|input| {
            input
                .as_ref()
                .split(['\n', ','])
                .map(str::trim)
                .filter_map(|s| s.parse::<NamespaceId>().ok())
                .collect::<Vec<_>>()
        })
        .filter(|id| *id >= 0)
        .collect();

    if ids.is_empty() {
        None
    } else {
        Some(ids)
    }
}
