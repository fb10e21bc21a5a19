//! Discovery query builder.
//!
//! Translates a resolved [`Filter`] into an [`ExecutablePlan`]: SQL text
//! against one of the two creation indexes plus its ordered bind values.
//! Every user-controlled value is bound; the SQL itself only ever contains
//! fixed identifiers and `?` placeholders.
//!
//! # Indexes
//!
//! | Strategy | Table | Creation predicate |
//! |----------|-------|--------------------|
//! | [`IndexStrategy::ByActorHistory`] | `revisions` ⨝ `pages` | `parent_id = 0` |
//! | [`IndexStrategy::ByRecentActivity`] | `recent_changes` | `is_new = 1` or a first-time upload |
//!
//! Both indexes implement [`CreationIndex`]; predicate composition is shared
//! and lives in [`QueryBuilder::build`].

use serde::Serialize;
use std::collections::BTreeSet;

use crate::error::{DiscoveryError, Result};
use crate::models::{Filter, IndexStrategy, NamespaceId};
use crate::pattern::{self, CapitalizationPolicy, NamespaceSubset, TitleCondition};

/// A value bound to a `?` placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Integer(i64),
    Text(String),
}

/// A fully composed, ready-to-run discovery query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutablePlan {
    pub strategy: IndexStrategy,
    pub sql: String,
    pub binds: Vec<SqlValue>,
    /// Whether rows should surface their own actor.
    pub attribute_actor: bool,
}

/// A backing index that can answer "which pages were created".
///
/// Implementations only describe their shape; predicate composition is
/// shared so both indexes apply identical filter semantics.
pub trait CreationIndex: Send + Sync {
    fn strategy(&self) -> IndexStrategy;

    /// Whether this index can serve the filter efficiently.
    fn supports(&self, filter: &Filter) -> bool;

    /// `SELECT ... FROM ...` producing `namespace`, `title`, `actor` and
    /// `created_at` columns.
    fn select_clause(&self) -> &'static str;

    /// Restricts rows to page creations (and first-time uploads).
    fn creation_predicate(&self) -> &'static str;

    fn namespace_column(&self) -> &'static str;
    fn title_column(&self) -> &'static str;
    fn actor_column(&self) -> &'static str;
    fn timestamp_column(&self) -> &'static str;

    /// Grouping and ordering, newest first with a stable tie-break.
    fn tail_clause(&self) -> &'static str;
}

/// Revisions keyed by actor. Needs an actor predicate to stay selective.
pub struct ActorHistoryIndex;

impl CreationIndex for ActorHistoryIndex {
    fn strategy(&self) -> IndexStrategy {
        IndexStrategy::ByActorHistory
    }

    fn supports(&self, filter: &Filter) -> bool {
        !filter.actor_names.is_empty()
    }

    fn select_clause(&self) -> &'static str {
        "SELECT p.namespace AS namespace, p.title AS title, r.actor AS actor, r.timestamp AS created_at\n\
         FROM revisions r\n\
         JOIN pages p ON p.page_id = r.page_id"
    }

    fn creation_predicate(&self) -> &'static str {
        "r.parent_id = 0"
    }

    fn namespace_column(&self) -> &'static str {
        "p.namespace"
    }

    fn title_column(&self) -> &'static str {
        "p.title"
    }

    fn actor_column(&self) -> &'static str {
        "r.actor"
    }

    fn timestamp_column(&self) -> &'static str {
        "r.timestamp"
    }

    fn tail_clause(&self) -> &'static str {
        "ORDER BY r.timestamp DESC, r.rev_id DESC"
    }
}

/// Time-ordered recent changes. Serves any filter, bounded by retention.
pub struct RecentActivityIndex;

impl CreationIndex for RecentActivityIndex {
    fn strategy(&self) -> IndexStrategy {
        IndexStrategy::ByRecentActivity
    }

    fn supports(&self, _filter: &Filter) -> bool {
        true
    }

    // An upload of a new file records both a creation and an upload log row,
    // so rows are grouped per page.
    fn select_clause(&self) -> &'static str {
        "SELECT rc.namespace AS namespace, rc.title AS title, rc.actor AS actor, MAX(rc.timestamp) AS created_at\n\
         FROM recent_changes rc"
    }

    fn creation_predicate(&self) -> &'static str {
        "(rc.is_new = 1 OR (rc.log_type = 'upload' AND rc.log_action = 'upload'))"
    }

    fn namespace_column(&self) -> &'static str {
        "rc.namespace"
    }

    fn title_column(&self) -> &'static str {
        "rc.title"
    }

    fn actor_column(&self) -> &'static str {
        "rc.actor"
    }

    fn timestamp_column(&self) -> &'static str {
        "rc.timestamp"
    }

    fn tail_clause(&self) -> &'static str {
        "GROUP BY rc.namespace, rc.title\n\
         ORDER BY created_at DESC, namespace ASC, title ASC"
    }
}

/// Look up the index implementation for a strategy.
pub fn index_for(strategy: IndexStrategy) -> &'static dyn CreationIndex {
    match strategy {
        IndexStrategy::ByActorHistory => &ActorHistoryIndex,
        IndexStrategy::ByRecentActivity => &RecentActivityIndex,
    }
}

/// Builds discovery plans under a capitalization policy snapshot.
pub struct QueryBuilder<'a> {
    policy: &'a CapitalizationPolicy,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(policy: &'a CapitalizationPolicy) -> Self {
        Self { policy }
    }

    /// Compose the plan for `filter`.
    ///
    /// Predicates, in order: creation only, time window, actors, namespaces,
    /// title conditions. Then ordering and the row cap.
    pub fn build(&self, filter: &Filter) -> Result<ExecutablePlan> {
        let index = index_for(filter.index_strategy);
        if !index.supports(filter) {
            return Err(DiscoveryError::UnsupportedStrategy {
                strategy: index.strategy().as_str(),
            });
        }
        if filter.limit < 1 {
            return Err(DiscoveryError::InvalidFilter(format!(
                "limit must be >= 1, got {}",
                filter.limit
            )));
        }

        let mut predicates = Predicates::default();
        predicates.push(index.creation_predicate());

        let ts = index.timestamp_column();
        predicates.push_bound(
            format!("{} >= ?", ts),
            SqlValue::Integer(filter.from_timestamp),
        );
        if let Some(to) = filter.to_timestamp {
            predicates.push_bound(format!("{} < ?", ts), SqlValue::Integer(to));
        }

        if !filter.actor_names.is_empty() {
            predicates.push_in(
                index.actor_column(),
                filter
                    .actor_names
                    .iter()
                    .map(|actor| SqlValue::Text(actor.clone())),
                false,
            );
        }

        if let Some(namespaces) = &filter.namespace_ids {
            predicates.push_in(
                index.namespace_column(),
                namespace_values(namespaces),
                false,
            );
        }

        if let Some(raw) = &filter.title_pattern {
            let conditions =
                pattern::normalize(raw, filter.namespace_ids.as_ref(), self.policy);
            if !conditions.is_empty() {
                predicates.push_title_conditions(index, &conditions);
            }
        }

        let mut sql = String::from(index.select_clause());
        sql.push_str("\nWHERE ");
        sql.push_str(&predicates.clauses.join("\n  AND "));
        sql.push('\n');
        sql.push_str(index.tail_clause());
        sql.push_str("\nLIMIT ?");

        let mut binds = predicates.binds;
        binds.push(SqlValue::Integer(filter.limit));

        Ok(ExecutablePlan {
            strategy: index.strategy(),
            sql,
            binds,
            attribute_actor: filter.is_global(),
        })
    }
}

/// Accumulates `WHERE` fragments alongside their bind values, in order.
#[derive(Default)]
struct Predicates {
    clauses: Vec<String>,
    binds: Vec<SqlValue>,
}

impl Predicates {
    fn push(&mut self, clause: impl Into<String>) {
        self.clauses.push(clause.into());
    }

    fn push_bound(&mut self, clause: impl Into<String>, value: SqlValue) {
        self.clauses.push(clause.into());
        self.binds.push(value);
    }

    fn push_in(
        &mut self,
        column: &str,
        values: impl IntoIterator<Item = SqlValue>,
        negate: bool,
    ) {
        let (clause, binds) = in_list(column, values, negate);
        self.clauses.push(clause);
        self.binds.extend(binds);
    }

    fn push_title_conditions(&mut self, index: &dyn CreationIndex, conditions: &[TitleCondition]) {
        let mut alternatives = Vec::with_capacity(conditions.len());

        for condition in conditions {
            let mut clause = format!("{} GLOB ?", index.title_column());
            self.binds.push(SqlValue::Text(condition.pattern.to_glob()));

            let restriction = match &condition.namespaces {
                NamespaceSubset::Any => None,
                NamespaceSubset::Only(set) => {
                    Some(in_list(index.namespace_column(), namespace_values(set), false))
                }
                NamespaceSubset::Except(set) => {
                    Some(in_list(index.namespace_column(), namespace_values(set), true))
                }
            };
            if let Some((ns_clause, ns_binds)) = restriction {
                clause.push_str(" AND ");
                clause.push_str(&ns_clause);
                self.binds.extend(ns_binds);
            }
            alternatives.push(format!("({})", clause));
        }

        self.clauses.push(format!("({})", alternatives.join(" OR ")));
    }
}

fn namespace_values(set: &BTreeSet<NamespaceId>) -> impl Iterator<Item = SqlValue> + '_ {
    set.iter().map(|ns| SqlValue::Integer(*ns))
}

fn in_list(
    column: &str,
    values: impl IntoIterator<Item = SqlValue>,
    negate: bool,
) -> (String, Vec<SqlValue>) {
    let binds: Vec<SqlValue> = values.into_iter().collect();
    let placeholders = vec!["?"; binds.len()].join(", ");
    let op = if negate { "NOT IN" } else { "IN" };
    (format!("{} {} ({})", column, op, placeholders), binds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn filter(actors: &[&str]) -> Filter {
        let actor_names: BTreeSet<String> = actors.iter().map(|a| a.to_string()).collect();
        Filter {
            index_strategy: IndexStrategy::select(&actor_names),
            actor_names,
            title_pattern: None,
            namespace_ids: None,
            from_timestamp: 1_000,
            to_timestamp: None,
            limit: 500,
        }
    }

    fn placeholder_count(sql: &str) -> usize {
        sql.matches('?').count()
    }

    #[test]
    fn test_actor_filter_uses_actor_history() {
        let policy = CapitalizationPolicy::new(true);
        let plan = QueryBuilder::new(&policy).build(&filter(&["Alice"])).unwrap();

        assert_eq!(plan.strategy, IndexStrategy::ByActorHistory);
        assert!(plan.sql.contains("FROM revisions r"));
        assert!(plan.sql.contains("r.parent_id = 0"));
        assert!(plan.sql.contains("r.actor IN (?)"));
        assert!(!plan.attribute_actor);
        assert_eq!(
            plan.binds,
            vec![
                SqlValue::Integer(1_000),
                SqlValue::Text("Alice".to_string()),
                SqlValue::Integer(500),
            ]
        );
    }

    #[test]
    fn test_global_search_uses_recent_activity() {
        let policy = CapitalizationPolicy::new(true);
        let plan = QueryBuilder::new(&policy).build(&filter(&[])).unwrap();

        assert_eq!(plan.strategy, IndexStrategy::ByRecentActivity);
        assert!(plan.sql.contains("FROM recent_changes rc"));
        assert!(plan.sql.contains("rc.log_action = 'upload'"));
        assert!(!plan.sql.contains("rc.actor IN"));
        assert!(plan.attribute_actor);
    }

    #[test]
    fn test_forced_actor_history_without_actors_is_unsupported() {
        let policy = CapitalizationPolicy::new(true);
        let mut f = filter(&[]);
        f.index_strategy = IndexStrategy::ByActorHistory;
        let err = QueryBuilder::new(&policy).build(&f).unwrap_err();
        assert!(matches!(
            err,
            DiscoveryError::UnsupportedStrategy {
                strategy: "by_actor_history"
            }
        ));
    }

    #[test]
    fn test_non_positive_limit_rejected() {
        let policy = CapitalizationPolicy::new(true);
        let mut f = filter(&["Alice"]);
        f.limit = 0;
        assert!(matches!(
            QueryBuilder::new(&policy).build(&f),
            Err(DiscoveryError::InvalidFilter(_))
        ));
    }

    #[test]
    fn test_predicate_order_and_binds_align() {
        let policy = CapitalizationPolicy::new(true);
        let mut f = filter(&["Bob", "Alice"]);
        f.to_timestamp = Some(9_000);
        f.namespace_ids = Some(BTreeSet::from([0, 2]));
        f.title_pattern = Some("page%".to_string());
        let plan = QueryBuilder::new(&policy).build(&f).unwrap();

        let creation = plan.sql.find("r.parent_id = 0").unwrap();
        let from = plan.sql.find("r.timestamp >= ?").unwrap();
        let to = plan.sql.find("r.timestamp < ?").unwrap();
        let actors = plan.sql.find("r.actor IN (?, ?)").unwrap();
        let namespaces = plan.sql.find("p.namespace IN (?, ?)").unwrap();
        let title = plan.sql.find("p.title GLOB ?").unwrap();
        assert!(creation < from && from < to && to < actors);
        assert!(actors < namespaces && namespaces < title);

        assert_eq!(placeholder_count(&plan.sql), plan.binds.len());
        assert_eq!(
            plan.binds,
            vec![
                SqlValue::Integer(1_000),
                SqlValue::Integer(9_000),
                SqlValue::Text("Alice".to_string()),
                SqlValue::Text("Bob".to_string()),
                SqlValue::Integer(0),
                SqlValue::Integer(2),
                SqlValue::Text("Page*".to_string()),
                SqlValue::Integer(500),
            ]
        );
    }

    #[test]
    fn test_split_title_conditions_are_or_combined() {
        let policy = CapitalizationPolicy::new(false).with_override(2, true);
        let mut f = filter(&[]);
        f.title_pattern = Some("u%".to_string());
        let plan = QueryBuilder::new(&policy).build(&f).unwrap();

        assert!(plan.sql.contains(
            "((rc.title GLOB ? AND rc.namespace NOT IN (?)) OR (rc.title GLOB ? AND rc.namespace IN (?)))"
        ));
        assert_eq!(placeholder_count(&plan.sql), plan.binds.len());
        assert_eq!(
            &plan.binds[1..5],
            &[
                SqlValue::Text("u*".to_string()),
                SqlValue::Integer(2),
                SqlValue::Text("U*".to_string()),
                SqlValue::Integer(2),
            ]
        );
    }

    #[test]
    fn test_scoped_mixed_policy_restricts_each_condition() {
        let policy = CapitalizationPolicy::new(true).with_override(12, false);
        let mut f = filter(&["Alice"]);
        f.namespace_ids = Some(BTreeSet::from([0, 12]));
        f.title_pattern = Some("uncaps%".to_string());
        let plan = QueryBuilder::new(&policy).build(&f).unwrap();

        assert!(plan.sql.contains(
            "((p.title GLOB ? AND p.namespace IN (?)) OR (p.title GLOB ? AND p.namespace IN (?)))"
        ));
        assert_eq!(placeholder_count(&plan.sql), plan.binds.len());
        assert_eq!(
            &plan.binds[2..8],
            &[
                SqlValue::Integer(0),
                SqlValue::Integer(12),
                SqlValue::Text("Uncaps*".to_string()),
                SqlValue::Integer(0),
                SqlValue::Text("uncaps*".to_string()),
                SqlValue::Integer(12),
            ]
        );
    }

    #[test]
    fn test_scoped_shared_policy_has_single_namespace_filter() {
        let policy = CapitalizationPolicy::new(true);
        let mut f = filter(&["Alice"]);
        f.namespace_ids = Some(BTreeSet::from([0, 2]));
        f.title_pattern = Some("page%".to_string());
        let plan = QueryBuilder::new(&policy).build(&f).unwrap();

        assert_eq!(plan.sql.matches("p.namespace IN").count(), 1);
        assert!(plan.sql.contains("((p.title GLOB ?))"));
    }

    #[test]
    fn test_injection_stays_in_binds() {
        let policy = CapitalizationPolicy::new(true);
        let mut f = filter(&["x'); DROP TABLE pages; --"]);
        f.title_pattern = Some("'; DELETE FROM pages; --".to_string());
        let plan = QueryBuilder::new(&policy).build(&f).unwrap();

        assert!(!plan.sql.contains("DROP"));
        assert!(!plan.sql.contains("DELETE"));
        assert_eq!(placeholder_count(&plan.sql), plan.binds.len());
    }

    #[test]
    fn test_blank_pattern_adds_no_title_predicate() {
        let policy = CapitalizationPolicy::new(true);
        let mut f = filter(&["Alice"]);
        f.title_pattern = Some("   ".to_string());
        let plan = QueryBuilder::new(&policy).build(&f).unwrap();
        assert!(!plan.sql.contains("GLOB"));
    }

    #[test]
    fn test_row_cap_is_last_bind() {
        let policy = CapitalizationPolicy::new(true);
        let mut f = filter(&[]);
        f.limit = 7;
        let plan = QueryBuilder::new(&policy).build(&f).unwrap();
        assert!(plan.sql.ends_with("LIMIT ?"));
        assert_eq!(plan.binds.last(), Some(&SqlValue::Integer(7)));
    }
}
