//! Discovery service: the `discover` entry point and its CLI renderer.
//!
//! A request flows through the resolvers into a [`Filter`], is compiled by
//! the [`QueryBuilder`], executed read-only against the chosen index under
//! an execution budget, and finally handed to the extension stage:
//!
//! ```text
//! request ─▶ actors ─▶ strategy ─▶ time window ─▶ Filter ─▶ plan ─▶ rows ─▶ finalize
//! ```
//!
//! Validation happens before any SQL runs. Empty or inverted date ranges
//! produce an empty outcome rather than an error.

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use std::collections::BTreeSet;
use std::future::Future;
use std::time::Duration;

use crate::actors;
use crate::config::Config;
use crate::db;
use crate::error::{format_period, DiscoveryError};
use crate::extension::{self, ExtensionRegistry};
use crate::models::{ContentItem, Filter, IndexStrategy, NamespaceId, ResultRow};
use crate::pattern::CapitalizationPolicy;
use crate::query::{ExecutablePlan, QueryBuilder, SqlValue};
use crate::time_window::{self, DateBound, MaxAge};

/// What the caller asked for, before resolution.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryRequest {
    /// Primary actor: an account name, network address or temporary account.
    pub target: Option<String>,
    /// Temporary accounts linked to the target.
    pub linked_actors: Vec<String>,
    pub pattern: Option<String>,
    pub namespaces: Option<BTreeSet<NamespaceId>>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub limit: Option<i64>,
}

/// Informational notes attached to an otherwise successful discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiscoveryNotice {
    /// The recent-activity index only reaches back `retention_seconds`.
    RetentionLimited { retention_seconds: i64 },
}

impl std::fmt::Display for DiscoveryNotice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscoveryNotice::RetentionLimited { retention_seconds } => write!(
                f,
                "Without a target, only pages created in the last {} can be found.",
                format_period(retention_seconds)
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryOutcome {
    pub strategy: IndexStrategy,
    pub rows: Vec<ResultRow>,
    pub notices: Vec<DiscoveryNotice>,
}

/// Immutable configuration snapshot for one [`Discovery`] service.
#[derive(Debug, Clone)]
pub struct DiscoverySettings {
    pub max_age: MaxAge,
    pub capitalization: CapitalizationPolicy,
    pub budget: Duration,
    pub default_limit: i64,
}

impl DiscoverySettings {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            max_age: config.max_age(),
            capitalization: config.capitalization_policy()?,
            budget: config.query_budget(),
            default_limit: config.discovery.default_limit,
        })
    }
}

pub struct Discovery {
    pool: SqlitePool,
    settings: DiscoverySettings,
    extensions: ExtensionRegistry,
}

impl Discovery {
    pub fn new(pool: SqlitePool, settings: DiscoverySettings) -> Self {
        Self {
            pool,
            settings,
            extensions: ExtensionRegistry::new(),
        }
    }

    pub fn with_extensions(mut self, extensions: ExtensionRegistry) -> Self {
        self.extensions = extensions;
        self
    }

    pub async fn discover(
        &self,
        request: &DiscoveryRequest,
    ) -> Result<DiscoveryOutcome, DiscoveryError> {
        self.discover_at(request, Utc::now()).await
    }

    /// Run discovery as of `now`. Read-only; repeated calls over an
    /// unchanged store return identical outcomes.
    pub async fn discover_at(
        &self,
        request: &DiscoveryRequest,
        now: DateTime<Utc>,
    ) -> Result<DiscoveryOutcome, DiscoveryError> {
        let actor_names = actors::resolve(request.target.as_deref(), &request.linked_actors);
        let strategy = IndexStrategy::select(&actor_names);
        let max_age = self.settings.max_age;

        let mut notices = Vec::new();
        let window = time_window::resolve(
            max_age.effective(),
            request.date_from.map(DateBound::reject),
            request.date_to.map(DateBound::reject),
            now,
        )
        .and_then(|window| match max_age.retention_for(strategy) {
            Some(retention) => {
                if max_age.is_limited_by_retention(strategy) {
                    notices.push(DiscoveryNotice::RetentionLimited {
                        retention_seconds: retention,
                    });
                }
                window.narrow_floor(now.timestamp() - retention)
            }
            None => Ok(window),
        });

        let window = match window {
            Ok(window) => window,
            Err(e) if e.is_empty_range() => {
                tracing::debug!(error = %e, "Empty date range; returning no rows");
                return Ok(DiscoveryOutcome {
                    strategy,
                    rows: Vec::new(),
                    notices,
                });
            }
            Err(e) => return Err(e),
        };

        let filter = Filter {
            actor_names,
            title_pattern: request.pattern.clone(),
            namespace_ids: request.namespaces.clone().filter(|ns| !ns.is_empty()),
            from_timestamp: window.from,
            to_timestamp: window.to,
            limit: request.limit.unwrap_or(self.settings.default_limit),
            index_strategy: strategy,
        };

        let plan = QueryBuilder::new(&self.settings.capitalization).build(&filter)?;
        tracing::debug!(
            strategy = plan.strategy.as_str(),
            sql = %plan.sql,
            binds = plan.binds.len(),
            "Executing discovery plan"
        );

        let base_rows = with_budget(self.settings.budget, execute(&self.pool, &plan)).await?;

        let rows = extension::finalize(base_rows, &self.extensions, &filter, filter.limit).await;

        Ok(DiscoveryOutcome {
            strategy,
            rows,
            notices,
        })
    }
}

/// Await `fut` for at most `budget`.
///
/// A zero budget leaves no time for any query and fails without polling.
pub async fn with_budget<T, F>(budget: Duration, fut: F) -> Result<T, DiscoveryError>
where
    F: Future<Output = Result<T, DiscoveryError>>,
{
    let budget_ms = u64::try_from(budget.as_millis()).unwrap_or(u64::MAX);
    if budget.is_zero() {
        return Err(DiscoveryError::BudgetExceeded { budget_ms });
    }

    tokio::time::timeout(budget, fut)
        .await
        .map_err(|_| DiscoveryError::BudgetExceeded { budget_ms })?
}

/// Run a plan and map its rows.
pub async fn execute(
    pool: &SqlitePool,
    plan: &ExecutablePlan,
) -> Result<Vec<ResultRow>, DiscoveryError> {
    let mut query = sqlx::query(&plan.sql);
    for value in &plan.binds {
        query = match value {
            SqlValue::Integer(v) => query.bind(*v),
            SqlValue::Text(v) => query.bind(v.clone()),
        };
    }

    let rows = query.fetch_all(pool).await?;

    let results = rows
        .iter()
        .map(|row| {
            let item = ContentItem::new(row.get::<i64, _>("namespace"), row.get::<String, _>("title"));
            let actor = if plan.attribute_actor {
                Some(row.get::<String, _>("actor"))
            } else {
                None
            };
            ResultRow::new(item, actor)
        })
        .collect();

    Ok(results)
}

/// CLI entry point for `nuke discover`.
pub async fn run_discover(config: &Config, request: DiscoveryRequest, json: bool) -> Result<()> {
    let settings = DiscoverySettings::from_config(config)?;
    let pool = db::connect_read_only(config).await?;
    let discovery = Discovery::new(pool.clone(), settings);

    let outcome = discovery.discover(&request).await;
    pool.close().await;
    let outcome = outcome?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    for notice in &outcome.notices {
        println!("Note: {}", notice);
    }

    if outcome.rows.is_empty() {
        println!("No pages found.");
        return Ok(());
    }

    for (i, row) in outcome.rows.iter().enumerate() {
        let title = row.item.display_title();
        match &row.attributed_actor {
            Some(actor) => println!("{}. [{}] {} (by {})", i + 1, row.item.namespace, title, actor),
            None => println!("{}. [{}] {}", i + 1, row.item.namespace, title),
        }
    }
    println!();
    println!(
        "{} page(s) via {}",
        outcome.rows.len(),
        outcome.strategy.as_str()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time_window::DAY_SECONDS;

    #[tokio::test(start_paused = true)]
    async fn test_budget_exceeded_by_stalled_query() {
        let err = with_budget(
            Duration::from_millis(250),
            std::future::pending::<Result<(), DiscoveryError>>(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DiscoveryError::BudgetExceeded { budget_ms: 250 }));
        assert!(err.to_string().contains("can be retried"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_passes_through_result() {
        let rows = with_budget(Duration::from_secs(1), async { Ok::<_, DiscoveryError>(vec![1, 2]) })
            .await
            .unwrap();
        assert_eq!(rows, vec![1, 2]);

        let err = with_budget::<(), _>(Duration::from_secs(1), async {
            Err(DiscoveryError::InvalidFilter("bad".to_string()))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, DiscoveryError::InvalidFilter(_)));
    }

    #[tokio::test]
    async fn test_zero_budget_rejected_even_for_ready_future() {
        let err = with_budget(Duration::ZERO, async { Ok::<_, DiscoveryError>(()) }).await.unwrap_err();
        assert!(matches!(err, DiscoveryError::BudgetExceeded { budget_ms: 0 }));
    }

    #[test]
    fn test_retention_notice_message() {
        let notice = DiscoveryNotice::RetentionLimited {
            retention_seconds: DAY_SECONDS * 30,
        };
        assert_eq!(
            notice.to_string(),
            "Without a target, only pages created in the last 30 days can be found."
        );
    }

    #[test]
    fn test_outcome_json_shape() {
        let outcome = DiscoveryOutcome {
            strategy: IndexStrategy::ByRecentActivity,
            rows: vec![ResultRow::new(
                ContentItem::new(0, "Page123"),
                Some("Alice".to_string()),
            )],
            notices: vec![DiscoveryNotice::RetentionLimited {
                retention_seconds: DAY_SECONDS,
            }],
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["strategy"], "by_recent_activity");
        assert_eq!(json["rows"][0]["actor"], "Alice");
        assert_eq!(json["notices"][0]["kind"], "retention_limited");
        assert_eq!(json["notices"][0]["retention_seconds"], DAY_SECONDS);
    }
}
