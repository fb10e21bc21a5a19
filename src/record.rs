//! Change recording.
//!
//! Writes page creations, edits and uploads into both backing indexes: a
//! revision row (joined to its page) and a recent-changes row. Titles are
//! stored in database-key form with the namespace's capitalization applied,
//! which is the form title patterns are matched against.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;

use crate::models::{ContentItem, NamespaceId, NS_FILE};
use crate::pattern::{capitalize_first, CapitalizationPolicy};

/// Kind of change being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum EventKind {
    /// A new page.
    Create,
    /// A revision of an existing page.
    Edit,
    /// A file upload. New files create their description page.
    Upload,
}

#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub kind: EventKind,
    pub namespace: NamespaceId,
    /// Title as typed; normalized before storage.
    pub title: String,
    pub actor: String,
    /// Unix seconds. `None` records at the current time.
    pub timestamp: Option<i64>,
}

/// Normalize a typed title into database-key form for `namespace`.
pub fn normalize_title(
    title: &str,
    namespace: NamespaceId,
    policy: &CapitalizationPolicy,
) -> Result<String> {
    let key = title.trim().replace(' ', "_");
    if key.is_empty() {
        bail!("title must not be empty");
    }
    if policy.capitalizes(namespace) {
        Ok(capitalize_first(&key))
    } else {
        Ok(key)
    }
}

/// Record one change event in a single transaction.
pub async fn record_event(
    pool: &SqlitePool,
    event: &ChangeEvent,
    policy: &CapitalizationPolicy,
) -> Result<ContentItem> {
    let actor = event.actor.trim();
    if actor.is_empty() {
        bail!("actor must not be empty");
    }
    if event.kind == EventKind::Upload && event.namespace != NS_FILE {
        bail!(
            "uploads can only be recorded in the file namespace ({}), got {}",
            NS_FILE,
            event.namespace
        );
    }

    let title = normalize_title(&event.title, event.namespace, policy)?;
    let timestamp = event.timestamp.unwrap_or_else(|| Utc::now().timestamp());
    let item = ContentItem::new(event.namespace, title);

    let mut tx = pool.begin().await?;

    let page_id: Option<i64> =
        sqlx::query_scalar("SELECT page_id FROM pages WHERE namespace = ? AND title = ?")
            .bind(item.namespace)
            .bind(&item.title)
            .fetch_optional(&mut *tx)
            .await?;

    match (event.kind, page_id) {
        (EventKind::Create, Some(_)) => {
            bail!("page {}:{} already exists", item.namespace, item.title);
        }
        (EventKind::Edit, None) => {
            bail!("page {}:{} does not exist", item.namespace, item.title);
        }
        (EventKind::Create, None) | (EventKind::Upload, None) => {
            let page_id: i64 = sqlx::query_scalar(
                "INSERT INTO pages (namespace, title) VALUES (?, ?) RETURNING page_id",
            )
            .bind(item.namespace)
            .bind(&item.title)
            .fetch_one(&mut *tx)
            .await?;

            sqlx::query(
                "INSERT INTO revisions (page_id, parent_id, actor, timestamp) VALUES (?, 0, ?, ?)",
            )
            .bind(page_id)
            .bind(actor)
            .bind(timestamp)
            .execute(&mut *tx)
            .await?;

            insert_recent_change(&mut tx, &item, actor, timestamp, true, None).await?;
            if event.kind == EventKind::Upload {
                insert_recent_change(
                    &mut tx,
                    &item,
                    actor,
                    timestamp,
                    false,
                    Some(("upload", "upload")),
                )
                .await?;
            }
        }
        (EventKind::Edit, Some(page_id)) => {
            let parent_id: i64 =
                sqlx::query_scalar("SELECT MAX(rev_id) FROM revisions WHERE page_id = ?")
                    .bind(page_id)
                    .fetch_one(&mut *tx)
                    .await
                    .with_context(|| format!("page {} has no revisions", page_id))?;

            sqlx::query(
                "INSERT INTO revisions (page_id, parent_id, actor, timestamp) VALUES (?, ?, ?, ?)",
            )
            .bind(page_id)
            .bind(parent_id)
            .bind(actor)
            .bind(timestamp)
            .execute(&mut *tx)
            .await?;

            insert_recent_change(&mut tx, &item, actor, timestamp, false, None).await?;
        }
        // Re-uploading an existing file is not a creation.
        (EventKind::Upload, Some(_)) => {
            insert_recent_change(
                &mut tx,
                &item,
                actor,
                timestamp,
                false,
                Some(("upload", "overwrite")),
            )
            .await?;
        }
    }

    tx.commit().await?;

    tracing::info!(
        kind = ?event.kind,
        namespace = item.namespace,
        title = %item.title,
        actor,
        timestamp,
        "Recorded change"
    );
    Ok(item)
}

async fn insert_recent_change(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    item: &ContentItem,
    actor: &str,
    timestamp: i64,
    is_new: bool,
    log: Option<(&str, &str)>,
) -> Result<()> {
    let (log_type, log_action) = match log {
        Some((t, a)) => (Some(t), Some(a)),
        None => (None, None),
    };
    sqlx::query(
        r#"
        INSERT INTO recent_changes (namespace, title, actor, timestamp, is_new, log_type, log_action)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(item.namespace)
    .bind(&item.title)
    .bind(actor)
    .bind(timestamp)
    .bind(is_new as i64)
    .bind(log_type)
    .bind(log_action)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Delete recent-changes rows older than `cutoff` (Unix seconds).
pub async fn prune_recent_changes(pool: &SqlitePool, cutoff: i64) -> Result<u64> {
    let result = sqlx::query("DELETE FROM recent_changes WHERE timestamp < ?")
        .bind(cutoff)
        .execute(pool)
        .await?;

    let removed = result.rows_affected();
    tracing::info!(cutoff, removed, "Pruned recent changes");
    Ok(removed)
}
