//! Schema creation for the page, revision and recent-changes tables.
//!
//! Every statement is idempotent, so `nuke init` can be re-run safely.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create tables and indexes on an open pool.
pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    // Pages, keyed by namespace and database-key title
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pages (
            page_id INTEGER PRIMARY KEY AUTOINCREMENT,
            namespace INTEGER NOT NULL,
            title TEXT NOT NULL,
            UNIQUE(namespace, title)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Revisions; parent_id = 0 marks the creating revision
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS revisions (
            rev_id INTEGER PRIMARY KEY AUTOINCREMENT,
            page_id INTEGER NOT NULL,
            parent_id INTEGER NOT NULL DEFAULT 0,
            actor TEXT NOT NULL,
            timestamp INTEGER NOT NULL,
            FOREIGN KEY (page_id) REFERENCES pages(page_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Recent changes, pruned to the configured retention
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS recent_changes (
            rc_id INTEGER PRIMARY KEY AUTOINCREMENT,
            namespace INTEGER NOT NULL,
            title TEXT NOT NULL,
            actor TEXT NOT NULL,
            timestamp INTEGER NOT NULL,
            is_new INTEGER NOT NULL DEFAULT 0,
            log_type TEXT,
            log_action TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_revisions_actor_timestamp ON revisions(actor, timestamp DESC)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_revisions_page_id ON revisions(page_id)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_recent_changes_timestamp ON recent_changes(timestamp DESC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
