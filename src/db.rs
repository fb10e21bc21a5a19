//! SQLite connection pools.
//!
//! Recording and migrations use a read-write pool that creates the database
//! file and switches it to WAL mode. Discovery only ever reads, so it opens
//! a read-only pool against an existing database; WAL lets those readers
//! run alongside a writer.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::config::Config;

fn options(config: &Config) -> Result<SqliteConnectOptions> {
    let db_path = &config.db.path;
    Ok(SqliteConnectOptions::from_str(&format!(
        "sqlite:{}",
        db_path.display()
    ))?)
}

/// Open the read-write pool, creating the database file if needed.
pub async fn connect(config: &Config) -> Result<SqlitePool> {
    let db_path = &config.db.path;

    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = options(config)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    tracing::debug!(path = %db_path.display(), "Opened database");
    Ok(pool)
}

/// Open a read-only pool for discovery. The database must already exist.
pub async fn connect_read_only(config: &Config) -> Result<SqlitePool> {
    let db_path = &config.db.path;
    if !db_path.exists() {
        anyhow::bail!(
            "Database not found at {}. Run `nuke init` first.",
            db_path.display()
        );
    }

    let options = options(config)?.read_only(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open {} read-only", db_path.display()))?;

    tracing::debug!(path = %db_path.display(), "Opened database read-only");
    Ok(pool)
}
