//! # Mass Nuke CLI (`nuke`)
//!
//! The `nuke` binary finds pages created by an actor (or by anyone) so they
//! can be reviewed for bulk deletion. It also records the change events that
//! feed its two creation indexes.
//!
//! ## Usage
//!
//! ```bash
//! nuke --config ./config/nuke.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `nuke init` | Create the SQLite database and schema |
//! | `nuke record <kind>` | Record a page creation, edit or upload |
//! | `nuke discover` | List pages matching the discovery filters |
//! | `nuke prune` | Drop recent changes older than the retention |
//!
//! ## Examples
//!
//! ```bash
//! nuke init
//! nuke record create --title "Page123" --actor Alice
//! nuke discover --target Alice --namespace 0
//! nuke discover --pattern 'Page%' --from 2024-06-01 --json
//! ```

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use mass_nuke::config::{self, Config};
use mass_nuke::db;
use mass_nuke::discover::{self, DiscoveryRequest};
use mass_nuke::migrate;
use mass_nuke::models::parse_namespace_list;
use mass_nuke::record::{self, ChangeEvent, EventKind};

/// Find recently created pages for bulk deletion review.
#[derive(Parser)]
#[command(name = "nuke", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/nuke.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Record a change event.
    Record {
        kind: EventKind,

        /// Page title, as typed.
        #[arg(long)]
        title: String,

        /// Actor who made the change.
        #[arg(long)]
        actor: String,

        /// Namespace id. Uploads default to the file namespace.
        #[arg(long)]
        namespace: Option<i64>,

        /// Unix timestamp of the change (defaults to now).
        #[arg(long)]
        at: Option<i64>,
    },

    /// List pages created within the allowed time window.
    Discover {
        /// Account name, network address or temporary account.
        #[arg(long)]
        target: Option<String>,

        /// Temporary accounts linked to the target. Repeatable.
        #[arg(long = "linked")]
        linked: Vec<String>,

        /// Title pattern: `%` matches any run, `_` one character, `\` escapes.
        #[arg(long)]
        pattern: Option<String>,

        /// Namespace ids. Repeatable; also accepts comma or newline lists.
        #[arg(long = "namespace")]
        namespaces: Vec<String>,

        /// Earliest creation date (YYYY-MM-DD).
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Latest creation date, inclusive (YYYY-MM-DD).
        #[arg(long)]
        to: Option<NaiveDate>,

        /// Maximum number of pages.
        #[arg(long)]
        limit: Option<i64>,

        /// Print the outcome as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Delete recent changes older than the configured retention.
    Prune,
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log.level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = config::load_config(&cli.config)?;
    init_tracing(&cfg);

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Record {
            kind,
            title,
            actor,
            namespace,
            at,
        } => {
            let namespace = namespace.unwrap_or(match kind {
                EventKind::Upload => mass_nuke::models::NS_FILE,
                _ => 0,
            });
            let policy = cfg.capitalization_policy()?;
            let pool = db::connect(&cfg).await?;
            let event = ChangeEvent {
                kind,
                namespace,
                title,
                actor,
                timestamp: at,
            };
            let result = record::record_event(&pool, &event, &policy).await;
            pool.close().await;
            let item = result.context("Failed to record change")?;
            println!("Recorded {}:{}", item.namespace, item.title);
        }
        Commands::Discover {
            target,
            linked,
            pattern,
            namespaces,
            from,
            to,
            limit,
            json,
        } => {
            let request = DiscoveryRequest {
                target,
                linked_actors: linked,
                pattern,
                namespaces: parse_namespace_list(&namespaces),
                date_from: from,
                date_to: to,
                limit,
            };
            discover::run_discover(&cfg, request, json).await?;
        }
        Commands::Prune => {
            let cutoff = Utc::now().timestamp() - cfg.discovery.recent_changes_max_age_secs;
            let pool = db::connect(&cfg).await?;
            let removed = record::prune_recent_changes(&pool, cutoff).await;
            pool.close().await;
            println!("Pruned {} recent change(s).", removed?);
        }
    }

    Ok(())
}
