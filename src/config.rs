//! TOML configuration parsing and validation.
//!
//! ```toml
//! [db]
//! path = "./data/nuke.sqlite"
//!
//! [discovery]
//! max_age_secs = 0                       # 0 = use recent_changes_max_age_secs
//! recent_changes_max_age_secs = 7776000
//! default_limit = 500
//! query_budget_ms = 30000
//!
//! [capitalization]
//! default = true
//!
//! [capitalization.overrides]
//! "2" = false
//!
//! [log]
//! level = "warn"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::NamespaceId;
use crate::pattern::CapitalizationPolicy;
use crate::time_window::MaxAge;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub capitalization: CapitalizationConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DiscoveryConfig {
    /// Oldest creation eligible for discovery, in seconds. `0` falls back
    /// to `recent_changes_max_age_secs`.
    #[serde(default)]
    pub max_age_secs: i64,
    /// Retention of the recent-changes index, in seconds.
    #[serde(default = "default_recent_changes_max_age")]
    pub recent_changes_max_age_secs: i64,
    #[serde(default = "default_limit")]
    pub default_limit: i64,
    #[serde(default = "default_query_budget_ms")]
    pub query_budget_ms: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_age_secs: 0,
            recent_changes_max_age_secs: default_recent_changes_max_age(),
            default_limit: default_limit(),
            query_budget_ms: default_query_budget_ms(),
        }
    }
}

fn default_recent_changes_max_age() -> i64 {
    90 * 86_400
}
fn default_limit() -> i64 {
    500
}
fn default_query_budget_ms() -> u64 {
    30_000
}

#[derive(Debug, Deserialize, Clone)]
pub struct CapitalizationConfig {
    #[serde(default = "default_capitalize")]
    pub default: bool,
    /// Namespace id (as a string key) → capitalize flag.
    #[serde(default)]
    pub overrides: BTreeMap<String, bool>,
}

impl Default for CapitalizationConfig {
    fn default() -> Self {
        Self {
            default: true,
            overrides: BTreeMap::new(),
        }
    }
}

fn default_capitalize() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Config {
    pub fn max_age(&self) -> MaxAge {
        MaxAge {
            primary: self.discovery.max_age_secs,
            fallback: self.discovery.recent_changes_max_age_secs,
        }
    }

    pub fn query_budget(&self) -> Duration {
        Duration::from_millis(self.discovery.query_budget_ms)
    }

    /// Build the capitalization policy. Keys were validated on load.
    pub fn capitalization_policy(&self) -> Result<CapitalizationPolicy> {
        let mut policy = CapitalizationPolicy::new(self.capitalization.default);
        for (key, capitalize) in &self.capitalization.overrides {
            let namespace: NamespaceId = key.trim().parse().with_context(|| {
                format!(
                    "capitalization.overrides key '{}' is not a namespace id",
                    key
                )
            })?;
            policy.overrides.insert(namespace, *capitalize);
        }
        Ok(policy)
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    // Validate discovery
    if config.discovery.max_age_secs < 0 {
        anyhow::bail!("discovery.max_age_secs must be >= 0");
    }
    if config.discovery.recent_changes_max_age_secs < 1 {
        anyhow::bail!("discovery.recent_changes_max_age_secs must be > 0");
    }
    if config.discovery.default_limit < 1 {
        anyhow::bail!("discovery.default_limit must be >= 1");
    }
    if config.discovery.query_budget_ms == 0 {
        anyhow::bail!("discovery.query_budget_ms must be > 0");
    }

    // Validate capitalization overrides
    config.capitalization_policy()?;

    Ok(config)
}
