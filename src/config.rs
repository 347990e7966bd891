//! Configuration for the dispatch service.
//!
//! Settings are read from `.dispatch/dispatch.toml` and layered
//! file → environment → CLI flags:
//!
//! ```toml
//! [store]
//! db_path = ".dispatch/tickets.db"
//!
//! [dispatch]
//! task_timeout_secs = 300
//! poll_interval_secs = 60
//! work_delay_ms = 2000
//! agents = ["customer_service", "sales"]
//!
//! [logging]
//! level = "info"
//! json = false
//! ```
//!
//! Environment overrides: `DISPATCH_DB_PATH`, `DISPATCH_TASK_TIMEOUT_SECS`,
//! `DISPATCH_POLL_INTERVAL_SECS`, `DISPATCH_WORK_DELAY_MS`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::dispatch::DispatchSettings;
use crate::models::AgentType;

/// Directory holding the config file and, by default, the database.
pub const DISPATCH_DIR: &str = ".dispatch";
pub const CONFIG_FILE: &str = "dispatch.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSection {
    /// SQLite database path
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from(DISPATCH_DIR).join("tickets.db")
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchSection {
    /// Per-ticket processing budget, measured from task start
    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,
    /// Pause between dispatch passes in service mode
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Simulated external work inside the customer service agent
    #[serde(default = "default_work_delay_ms")]
    pub work_delay_ms: u64,
    /// Agent types the service loop runs
    #[serde(default = "default_agents")]
    pub agents: Vec<AgentType>,
}

fn default_task_timeout_secs() -> u64 {
    300
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_work_delay_ms() -> u64 {
    2000
}

fn default_agents() -> Vec<AgentType> {
    AgentType::ALL.to_vec()
}

impl Default for DispatchSection {
    fn default() -> Self {
        Self {
            task_timeout_secs: default_task_timeout_secs(),
            poll_interval_secs: default_poll_interval_secs(),
            work_delay_ms: default_work_delay_ms(),
            agents: default_agents(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSection {
    /// Default `tracing` filter when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON log lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Root of `dispatch.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default)]
    pub store: StoreSection,
    #[serde(default)]
    pub dispatch: DispatchSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

impl DispatchConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse dispatch.toml")
    }

    /// Load from `dir/dispatch.toml`, or defaults if the file doesn't exist.
    pub fn load_or_default(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize dispatch.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Apply `DISPATCH_*` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_env(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("DISPATCH_DB_PATH") {
            self.store.db_path = PathBuf::from(path);
        }
        if let Some(raw) = lookup("DISPATCH_TASK_TIMEOUT_SECS") {
            self.dispatch.task_timeout_secs = parse_env_u64("DISPATCH_TASK_TIMEOUT_SECS", &raw)?;
        }
        if let Some(raw) = lookup("DISPATCH_POLL_INTERVAL_SECS") {
            self.dispatch.poll_interval_secs =
                parse_env_u64("DISPATCH_POLL_INTERVAL_SECS", &raw)?;
        }
        if let Some(raw) = lookup("DISPATCH_WORK_DELAY_MS") {
            self.dispatch.work_delay_ms = parse_env_u64("DISPATCH_WORK_DELAY_MS", &raw)?;
        }
        Ok(())
    }

    /// Settings handed to every agent the registry builds.
    pub fn settings(&self) -> DispatchSettings {
        DispatchSettings {
            task_timeout: Duration::from_secs(self.dispatch.task_timeout_secs),
            work_delay: Duration::from_millis(self.dispatch.work_delay_ms),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.dispatch.poll_interval_secs)
    }
}

fn parse_env_u64(key: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse()
        .with_context(|| format!("{} must be a non-negative integer, got '{}'", key, raw))
}
