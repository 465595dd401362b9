//! Configuration for marketfeed.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (MARKETFEED_HOME, MARKETFEED_API_TOKEN, MARKETFEED_BASE_URL)
//! 2. Config file (.marketfeed/config.yaml)
//! 3. Defaults (~/.marketfeed)
//!
//! Config file discovery:
//! - Searches current directory and parents for .marketfeed/config.yaml
//! - Paths in config file are relative to the project root (parent of .marketfeed/)

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::{Cadence, RetryPolicy};

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

pub const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co/query";
pub const DEFAULT_SYMBOL: &str = "IBM";
pub const DEFAULT_BUCKET: &str = "market-data";
pub const DEFAULT_TOPIC: &str = "stock";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub home: Option<String>,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub run_log: RunLogConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub retry: Option<RetryPolicy>,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderConfig {
    pub base_url: Option<String>,
    pub api_token: Option<String>,
    pub symbol: Option<String>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    /// Object store root directory
    pub root: Option<String>,
    pub bucket: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunLogConfig {
    /// SQLite database path
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotifyConfig {
    pub topic: Option<String>,
    /// HTTP bus bridge; the local outbox is used when unset
    pub endpoint: Option<String>,
    pub outbox: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScheduleConfig {
    pub interval_seconds: Option<u64>,
}

/// Provider connection settings
#[derive(Debug, Clone, Serialize)]
pub struct ProviderSettings {
    pub base_url: String,
    #[serde(skip_serializing)]
    pub api_token: String,
    pub symbol: String,
    pub timeout_seconds: u64,
}

/// Where notifications go
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "transport")]
pub enum NotifyTarget {
    Http { endpoint: String },
    Outbox { path: PathBuf },
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    /// Absolute path to marketfeed home (state directory)
    pub home: PathBuf,
    pub provider: ProviderSettings,
    pub storage_root: PathBuf,
    pub bucket: String,
    pub run_log_path: PathBuf,
    pub topic: String,
    pub notify: NotifyTarget,
    pub retry: RetryPolicy,
    pub cadence: Cadence,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

impl ResolvedConfig {
    /// Lock file held by a running scheduler
    pub fn scheduler_lock_path(&self) -> PathBuf {
        self.home.join("scheduler.lock")
    }

    /// API token with all but the last four characters masked
    pub fn masked_token(&self) -> String {
        let token = &self.provider.api_token;
        if token.is_empty() {
            return "(unset)".to_string();
        }
        let visible: String = token
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("****{}", visible)
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".marketfeed").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
pub fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's project root
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

/// Environment overrides, captured once so resolution stays pure
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub home: Option<String>,
    pub api_token: Option<String>,
    pub base_url: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self {
            home: std::env::var("MARKETFEED_HOME").ok(),
            api_token: std::env::var("MARKETFEED_API_TOKEN").ok(),
            base_url: std::env::var("MARKETFEED_BASE_URL").ok(),
        }
    }
}

/// Merge a parsed config file, env overrides and defaults
pub fn resolve(
    file: ConfigFile,
    config_path: Option<&Path>,
    env: &EnvOverrides,
    default_home: PathBuf,
) -> Result<ResolvedConfig> {
    // Project root is the parent of .marketfeed/
    let base_dir = config_path
        .and_then(|p| p.parent())
        .and_then(|p| p.parent())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let home = match (&env.home, &file.home) {
        (Some(env_home), _) => PathBuf::from(env_home),
        (None, Some(home)) => resolve_path(&base_dir, home),
        (None, None) => default_home,
    };

    let provider = ProviderSettings {
        base_url: env
            .base_url
            .clone()
            .or(file.provider.base_url)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        api_token: env
            .api_token
            .clone()
            .or(file.provider.api_token)
            .unwrap_or_default(),
        symbol: file
            .provider
            .symbol
            .unwrap_or_else(|| DEFAULT_SYMBOL.to_string()),
        timeout_seconds: file.provider.timeout_seconds.unwrap_or(30),
    };

    let storage_root = file
        .storage
        .root
        .map(|r| resolve_path(&base_dir, &r))
        .unwrap_or_else(|| home.join("objects"));

    let run_log_path = file
        .run_log
        .path
        .map(|p| resolve_path(&base_dir, &p))
        .unwrap_or_else(|| home.join("runs.db"));

    let notify = match file.notify.endpoint {
        Some(endpoint) => NotifyTarget::Http { endpoint },
        None => NotifyTarget::Outbox {
            path: file
                .notify
                .outbox
                .map(|p| resolve_path(&base_dir, &p))
                .unwrap_or_else(|| home.join("outbox.jsonl")),
        },
    };

    let retry = file.retry.unwrap_or_default();
    if retry.max_attempts == 0 {
        anyhow::bail!("retry.max_attempts must be at least 1");
    }

    let interval = file.schedule.interval_seconds.unwrap_or(3600);
    if interval == 0 {
        anyhow::bail!("schedule.interval_seconds must be greater than zero");
    }
    if interval > Cadence::MAX_INTERVAL.as_secs() {
        anyhow::bail!(
            "schedule.interval_seconds must be at most {} (got {})",
            Cadence::MAX_INTERVAL.as_secs(),
            interval
        );
    }

    Ok(ResolvedConfig {
        home,
        provider,
        storage_root,
        bucket: file
            .storage
            .bucket
            .unwrap_or_else(|| DEFAULT_BUCKET.to_string()),
        run_log_path,
        topic: file.notify.topic.unwrap_or_else(|| DEFAULT_TOPIC.to_string()),
        notify,
        retry,
        cadence: Cadence::new(Duration::from_secs(interval)),
        config_file: config_path.map(Path::to_path_buf),
    })
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".marketfeed");

    let config_path = find_config_file();
    let file = match config_path {
        Some(ref path) => load_config_file(path)?,
        None => ConfigFile::default(),
    };

    resolve(file, config_path.as_deref(), &EnvOverrides::from_env(), default_home)
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (bypasses the cache)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}
