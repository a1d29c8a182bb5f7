//! Configuration loading for the issue sync service.
//!
//! Loads layered `.env` files and environment variables prefixed with
//! `ISSUE_SYNC_`, producing a typed [`AppConfig`].

use std::{collections::BTreeMap, env, net::SocketAddr, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

const ENV_PREFIX: &str = "ISSUE_SYNC_";

/// Application configuration derived from `ISSUE_SYNC_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct AppConfig {
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default = "default_api_bind_addr")]
    pub api_bind_addr: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "default_db_acquire_timeout_ms")]
    pub db_acquire_timeout_ms: u64,
    #[serde(default)]
    pub github: GitHubSourceConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub presence: PresenceConfig,
}

/// Settings for the upstream issue source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct GitHubSourceConfig {
    /// Base URL of the GitHub REST API (default: https://api.github.com)
    ///
    /// Environment variable: `ISSUE_SYNC_GITHUB_API_BASE`
    #[serde(default = "default_github_api_base")]
    pub api_base: String,

    /// Optional bearer credential sent with every request
    ///
    /// Environment variable: `ISSUE_SYNC_GITHUB_TOKEN`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Environment variable: `ISSUE_SYNC_GITHUB_USER_AGENT`
    #[serde(default = "default_github_user_agent")]
    pub user_agent: String,

    /// Label allow-list; an issue is kept when it carries at least one of these
    ///
    /// Environment variable: `ISSUE_SYNC_LABELS_FILTER` (comma-separated)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels_filter: Vec<String>,

    /// Per-request timeout in milliseconds (default: 10000)
    ///
    /// Environment variable: `ISSUE_SYNC_SYNC_REQUEST_TIMEOUT_MS`
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

/// Tuning knobs for a single sync invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct SyncConfig {
    /// Issues requested per source page (default: 50)
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Maximum pages fetched in one invocation (default: 1)
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// Issue limit applied when the request does not carry one (default: 10)
    #[serde(default = "default_issue_limit")]
    pub default_issue_limit: u32,

    /// Number of upserts awaited together (default: 10)
    #[serde(default = "default_upsert_batch_size")]
    pub upsert_batch_size: usize,

    /// Hard execution ceiling in milliseconds (default: 25000)
    #[serde(default = "default_max_execution_ms")]
    pub max_execution_ms: u64,

    /// Safety margin kept free below the ceiling (default: 5000)
    #[serde(default = "default_timeout_buffer_ms")]
    pub timeout_buffer_ms: u64,
}

/// Presence tracking bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct PresenceConfig {
    /// Users seen within this many seconds count as active (default: 300)
    #[serde(default = "default_presence_window_seconds")]
    pub window_seconds: u64,

    /// Maximum number of repositories tracked at once (default: 1024)
    #[serde(default = "default_presence_max_repos")]
    pub max_repos: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            api_bind_addr: default_api_bind_addr(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            database_url: default_database_url(),
            db_max_connections: default_db_max_connections(),
            db_acquire_timeout_ms: default_db_acquire_timeout_ms(),
            github: GitHubSourceConfig::default(),
            sync: SyncConfig::default(),
            presence: PresenceConfig::default(),
        }
    }
}

impl Default for GitHubSourceConfig {
    fn default() -> Self {
        Self {
            api_base: default_github_api_base(),
            token: None,
            user_agent: default_github_user_agent(),
            labels_filter: Vec::new(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            max_pages: default_max_pages(),
            default_issue_limit: default_issue_limit(),
            upsert_batch_size: default_upsert_batch_size(),
            max_execution_ms: default_max_execution_ms(),
            timeout_buffer_ms: default_timeout_buffer_ms(),
        }
    }
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            window_seconds: default_presence_window_seconds(),
            max_repos: default_presence_max_repos(),
        }
    }
}

impl SyncConfig {
    /// Validate sync bounds
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 || self.page_size > 100 {
            return Err(ConfigError::InvalidPageSize {
                value: self.page_size,
            });
        }

        if self.max_pages == 0 {
            return Err(ConfigError::InvalidMaxPages);
        }

        if self.default_issue_limit == 0 {
            return Err(ConfigError::InvalidDefaultIssueLimit);
        }

        if self.upsert_batch_size == 0 || self.upsert_batch_size > 100 {
            return Err(ConfigError::InvalidUpsertBatchSize {
                value: self.upsert_batch_size,
            });
        }

        if self.timeout_buffer_ms >= self.max_execution_ms {
            return Err(ConfigError::InvalidTimeBudget {
                max_ms: self.max_execution_ms,
                buffer_ms: self.timeout_buffer_ms,
            });
        }

        Ok(())
    }

    pub fn max_execution(&self) -> Duration {
        Duration::from_millis(self.max_execution_ms)
    }

    pub fn timeout_buffer(&self) -> Duration {
        Duration::from_millis(self.timeout_buffer_ms)
    }
}

impl PresenceConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_seconds == 0 || self.max_repos == 0 {
            return Err(ConfigError::InvalidPresenceBounds {
                window_seconds: self.window_seconds,
                max_repos: self.max_repos,
            });
        }
        Ok(())
    }
}

impl AppConfig {
    /// Returns the configured bind address as a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.api_bind_addr.parse()
    }

    /// Returns a redacted JSON representation (secrets are redacted).
    pub fn redacted_json(&self) -> serde_json::Result<String> {
        let mut config = self.clone();
        if config.github.token.is_some() {
            config.github.token = Some("[REDACTED]".to_string());
        }
        serde_json::to_string_pretty(&config)
    }

    /// Validates the configuration, returning an error for out-of-range settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_url.trim().is_empty() {
            return Err(ConfigError::MissingDatabaseUrl);
        }

        url::Url::parse(&self.github.api_base).map_err(|source| {
            ConfigError::InvalidGitHubApiBase {
                value: self.github.api_base.clone(),
                source,
            }
        })?;

        if self.github.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidRequestTimeout);
        }

        self.sync.validate()?;
        self.presence.validate()?;

        Ok(())
    }
}

/// Split a comma-separated list, trimming entries and dropping empties.
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn default_profile() -> String {
    "local".to_string()
}

fn default_api_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_database_url() -> String {
    "sqlite://issue-sync.db?mode=rwc".to_string()
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_acquire_timeout_ms() -> u64 {
    5000
}

fn default_github_api_base() -> String {
    "https://api.github.com".to_string()
}

fn default_github_user_agent() -> String {
    "BeginnerContributeApp".to_string()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_page_size() -> u32 {
    50
}

fn default_max_pages() -> u32 {
    1
}

fn default_issue_limit() -> u32 {
    10
}

fn default_upsert_batch_size() -> usize {
    10
}

fn default_max_execution_ms() -> u64 {
    25_000
}

fn default_timeout_buffer_ms() -> u64 {
    5_000
}

fn default_presence_window_seconds() -> u64 {
    300 // 5 minutes
}

fn default_presence_max_repos() -> usize {
    1024
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load environment file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        source: dotenvy::Error,
    },
    #[error("invalid api bind address '{value}': {source}")]
    InvalidBindAddr {
        value: String,
        source: std::net::AddrParseError,
    },
    #[error("invalid value '{value}' for {key}")]
    InvalidNumber { key: String, value: String },
    #[error("database URL is missing; set ISSUE_SYNC_DATABASE_URL")]
    MissingDatabaseUrl,
    #[error("invalid GitHub API base '{value}': {source}")]
    InvalidGitHubApiBase {
        value: String,
        source: url::ParseError,
    },
    #[error("source request timeout must be positive")]
    InvalidRequestTimeout,
    #[error("sync page size must be between 1 and 100, got {value}")]
    InvalidPageSize { value: u32 },
    #[error("sync page cap must be at least 1")]
    InvalidMaxPages,
    #[error("default issue limit must be at least 1")]
    InvalidDefaultIssueLimit,
    #[error("upsert batch size must be between 1 and 100, got {value}")]
    InvalidUpsertBatchSize { value: usize },
    #[error("timeout buffer ({buffer_ms}ms) must be smaller than the execution ceiling ({max_ms}ms)")]
    InvalidTimeBudget { max_ms: u64, buffer_ms: u64 },
    #[error(
        "presence window and repository bound must be positive (window: {window_seconds}s, max repos: {max_repos})"
    )]
    InvalidPresenceBounds {
        window_seconds: u64,
        max_repos: usize,
    },
}

/// Loads configuration using layered `.env` files and `ISSUE_SYNC_*` env vars.
pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    /// Creates a new loader rooted at the current working directory.
    pub fn new() -> Self {
        Self {
            base_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Creates a loader rooted at the provided directory (useful for tests).
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Loads configuration; process environment wins over every dotenv layer.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let (mut layered, profile_hint) = self.collect_layered_env()?;

        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                layered.insert(stripped.to_string(), value);
            }
        }

        let profile = take_string(&mut layered, "PROFILE").unwrap_or(profile_hint);
        let api_bind_addr =
            take_string(&mut layered, "API_BIND_ADDR").unwrap_or_else(default_api_bind_addr);
        let log_level = take_string(&mut layered, "LOG_LEVEL").unwrap_or_else(default_log_level);
        let log_format =
            take_string(&mut layered, "LOG_FORMAT").unwrap_or_else(default_log_format);
        let database_url =
            take_string(&mut layered, "DATABASE_URL").unwrap_or_else(default_database_url);
        let db_max_connections = take_number(&mut layered, "DB_MAX_CONNECTIONS")?
            .unwrap_or_else(default_db_max_connections);
        let db_acquire_timeout_ms = take_number(&mut layered, "DB_ACQUIRE_TIMEOUT_MS")?
            .unwrap_or_else(default_db_acquire_timeout_ms);

        let github = GitHubSourceConfig {
            api_base: take_string(&mut layered, "GITHUB_API_BASE")
                .map(|base| base.trim_end_matches('/').to_string())
                .unwrap_or_else(default_github_api_base),
            token: take_string(&mut layered, "GITHUB_TOKEN").map(|t| t.trim().to_string()),
            user_agent: take_string(&mut layered, "GITHUB_USER_AGENT")
                .unwrap_or_else(default_github_user_agent),
            labels_filter: layered
                .remove("LABELS_FILTER")
                .map(|raw| parse_list(&raw))
                .unwrap_or_default(),
            request_timeout_ms: take_number(&mut layered, "SYNC_REQUEST_TIMEOUT_MS")?
                .unwrap_or_else(default_request_timeout_ms),
        };

        let sync = SyncConfig {
            page_size: take_number(&mut layered, "SYNC_PAGE_SIZE")?
                .unwrap_or_else(default_page_size),
            max_pages: take_number(&mut layered, "SYNC_MAX_PAGES")?
                .unwrap_or_else(default_max_pages),
            default_issue_limit: take_number(&mut layered, "SYNC_DEFAULT_ISSUE_LIMIT")?
                .unwrap_or_else(default_issue_limit),
            upsert_batch_size: take_number(&mut layered, "SYNC_UPSERT_BATCH_SIZE")?
                .unwrap_or_else(default_upsert_batch_size),
            max_execution_ms: take_number(&mut layered, "SYNC_MAX_EXECUTION_MS")?
                .unwrap_or_else(default_max_execution_ms),
            timeout_buffer_ms: take_number(&mut layered, "SYNC_TIMEOUT_BUFFER_MS")?
                .unwrap_or_else(default_timeout_buffer_ms),
        };

        let presence = PresenceConfig {
            window_seconds: take_number(&mut layered, "PRESENCE_WINDOW_SECONDS")?
                .unwrap_or_else(default_presence_window_seconds),
            max_repos: take_number(&mut layered, "PRESENCE_MAX_REPOS")?
                .unwrap_or_else(default_presence_max_repos),
        };

        let config = AppConfig {
            profile,
            api_bind_addr,
            log_level,
            log_format,
            database_url,
            db_max_connections,
            db_acquire_timeout_ms,
            github,
            sync,
            presence,
        };

        config.validate()?;

        match config.bind_addr() {
            Ok(_) => Ok(config),
            Err(source) => Err(ConfigError::InvalidBindAddr {
                value: config.api_bind_addr.clone(),
                source,
            }),
        }
    }

    fn collect_layered_env(&self) -> Result<(BTreeMap<String, String>, String), ConfigError> {
        let mut values = BTreeMap::new();

        self.merge_dotenv(self.base_dir.join(".env"), &mut values)?;
        self.merge_dotenv(self.base_dir.join(".env.local"), &mut values)?;

        let profile = env::var(format!("{ENV_PREFIX}PROFILE"))
            .ok()
            .or_else(|| values.get("PROFILE").cloned())
            .unwrap_or_else(default_profile);

        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}", &profile)),
            &mut values,
        )?;
        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}.local", &profile)),
            &mut values,
        )?;

        Ok((values, profile))
    }

    fn merge_dotenv(
        &self,
        path: PathBuf,
        values: &mut BTreeMap<String, String>,
    ) -> Result<(), ConfigError> {
        match dotenvy::from_path_iter(&path) {
            Ok(iter) => {
                for item in iter {
                    let (key, value) = item.map_err(|source| ConfigError::EnvFile {
                        path: path.clone(),
                        source,
                    })?;
                    if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                        values.insert(stripped.to_string(), value);
                    }
                }
                Ok(())
            }
            Err(dotenvy::Error::Io(ref io_err))
                if io_err.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(())
            }
            Err(err) => Err(ConfigError::EnvFile { path, source: err }),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn take_string(layered: &mut BTreeMap<String, String>, key: &str) -> Option<String> {
    layered.remove(key).filter(|v| !v.trim().is_empty())
}

fn take_number<T: std::str::FromStr>(
    layered: &mut BTreeMap<String, String>,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    match take_string(layered, key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber {
                key: format!("{ENV_PREFIX}{key}"),
                value: raw,
            }),
        None => Ok(None),
    }
}
