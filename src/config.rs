//! TOML settings for the server and the storage layers beneath it
//!
//! Every section is optional. `BIZDESK_*` environment variables win over
//! file values.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::buckets::DEFAULT_BUCKETS;
use crate::vault::{default_critical_keys, default_session_dir, VaultConfig};

/// Contents of `bizdesk.toml`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub vault: VaultSettings,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub buckets: BucketsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where data lives on disk
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

fn default_data_dir() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("bizdesk").to_string_lossy().to_string())
        .unwrap_or_else(|| "./bizdesk_data".to_string())
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Fallback store settings
#[derive(Debug, Clone, Deserialize)]
pub struct VaultSettings {
    #[serde(default = "default_critical_keys")]
    pub critical_keys: Vec<String>,

    #[serde(default = "default_max_backups")]
    pub max_backups: usize,

    #[serde(default = "default_backup_interval")]
    pub backup_interval_secs: u64,

    #[serde(default = "default_indexed_timeout")]
    pub indexed_open_timeout_ms: u64,

    /// Largest value the local tier accepts
    #[serde(default = "default_max_entry_kb")]
    pub max_entry_kb: usize,

    #[serde(default = "default_true")]
    pub backup_on_write: bool,

    /// Scratch directory for the session tier (default: per-process temp dir)
    pub session_dir: Option<String>,
}

fn default_max_backups() -> usize {
    3
}

fn default_backup_interval() -> u64 {
    300 // 5 minutes
}

fn default_indexed_timeout() -> u64 {
    2000
}

fn default_max_entry_kb() -> usize {
    5 * 1024 // 5 MB
}

fn default_true() -> bool {
    true
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self {
            critical_keys: default_critical_keys(),
            max_backups: default_max_backups(),
            backup_interval_secs: default_backup_interval(),
            indexed_open_timeout_ms: default_indexed_timeout(),
            max_entry_kb: default_max_entry_kb(),
            backup_on_write: default_true(),
            session_dir: None,
        }
    }
}

/// API server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Bearer token required on `/api/v1` when set
    pub api_token: Option<String>,

    #[serde(default = "default_max_body_mb")]
    pub max_body_mb: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8082
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:5173".to_string(),
        "http://127.0.0.1:5173".to_string(),
    ]
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_body_mb() -> usize {
    20
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: default_cors_origins(),
            request_timeout_secs: default_request_timeout(),
            api_token: None,
            max_body_mb: default_max_body_mb(),
        }
    }
}

impl ApiConfig {
    /// Address string to bind
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Object storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BucketsConfig {
    #[serde(default = "default_bucket_names")]
    pub names: Vec<String>,

    #[serde(default = "default_max_object_mb")]
    pub max_object_mb: usize,
}

fn default_bucket_names() -> Vec<String> {
    DEFAULT_BUCKETS.iter().map(|b| b.to_string()).collect()
}

fn default_max_object_mb() -> usize {
    10
}

impl Default for BucketsConfig {
    fn default() -> Self {
        Self {
            names: default_bucket_names(),
            max_object_mb: default_max_object_mb(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,

    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e,
        })
    }

    /// Parse TOML content
    pub fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        for path in Self::default_paths() {
            if path.exists() {
                match Self::load_with_env(&path) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Config file locations, in lookup order
    pub fn default_paths() -> Vec<PathBuf> {
        [
            dirs::config_dir().map(|p| p.join("bizdesk").join("config.toml")),
            Some(PathBuf::from("/etc/bizdesk/config.toml")),
            Some(PathBuf::from("./bizdesk.toml")),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// Apply `BIZDESK_*` environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(data_dir) = var("BIZDESK_DATA_DIR") {
            self.storage.data_dir = data_dir;
        }

        if let Some(host) = var("BIZDESK_API_HOST") {
            self.api.host = host;
        }
        if let Some(port) = var("BIZDESK_API_PORT").and_then(|p| p.parse().ok()) {
            self.api.port = port;
        }
        if let Some(token) = var("BIZDESK_API_TOKEN") {
            self.api.api_token = Some(token).filter(|t| !t.is_empty());
        }

        if let Some(secs) = var("BIZDESK_BACKUP_INTERVAL_SECS").and_then(|s| s.parse().ok()) {
            self.vault.backup_interval_secs = secs;
        }

        if let Some(level) = var("BIZDESK_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("BIZDESK_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    /// Data directory with `~` expanded
    pub fn data_dir(&self) -> PathBuf {
        expand_home(&self.storage.data_dir)
    }

    /// SQLite file of the record tables
    pub fn tables_path(&self) -> PathBuf {
        self.data_dir().join("tables.db")
    }

    /// Root directory of the object buckets
    pub fn buckets_dir(&self) -> PathBuf {
        self.data_dir().join("buckets")
    }

    /// Settings for the fallback store
    pub fn vault_config(&self) -> VaultConfig {
        let data_dir = self.data_dir().join("vault");
        VaultConfig {
            session_dir: self
                .vault
                .session_dir
                .as_deref()
                .map(expand_home)
                .unwrap_or_else(default_session_dir),
            data_dir,
            critical_keys: self.vault.critical_keys.clone(),
            max_backups: self.vault.max_backups,
            backup_interval_secs: self.vault.backup_interval_secs,
            indexed_open_timeout_ms: self.vault.indexed_open_timeout_ms,
            max_entry_bytes: Some(self.vault.max_entry_kb * 1024),
            backup_on_write: self.vault.backup_on_write,
        }
    }
}

fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

/// Commented `bizdesk.toml` with every default spelled out
pub fn generate_default_config() -> String {
    r#"# BizDesk Configuration
#
# Environment variables override these settings:
# - BIZDESK_DATA_DIR
# - BIZDESK_API_HOST
# - BIZDESK_API_PORT
# - BIZDESK_API_TOKEN
# - BIZDESK_BACKUP_INTERVAL_SECS
# - BIZDESK_LOG_LEVEL
# - BIZDESK_LOG_FORMAT

[storage]
# Directory for record tables, buckets and the vault
data_dir = "~/.local/share/bizdesk"

[vault]
# Keys backed up periodically and restored at startup when missing
critical_keys = ["company_data", "clients", "invoices", "employees", "inventory", "user_settings"]

# Backups kept per key
max_backups = 3

# Interval of the background backup (seconds)
backup_interval_secs = 300

# Give up opening the indexed tier after this long (ms)
indexed_open_timeout_ms = 2000

# Largest value the local tier accepts (KB)
max_entry_kb = 5120

# Back up critical keys on every save
backup_on_write = true

[api]
host = "0.0.0.0"
port = 8082

# Browser origins allowed to call the API ("*" allows any)
cors_origins = ["http://localhost:5173", "http://127.0.0.1:5173"]

# Requests running longer are answered with 408
request_timeout_secs = 30

# Largest request body (MB)
max_body_mb = 20

# Require "Authorization: Bearer <token>" on /api/v1
# api_token = "change-me"

[buckets]
# Object storage buckets
names = ["bank-statements", "transaction-receipts", "employee-images", "company-logos"]

# Largest object (MB)
max_object_mb = 10

[logging]
# trace, debug, info, warn or error (RUST_LOG takes precedence)
level = "info"

# pretty or json
format = "pretty"

# Append to this file instead of stderr
# file = "/var/log/bizdesk/bizdesk.log"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_generated_config_parses() {
        let config = Config::parse(&generate_default_config()).unwrap();
        assert_eq!(config.api.port, 8082);
        assert_eq!(config.vault.max_backups, 3);
        assert_eq!(config.buckets.names.len(), 4);
        assert!(config.api.api_token.is_none());
        assert!(config.storage.data_dir.starts_with("~/"));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = Config::parse(
            r#"
            [api]
            port = 9000
            api_token = "secret"

            [vault]
            critical_keys = ["company_data"]
            "#,
        )
        .unwrap();

        assert_eq!(config.api.port, 9000);
        assert_eq!(config.api.host, "0.0.0.0");
        assert_eq!(config.api.api_token.as_deref(), Some("secret"));
        assert_eq!(config.vault.critical_keys, vec!["company_data"]);
        assert_eq!(config.vault.backup_interval_secs, 300);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("BIZDESK_DATA_DIR", "/srv/bizdesk"),
            ("BIZDESK_API_PORT", "7000"),
            ("BIZDESK_API_TOKEN", "t0k3n"),
            ("BIZDESK_LOG_FORMAT", "json"),
            ("BIZDESK_BACKUP_INTERVAL_SECS", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.data_dir(), PathBuf::from("/srv/bizdesk"));
        assert_eq!(config.api.port, 7000);
        assert_eq!(config.api.api_token.as_deref(), Some("t0k3n"));
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.vault.backup_interval_secs, 300);
    }

    #[test]
    fn test_empty_token_disables_auth() {
        let mut config = Config::default();
        config.api.api_token = Some("old".into());
        config.apply_overrides(|name| (name == "BIZDESK_API_TOKEN").then(String::new));
        assert!(config.api.api_token.is_none());
    }

    #[test]
    fn test_vault_config_paths() {
        let mut config = Config::default();
        config.storage.data_dir = "/data".to_string();
        config.vault.session_dir = Some("/tmp/session".to_string());
        config.vault.max_entry_kb = 1;

        let vault = config.vault_config();
        assert_eq!(vault.data_dir, PathBuf::from("/data/vault"));
        assert_eq!(vault.session_dir, PathBuf::from("/tmp/session"));
        assert_eq!(vault.max_entry_bytes, Some(1024));
        assert_eq!(config.tables_path(), PathBuf::from("/data/tables.db"));
        assert_eq!(config.buckets_dir(), PathBuf::from("/data/buckets"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Path::new("/nonexistent/bizdesk.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
