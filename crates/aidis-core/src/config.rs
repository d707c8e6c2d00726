use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration loaded from `~/.aidis/config.toml`, overridable
/// via `AIDIS_CONFIG_PATH` and per-field `AIDIS_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub embeddings: EmbeddingsConfig,
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            database: DatabaseConfig::default(),
            embeddings: EmbeddingsConfig::default(),
            daemon: DaemonConfig::default(),
            security: SecurityConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl Config {
    /// Load config from `~/.aidis/config.toml` (or `AIDIS_CONFIG_PATH` if
    /// set), falling back to defaults when the file does not exist, then
    /// apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("AIDIS_CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| Self::default_path());

        let mut cfg = if path.exists() {
            Self::load_from(&path)?
        } else {
            Config::default()
        };
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    /// Load from a specific path, without environment overrides.
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let text = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io(e.to_string()))?;
        let cfg: Config = toml::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(cfg)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".aidis")
            .join("config.toml")
    }

    /// Every `AIDIS_`-prefixed variable documented in spec.md section 6
    /// overrides the matching field. The legacy unprefixed form (e.g.
    /// `DATABASE_HOST`) is consulted only if the prefixed one is absent.
    fn apply_env_overrides(&mut self) {
        fn env(prefixed: &str, legacy: &str) -> Option<String> {
            std::env::var(prefixed)
                .ok()
                .or_else(|| std::env::var(legacy).ok())
        }

        if let Some(v) = env("AIDIS_LOG_LEVEL", "LOG_LEVEL") {
            self.general.log_level = v;
        }
        if let Some(v) = env("AIDIS_DATABASE_HOST", "DATABASE_HOST") {
            self.database.host = v;
        }
        if let Some(v) = env("AIDIS_DATABASE_PORT", "DATABASE_PORT") {
            if let Ok(p) = v.parse() {
                self.database.port = p;
            }
        }
        if let Some(v) = env("AIDIS_DATABASE_NAME", "DATABASE_NAME") {
            self.database.name = v;
        }
        if let Some(v) = env("AIDIS_DATABASE_USER", "DATABASE_USER") {
            self.database.user = v;
        }
        if let Some(v) = env("AIDIS_DATABASE_PASSWORD", "DATABASE_PASSWORD") {
            self.database.password = Some(v);
        }
        if let Ok(v) = std::env::var("AIDIS_SKIP_DATABASE") {
            self.daemon.skip_database = parse_bool(&v);
        }
        if let Ok(v) = std::env::var("AIDIS_SKIP_BACKGROUND") {
            self.daemon.skip_background = parse_bool(&v);
        }
        if let Ok(v) = std::env::var("AIDIS_SKIP_STDIO") {
            self.daemon.skip_stdio = parse_bool(&v);
        }
        if let Ok(v) = std::env::var("AIDIS_MCP_DEBUG") {
            self.daemon.mcp_debug = parse_bool(&v);
        }
    }
}

fn parse_bool(v: &str) -> bool {
    matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(String),
    #[error("parse: {0}")]
    Parse(String),
}

// ---------------------------------------------------------------------------
// Section structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_project_name")]
    pub project_name: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            project_name: default_project_name(),
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_project_name() -> String {
    "aidis".into()
}
fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "text".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_host")]
    pub host: String,
    #[serde(default = "default_db_port")]
    pub port: u16,
    #[serde(default = "default_db_name")]
    pub name: String,
    #[serde(default = "default_db_user")]
    pub user: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_pool_min")]
    pub pool_min: u32,
    #[serde(default = "default_pool_max")]
    pub pool_max: u32,
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
    /// SQLite file path used by the embedded Storage Gateway; external
    /// `host`/`port`/`name`/`user` fields are carried for parity with a
    /// networked relational store but are not consulted by this gateway.
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: default_db_host(),
            port: default_db_port(),
            name: default_db_name(),
            user: default_db_user(),
            password: None,
            pool_min: default_pool_min(),
            pool_max: default_pool_max(),
            acquire_timeout_ms: default_acquire_timeout_ms(),
            path: default_db_path(),
        }
    }
}

fn default_db_host() -> String {
    "localhost".into()
}
fn default_db_port() -> u16 {
    5432
}
fn default_db_name() -> String {
    "aidis".into()
}
fn default_db_user() -> String {
    "aidis".into()
}
fn default_pool_min() -> u32 {
    1
}
fn default_pool_max() -> u32 {
    10
}
fn default_acquire_timeout_ms() -> u64 {
    5_000
}
fn default_db_path() -> String {
    "~/.aidis/store.db".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingsConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_embedding_cache_size")]
    pub cache_size: usize,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            cache_size: default_embedding_cache_size(),
        }
    }
}

fn default_embedding_model() -> String {
    "local-fallback".into()
}
fn default_embedding_cache_size() -> usize {
    1024
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_daemon_host")]
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default = "default_pid_path")]
    pub pid_path: String,
    #[serde(default = "default_port_registry_path")]
    pub port_registry_path: String,
    #[serde(default)]
    pub skip_database: bool,
    #[serde(default)]
    pub skip_background: bool,
    #[serde(default)]
    pub skip_stdio: bool,
    #[serde(default)]
    pub mcp_debug: bool,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            host: default_daemon_host(),
            port: None,
            pid_path: default_pid_path(),
            port_registry_path: default_port_registry_path(),
            skip_database: false,
            skip_background: false,
            skip_stdio: false,
            mcp_debug: false,
        }
    }
}

fn default_daemon_host() -> String {
    "127.0.0.1".into()
}
fn default_pid_path() -> String {
    "./run/aidis.pid".into()
}
fn default_port_registry_path() -> String {
    "./run/aidis.ports.json".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Unused by the trust-local-process model; carried for parity with
    /// the source's allow-list and future multi-tenant work.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_failure_threshold")]
    pub circuit_failure_threshold: u32,
    #[serde(default = "default_recovery_secs")]
    pub circuit_recovery_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            circuit_failure_threshold: default_failure_threshold(),
            circuit_recovery_secs: default_recovery_secs(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_initial_backoff_ms() -> u64 {
    1_000
}
fn default_failure_threshold() -> u32 {
    5
}
fn default_recovery_secs() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_daemon_paths() {
        let cfg = Config::default();
        assert_eq!(cfg.daemon.pid_path, "./run/aidis.pid");
        assert_eq!(cfg.retry.circuit_failure_threshold, 5);
    }

    #[test]
    fn load_from_missing_path_errors() {
        let err = Config::load_from("/nonexistent/aidis-config.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn round_trips_through_toml() {
        let cfg = Config::default();
        let text = cfg.to_toml().unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.database.name, cfg.database.name);
    }

    #[test]
    fn prefixed_env_var_overrides_legacy() {
        // SAFETY: test runs single-threaded within this process's env;
        // no other test reads these two names.
        unsafe {
            std::env::set_var("DATABASE_HOST", "legacy-host");
            std::env::set_var("AIDIS_DATABASE_HOST", "prefixed-host");
        }
        let mut cfg = Config::default();
        cfg.apply_env_overrides();
        unsafe {
            std::env::remove_var("DATABASE_HOST");
            std::env::remove_var("AIDIS_DATABASE_HOST");
        }
        assert_eq!(cfg.database.host, "prefixed-host");
    }
}
