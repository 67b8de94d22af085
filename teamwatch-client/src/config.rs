//! Configuration loading for the teamwatch client.
//!
//! Endpoints, timeouts and the reconnect policy are required; the rest is
//! optional.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use teamwatch_sync::{BackoffPolicy, PushConfig, DEFAULT_REFRESH_TRIGGER};

/// Environment variable naming the config file when `--config` is absent.
pub const CONFIG_ENV: &str = "TEAMWATCH_CONFIG";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub ws_endpoint: String,
    #[serde(default)]
    pub auth: AuthConfig,
    pub request_timeout_ms: u64,
    /// Periodic refetch for every screen; off when absent.
    #[serde(default)]
    pub refresh_interval_ms: Option<u64>,
    pub cache: CacheConfig,
    pub reconnect: ReconnectConfig,
    /// Push event types that trigger a refetch.
    #[serde(default = "default_refresh_on")]
    pub refresh_on: Vec<String>,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    pub token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Root for session-scoped cache files. Memory only when absent.
    #[serde(default)]
    pub session_dir: Option<PathBuf>,
    pub default_ttl_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReconnectConfig {
    pub initial_ms: u64,
    pub max_ms: u64,
    pub max_attempts: u32,
}

impl ReconnectConfig {
    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy::new(
            Duration::from_millis(self.initial_ms),
            Duration::from_millis(self.max_ms),
            self.max_attempts,
        )
    }
}

fn default_refresh_on() -> Vec<String> {
    vec![DEFAULT_REFRESH_TRIGGER.to_string()]
}

fn default_log_filter() -> String {
    "teamwatch_client=info,teamwatch_sync=info,warn".to_string()
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration file path (use --config or TEAMWATCH_CONFIG)")]
    MissingConfigPath,
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl ClientConfig {
    /// Load from `explicit`, else from `TEAMWATCH_CONFIG`, and validate.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = explicit
            .map(Path::to_path_buf)
            .or_else(config_path_from_env)
            .ok_or(ConfigError::MissingConfigPath)?;
        let config = Self::from_path(&path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_base_url.trim().is_empty() {
            return Err(invalid("api_base_url", "must not be empty"));
        }
        if let Err(err) = url::Url::parse(&self.api_base_url) {
            return Err(invalid("api_base_url", err.to_string()));
        }
        if self.ws_endpoint.trim().is_empty() {
            return Err(invalid("ws_endpoint", "must not be empty"));
        }
        match url::Url::parse(&self.ws_endpoint) {
            Ok(url) if matches!(url.scheme(), "ws" | "wss") => {}
            Ok(url) => {
                return Err(invalid(
                    "ws_endpoint",
                    format!("scheme must be ws or wss, got {}", url.scheme()),
                ))
            }
            Err(err) => return Err(invalid("ws_endpoint", err.to_string())),
        }
        if self
            .auth
            .token
            .as_deref()
            .is_some_and(|token| token.trim().is_empty())
        {
            return Err(invalid("auth.token", "must not be blank when set"));
        }
        if self.request_timeout_ms == 0 {
            return Err(invalid("request_timeout_ms", "must be > 0"));
        }
        if self.refresh_interval_ms == Some(0) {
            return Err(invalid("refresh_interval_ms", "must be > 0 when set"));
        }
        if self
            .cache
            .session_dir
            .as_ref()
            .is_some_and(|dir| dir.as_os_str().is_empty())
        {
            return Err(invalid("cache.session_dir", "must not be empty when set"));
        }
        if self.cache.default_ttl_ms == 0 {
            return Err(invalid("cache.default_ttl_ms", "must be > 0"));
        }
        if self.reconnect.initial_ms == 0 {
            return Err(invalid("reconnect.initial_ms", "must be > 0"));
        }
        if self.reconnect.max_ms < self.reconnect.initial_ms {
            return Err(invalid("reconnect.max_ms", "must be >= initial_ms"));
        }
        if self.reconnect.max_attempts == 0 {
            return Err(invalid("reconnect.max_attempts", "must be > 0"));
        }
        if self.refresh_on.is_empty() {
            return Err(invalid("refresh_on", "must list at least one event type"));
        }
        if self.refresh_on.iter().any(|kind| kind.trim().is_empty()) {
            return Err(invalid("refresh_on", "event types must not be blank"));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn refresh_interval(&self) -> Option<Duration> {
        self.refresh_interval_ms.map(Duration::from_millis)
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_millis(self.cache.default_ttl_ms)
    }

    /// Push channel settings: endpoint, credential and reconnect policy.
    pub fn push_config(&self) -> Result<PushConfig, ConfigError> {
        let mut push = PushConfig::new(&self.ws_endpoint)
            .map_err(|err| invalid("ws_endpoint", err.to_string()))?
            .with_backoff(self.reconnect.backoff());
        if let Some(token) = &self.auth.token {
            push = push.with_token(token.clone());
        }
        Ok(push)
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.into(),
    }
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var(CONFIG_ENV).ok().map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
api_base_url = "http://localhost:8000"
ws_endpoint = "ws://localhost:8000/ws"
request_timeout_ms = 5000

[cache]
default_ttl_ms = 300000

[reconnect]
initial_ms = 1000
max_ms = 30000
max_attempts = 5
"#;

    #[test]
    fn test_minimal_config_defaults() {
        let config = ClientConfig::from_toml(MINIMAL).unwrap();
        config.validate().unwrap();
        assert_eq!(config.refresh_on, vec!["update".to_string()]);
        assert!(config.auth.token.is_none());
        assert!(config.refresh_interval().is_none());
        assert_eq!(config.reconnect.backoff(), BackoffPolicy::default());
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let contents = format!("{}\ntheme = \"dark\"\n", MINIMAL);
        assert!(matches!(
            ClientConfig::from_toml(&contents),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_push_config_carries_token() {
        let mut config = ClientConfig::from_toml(MINIMAL).unwrap();
        config.auth.token = Some("abc".to_string());
        let push = config.push_config().unwrap();
        assert!(push.handshake_url().as_str().ends_with("/ws?token=abc"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("teamwatch.toml");
        std::fs::write(&path, MINIMAL).unwrap();
        let config = ClientConfig::load(Some(&path)).unwrap();
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
    }
}
