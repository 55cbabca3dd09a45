//! TOML-based application configuration.
//!
//! Stores:
//! - Countdown defaults
//! - Commit watcher endpoint, interval and watched repositories
//! - GitHub proxy settings (organisation, token env var)
//! - Control server address
//!
//! Configuration is stored at `~/.config/kickoff/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::data_dir;
use crate::error::ConfigError;

/// Countdown configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerConfig {
    #[serde(default = "default_duration_hours")]
    pub default_duration_hours: u64,
}

/// Commit watcher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Commit-info endpoint, queried as `<endpoint>?repo=<name>`.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// How long a push notification stays on screen before auto-dismissal.
    #[serde(default = "default_toast_duration_ms")]
    pub toast_duration_ms: u64,
    /// Watched repositories, polled and reported in this order.
    #[serde(default)]
    pub repos: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// Organisation (or user) owning the watched repositories.
    #[serde(default)]
    pub org: String,
    /// Name of the environment variable holding the API token.
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Base URL used by `kickoff remote`.
    #[serde(default = "default_control_url")]
    pub url: String,
    /// Listen address for `kickoff serve`.
    #[serde(default = "default_bind")]
    pub bind: String,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/kickoff/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub timer: TimerConfig,
    #[serde(default)]
    pub watcher: WatcherConfig,
    #[serde(default)]
    pub github: GitHubConfig,
    #[serde(default)]
    pub control: ControlConfig,
}

// Default functions
fn default_duration_hours() -> u64 {
    24
}
fn default_endpoint() -> String {
    "http://localhost:3001/api/commits".into()
}
fn default_interval_secs() -> u64 {
    10
}
fn default_toast_duration_ms() -> u64 {
    4500
}
fn default_token_env() -> String {
    "GITHUB_TOKEN".into()
}
fn default_api_base() -> String {
    "https://api.github.com".into()
}
fn default_control_url() -> String {
    "http://localhost:3001".into()
}
fn default_bind() -> String {
    "127.0.0.1:3001".into()
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            default_duration_hours: default_duration_hours(),
        }
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            interval_secs: default_interval_secs(),
            toast_duration_ms: default_toast_duration_ms(),
            repos: Vec::new(),
        }
    }
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            org: String::new(),
            token_env: default_token_env(),
            api_base: default_api_base(),
        }
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            url: default_control_url(),
            bind: default_bind(),
        }
    }
}

impl TimerConfig {
    pub fn default_duration(&self) -> Duration {
        Duration::from_secs(self.default_duration_hours.saturating_mul(3600))
    }
}

impl WatcherConfig {
    /// Poll interval, never shorter than one second.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn toast_duration(&self) -> Duration {
        Duration::from_millis(self.toast_duration_ms)
    }
}

impl GitHubConfig {
    /// Token read from the configured environment variable, if set and non-empty.
    pub fn token(&self) -> Option<String> {
        std::env::var(&self.token_env)
            .ok()
            .filter(|token| !token.trim().is_empty())
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_some() {
                current = current
                    .get_mut(part)
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
                continue;
            }

            let obj = current
                .as_object_mut()
                .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
            let existing = obj
                .get(part)
                .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;

            let new_value = match existing {
                serde_json::Value::Bool(_) => serde_json::Value::Bool(
                    value
                        .parse::<bool>()
                        .map_err(|e| invalid(e.to_string()))?,
                ),
                serde_json::Value::Number(_) => value
                    .parse::<u64>()
                    .map(|n| serde_json::Value::Number(n.into()))
                    .map_err(|_| invalid(format!("cannot parse '{value}' as a non-negative integer")))?,
                serde_json::Value::Array(_) => {
                    // Accept either a JSON array or a comma-separated list.
                    if value.trim_start().starts_with('[') {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    } else {
                        serde_json::Value::Array(
                            value
                                .split(',')
                                .map(str::trim)
                                .filter(|item| !item.is_empty())
                                .map(|item| serde_json::Value::String(item.to_string()))
                                .collect(),
                        )
                    }
                }
                serde_json::Value::Object(_) => {
                    serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                }
                _ => serde_json::Value::String(value.into()),
            };

            obj.insert(part.to_string(), new_value);
            return Ok(());
        }

        Err(ConfigError::UnknownKey(key.to_string()))
    }

    fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk, writing the defaults when no file exists yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        match std::fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path,
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save()?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path,
                message: e.to_string(),
            }),
        }
    }

    /// Persist to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::path()?;
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&path, content).map_err(|e| ConfigError::SaveFailed {
            path,
            message: e.to_string(),
        })
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key without saving.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Set a config value by key and save.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.apply(key, value)?;
        self.save()
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.timer.default_duration_hours, 24);
        assert_eq!(parsed.watcher.interval_secs, 10);
        assert!(parsed.watcher.repos.is_empty());
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let parsed: Config = toml::from_str("[watcher]\nrepos = [\"alpha\", \"beta\"]\n").unwrap();
        assert_eq!(parsed.watcher.repos, vec!["alpha", "beta"]);
        assert_eq!(parsed.watcher.toast_duration_ms, 4500);
        assert_eq!(parsed.github.token_env, "GITHUB_TOKEN");
        assert_eq!(parsed.control.url, "http://localhost:3001");
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("timer.default_duration_hours").as_deref(), Some("24"));
        assert_eq!(cfg.get("github.api_base").as_deref(), Some("https://api.github.com"));
        assert!(cfg.get("timer.missing_key").is_none());
        assert!(cfg.get("").is_none());
    }

    #[test]
    fn apply_updates_number_and_string() {
        let mut cfg = Config::default();
        cfg.apply("watcher.interval_secs", "30").unwrap();
        cfg.apply("github.org", "hack-org").unwrap();
        assert_eq!(cfg.watcher.interval_secs, 30);
        assert_eq!(cfg.github.org, "hack-org");
    }

    #[test]
    fn apply_accepts_comma_separated_repos() {
        let mut cfg = Config::default();
        cfg.apply("watcher.repos", "CodeX, VisionX,,Alpha").unwrap();
        assert_eq!(cfg.watcher.repos, vec!["CodeX", "VisionX", "Alpha"]);

        cfg.apply("watcher.repos", r#"["Re_Core"]"#).unwrap();
        assert_eq!(cfg.watcher.repos, vec!["Re_Core"]);
    }

    #[test]
    fn apply_rejects_unknown_key() {
        let mut cfg = Config::default();
        let err = cfg.apply("watcher.nonexistent", "1").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownKey(_)));
    }

    #[test]
    fn apply_rejects_invalid_number() {
        let mut cfg = Config::default();
        let err = cfg.apply("watcher.interval_secs", "-5").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
        assert_eq!(cfg.watcher.interval_secs, 10);
    }

    #[test]
    fn interval_is_never_zero() {
        let mut cfg = Config::default();
        cfg.watcher.interval_secs = 0;
        assert_eq!(cfg.watcher.interval(), Duration::from_secs(1));
        assert_eq!(cfg.timer.default_duration(), Duration::from_secs(24 * 3600));
    }
}
