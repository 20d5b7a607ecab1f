//! TaskPing configuration system.
//!
//! Loaded from `~/.taskping/config.toml`, then overridden from the
//! environment, then validated. A process must not start the scheduler
//! or accept traffic with an invalid configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, TaskPingError};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskPingConfig {
    #[serde(default)]
    pub channel: ChannelConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl TaskPingConfig {
    /// Load config from the default path (~/.taskping/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(TaskPingError::ConfigNotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| TaskPingError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| TaskPingError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Save config to the given path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| TaskPingError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the TaskPing home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".taskping")
    }

    /// Overlay values from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Overlay values from an arbitrary lookup (the environment in production).
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(v) = get("TWILIO_ACCOUNT_SID") {
            self.channel.account_sid = v;
        }
        if let Some(v) = get("TWILIO_AUTH_TOKEN") {
            self.channel.auth_token = v;
        }
        if let Some(v) = get("TWILIO_PHONE_NUMBER") {
            self.channel.from_number = v;
        }
        if let Some(v) = get("TASKPING_CHANNEL") {
            self.channel.provider = v;
        }
        if let Some(v) = get("TASKPING_STORE_PATH") {
            self.store.path = v;
        }
    }

    /// Reject configurations the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        match self.channel.provider.as_str() {
            "twilio" => {
                if self.channel.account_sid.is_empty() {
                    missing.push("channel.account_sid (TWILIO_ACCOUNT_SID)");
                }
                if self.channel.auth_token.is_empty() {
                    missing.push("channel.auth_token (TWILIO_AUTH_TOKEN)");
                }
                if self.channel.from_number.is_empty() {
                    missing.push("channel.from_number (TWILIO_PHONE_NUMBER)");
                }
            }
            "log" => {}
            other => {
                return Err(TaskPingError::config(format!(
                    "unknown channel provider '{other}' (expected 'twilio' or 'log')"
                )));
            }
        }
        if self.store.path.trim().is_empty() {
            missing.push("store.path (TASKPING_STORE_PATH)");
        }
        if !missing.is_empty() {
            return Err(TaskPingError::config(format!(
                "missing required settings: {}",
                missing.join(", ")
            )));
        }
        if self.scheduler.tick_secs == 0 {
            return Err(TaskPingError::config("scheduler.tick_secs must be at least 1"));
        }
        if self.scheduler.max_concurrent_dispatch == 0 {
            return Err(TaskPingError::config(
                "scheduler.max_concurrent_dispatch must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Notification channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// `twilio` or `log` (dry run).
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub account_sid: String,
    #[serde(default)]
    pub auth_token: String,
    /// Sender number, E.164.
    #[serde(default)]
    pub from_number: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_provider() -> String { "twilio".into() }
fn default_api_base() -> String { "https://api.twilio.com".into() }
fn default_timeout_secs() -> u64 { 10 }

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            account_sid: String::new(),
            auth_token: String::new(),
            from_number: String::new(),
            api_base: default_api_base(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Data store configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the JSON snapshot of users and tasks. `~` is expanded.
    #[serde(default)]
    pub path: String,
}

impl StoreConfig {
    pub fn expanded_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.path).to_string())
    }
}

/// Scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// How often the clock loop checks for due jobs.
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
    /// Upper bound on concurrent sends within one campaign.
    #[serde(default = "default_max_concurrent_dispatch")]
    pub max_concurrent_dispatch: usize,
    /// Number of recent delivery attempts kept in memory.
    #[serde(default = "default_history_size")]
    pub history_size: usize,
    /// Register the daily/weekly/hourly sweeps on start.
    #[serde(default = "bool_true")]
    pub enable_builtin_jobs: bool,
}

fn default_tick_secs() -> u64 { 30 }
fn default_max_concurrent_dispatch() -> usize { 4 }
fn default_history_size() -> usize { 100 }
fn bool_true() -> bool { true }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_secs: default_tick_secs(),
            max_concurrent_dispatch: default_max_concurrent_dispatch(),
            history_size: default_history_size(),
            enable_builtin_jobs: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn valid_config() -> TaskPingConfig {
        let mut config = TaskPingConfig::default();
        config.channel.account_sid = "AC123".into();
        config.channel.auth_token = "secret".into();
        config.channel.from_number = "+15550000000".into();
        config.store.path = "~/.taskping/snapshot.json".into();
        config
    }

    #[test]
    fn test_default_config() {
        let config = TaskPingConfig::default();
        assert_eq!(config.channel.provider, "twilio");
        assert_eq!(config.channel.api_base, "https://api.twilio.com");
        assert_eq!(config.scheduler.tick_secs, 30);
        assert_eq!(config.scheduler.max_concurrent_dispatch, 4);
        assert!(config.scheduler.enable_builtin_jobs);
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
            [channel]
            provider = "log"

            [store]
            path = "/var/lib/taskping/snapshot.json"

            [scheduler]
            tick_secs = 5
            enable_builtin_jobs = false
        "#;

        let config: TaskPingConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.channel.provider, "log");
        assert_eq!(config.scheduler.tick_secs, 5);
        assert!(!config.scheduler.enable_builtin_jobs);
        assert_eq!(config.scheduler.history_size, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_missing_fields_use_defaults() {
        let config: TaskPingConfig = toml::from_str("").unwrap();
        assert_eq!(config.channel.timeout_secs, 10);
        assert!(config.store.path.is_empty());
    }

    #[test]
    fn test_missing_credentials_rejected() {
        let err = TaskPingConfig::default().validate().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("TWILIO_ACCOUNT_SID"));
        assert!(msg.contains("TWILIO_AUTH_TOKEN"));
        assert!(msg.contains("store.path"));
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let mut config = valid_config();
        config.channel.provider = "carrier-pigeon".into();
        assert!(matches!(config.validate(), Err(TaskPingError::Config(_))));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("TWILIO_ACCOUNT_SID", "AC999"),
            ("TWILIO_AUTH_TOKEN", "tok"),
            ("TWILIO_PHONE_NUMBER", "+15551234567"),
            ("TASKPING_STORE_PATH", "/tmp/snap.json"),
            ("TASKPING_CHANNEL", ""),
        ]);
        let mut config = TaskPingConfig::default();
        config.apply_env_from(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.channel.account_sid, "AC999");
        assert_eq!(config.channel.from_number, "+15551234567");
        assert_eq!(config.channel.provider, "twilio");
        assert_eq!(config.store.path, "/tmp/snap.json");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        valid_config().save_to(&path).unwrap();
        let loaded = TaskPingConfig::load_from(&path).unwrap();
        assert_eq!(loaded.channel.account_sid, "AC123");
        assert!(TaskPingConfig::load_from(&dir.path().join("nope.toml")).is_err());
    }

    #[test]
    fn test_home_dir() {
        let home = TaskPingConfig::home_dir();
        assert!(home.to_string_lossy().contains("taskping"));
    }
}
