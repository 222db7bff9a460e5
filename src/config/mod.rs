//! Configuration loading
//!
//! Settings come from a TOML file, every section and field optional, and are
//! then overridden by `BOSSWATCH_*` environment variables so webhook secrets
//! can stay out of the file.

use crate::alerts::message::{MessageFormatter, DEFAULT_UTC_OFFSET_HOURS};
use crate::collectors::snapshot_fetcher::{DEFAULT_RETRIES, DEFAULT_RETRY_DELAY};
use crate::error::ConfigError;
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub notify: NotifyConfig,
    pub monitor: MonitorConfig,
}

/// Where snapshots are fetched from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// JSON endpoint returning the boss and sword timers
    pub url: String,
    /// Per-request timeout
    pub timeout_seconds: u64,
    /// Attempts per poll cycle
    pub retries: u32,
    /// Delay between attempts
    pub retry_delay_seconds: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout_seconds: 10,
            retries: DEFAULT_RETRIES,
            retry_delay_seconds: DEFAULT_RETRY_DELAY.as_secs(),
        }
    }
}

/// Where alerts are posted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Webhook for boss alerts
    pub boss_webhook_url: String,
    /// Webhook for sword alerts, the boss webhook when unset
    pub sword_webhook_url: Option<String>,
    /// Role mentioned in every alert
    pub role_id: String,
    /// Per-request timeout
    pub timeout_seconds: u64,
    /// Rearm an alert whose delivery failed so the next poll sends it again
    pub redeliver_failed: bool,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            boss_webhook_url: String::new(),
            sword_webhook_url: None,
            role_id: String::new(),
            timeout_seconds: 10,
            redeliver_failed: true,
        }
    }
}

/// Poll loop and alert evaluation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Time between poll cycles
    pub poll_interval_seconds: u64,
    /// UTC offset used when rendering times in messages
    pub utc_offset_hours: i32,
    /// Send a one-time alert for entities with malformed records
    pub notify_invalid_records: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_seconds: 30,
            utc_offset_hours: DEFAULT_UTC_OFFSET_HOURS,
            notify_invalid_records: false,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ReadError` if the file cannot be read and
    /// `ConfigError::TomlError` if it is not valid configuration TOML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Override settings from `BOSSWATCH_*` environment variables
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Override settings from a variable lookup
    ///
    /// An empty sword webhook value clears the sword webhook.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("BOSSWATCH_SOURCE_URL") {
            debug!("Source URL overridden from environment");
            self.source.url = v;
        }
        if let Some(v) = lookup("BOSSWATCH_BOSS_WEBHOOK_URL") {
            debug!("Boss webhook overridden from environment");
            self.notify.boss_webhook_url = v;
        }
        if let Some(v) = lookup("BOSSWATCH_SWORD_WEBHOOK_URL") {
            debug!("Sword webhook overridden from environment");
            self.notify.sword_webhook_url = Some(v).filter(|url| !url.trim().is_empty());
        }
        if let Some(v) = lookup("BOSSWATCH_ROLE_ID") {
            self.notify.role_id = v;
        }
    }

    /// Check that the configuration can drive a monitor
    ///
    /// Webhook settings are only required when alerts are actually posted.
    pub fn validate(&self, dry_run: bool) -> Result<(), ConfigError> {
        if self.source.url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "source.url must be set".to_string(),
            ));
        }
        if self.source.retries == 0 {
            return Err(ConfigError::ValidationError(
                "source.retries must be at least 1".to_string(),
            ));
        }
        if self.source.timeout_seconds == 0 || self.notify.timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "timeouts must be at least 1 second".to_string(),
            ));
        }
        if self.monitor.poll_interval_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "monitor.poll_interval_seconds must be at least 1".to_string(),
            ));
        }
        if MessageFormatter::with_offset_hours(self.monitor.utc_offset_hours).is_none() {
            return Err(ConfigError::ValidationError(format!(
                "monitor.utc_offset_hours out of range: {}",
                self.monitor.utc_offset_hours
            )));
        }

        if !dry_run {
            if self.notify.boss_webhook_url.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "notify.boss_webhook_url must be set".to_string(),
                ));
            }
            if self.notify.role_id.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "notify.role_id must be set".to_string(),
                ));
            }
        }

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.monitor.poll_interval_seconds)
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.source.timeout_seconds)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.source.retry_delay_seconds)
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_secs(self.notify.timeout_seconds)
    }

    /// Message formatter for the configured UTC offset
    pub fn formatter(&self) -> Result<MessageFormatter, ConfigError> {
        MessageFormatter::with_offset_hours(self.monitor.utc_offset_hours).ok_or_else(|| {
            ConfigError::ValidationError(format!(
                "monitor.utc_offset_hours out of range: {}",
                self.monitor.utc_offset_hours
            ))
        })
    }
}
