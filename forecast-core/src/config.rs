use anyhow::{Context, Result, anyhow, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};

use crate::{client::ClientOptions, retry::RetryPolicy};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";

/// Environment variable that overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "FORECAST_CONFIG";

/// Longest accepted refresh interval, one week.
pub const MAX_REFRESH_INTERVAL_MINS: u64 = 7 * 24 * 60;

/// Top-level configuration stored on disk. Every field is optional;
/// accessors fill in defaults.
///
/// Example TOML:
/// ```toml
/// base_url = "https://weather.example.org"
/// max_attempts = 3
/// cache_max_age_hours = 12
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    pub base_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub max_attempts: Option<u32>,
    pub initial_backoff_ms: Option<u64>,
    pub max_backoff_ms: Option<u64>,
    pub cache_max_age_hours: Option<i64>,
    pub refresh_interval_mins: Option<u64>,
    /// Directory for cached responses; platform cache dir when absent.
    pub cache_dir: Option<PathBuf>,
}

impl Config {
    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(15))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.unwrap_or(5),
            initial_backoff: Duration::from_millis(self.initial_backoff_ms.unwrap_or(1_000)),
            max_backoff: Duration::from_millis(self.max_backoff_ms.unwrap_or(10_000)),
            request_timeout: self.request_timeout(),
        }
    }

    pub fn cache_max_age(&self) -> chrono::Duration {
        chrono::Duration::try_hours(self.cache_max_age_hours.unwrap_or(24))
            .unwrap_or(chrono::Duration::MAX)
    }

    pub fn refresh_interval(&self) -> Duration {
        let mins = self.refresh_interval_mins.unwrap_or(30).min(MAX_REFRESH_INTERVAL_MINS);
        Duration::from_secs(mins * 60)
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            policy: self.retry_policy(),
            cache_max_age: self.cache_max_age(),
        }
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.cache_dir {
            return Ok(dir.clone());
        }
        Ok(Self::project_dirs()?.cache_dir().to_path_buf())
    }

    /// Reject values that would make the client unusable.
    pub fn validate(&self) -> Result<()> {
        let base = self.base_url();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            bail!("base_url must start with http:// or https://, got '{base}'");
        }
        if self.max_attempts == Some(0) {
            bail!("max_attempts must be at least 1");
        }
        if self.request_timeout_secs == Some(0) {
            bail!("request_timeout_secs must be at least 1");
        }
        if self
            .refresh_interval_mins
            .is_some_and(|m| !(1..=MAX_REFRESH_INTERVAL_MINS).contains(&m))
        {
            bail!("refresh_interval_mins must be between 1 and {MAX_REFRESH_INTERVAL_MINS}");
        }
        if self.cache_max_age_hours.is_some_and(|h| h < 0) {
            bail!("cache_max_age_hours cannot be negative");
        }
        if self
            .cache_max_age_hours
            .is_some_and(|h| chrono::Duration::try_hours(h).is_none())
        {
            bail!("cache_max_age_hours is too large");
        }
        if self.initial_backoff_ms.unwrap_or(1_000) > self.max_backoff_ms.unwrap_or(10_000) {
            bail!("initial_backoff_ms cannot exceed max_backoff_ms");
        }
        Ok(())
    }

    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg = Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let cfg: Config = toml::from_str(contents)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file, honouring `FORECAST_CONFIG`.
    pub fn config_file_path() -> Result<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("dev", "forecast", "forecast-cli")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))
    }
}
