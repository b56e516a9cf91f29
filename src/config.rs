//! Configuration for the behavior tracker.

use crate::client::ClientConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration file contents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Batcher settings
    #[serde(default)]
    pub tracker: TrackerConfig,

    /// Activity endpoint
    #[serde(default)]
    pub endpoint: ClientConfig,

    /// User to attribute activity to
    #[serde(default)]
    pub user_id: Option<String>,
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults if it is missing.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content).map_err(ConfigError::Parse)?;
        config.tracker.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("behavior-tracker")
            .join("config.json")
    }
}

/// Settings for one batcher instance. Fixed for its lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Queue length that triggers a flush
    pub batch_size: usize,

    /// Period of the flush timer; zero disables it
    #[serde(rename = "flush_interval_ms", with = "millis_serde")]
    pub flush_interval: Duration,

    /// Minimum spacing between accepted high-frequency events of one type
    #[serde(rename = "throttle_ms", with = "millis_serde")]
    pub throttle: Duration,

    /// Hard cap on pending events; the oldest is evicted beyond it
    pub max_pending: usize,

    /// Which signals to track
    pub toggles: TrackingToggles,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            flush_interval: Duration::from_secs(30),
            throttle: Duration::from_millis(250),
            max_pending: 1000,
            toggles: TrackingToggles::default(),
        }
    }
}

impl TrackerConfig {
    /// Check the value constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid(
                "batch_size must be at least 1".to_string(),
            ));
        }
        if self.max_pending < self.batch_size {
            return Err(ConfigError::Invalid(format!(
                "max_pending ({}) must not be below batch_size ({})",
                self.max_pending, self.batch_size
            )));
        }
        Ok(())
    }
}

/// Per-signal tracking switches.
///
/// Mouse movement, scrolling and keyboard are off by default for privacy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingToggles {
    pub page_views: bool,
    pub clicks: bool,
    pub mouse_movement: bool,
    pub scrolling: bool,
    pub keyboard: bool,
}

impl Default for TrackingToggles {
    fn default() -> Self {
        Self {
            page_views: true,
            clicks: true,
            mouse_movement: false,
            scrolling: false,
            keyboard: false,
        }
    }
}

impl TrackingToggles {
    /// Everything off.
    pub fn none() -> Self {
        Self {
            page_views: false,
            clicks: false,
            mouse_movement: false,
            scrolling: false,
            keyboard: false,
        }
    }

    /// Everything on.
    pub fn all() -> Self {
        Self {
            page_views: true,
            clicks: true,
            mouse_movement: true,
            scrolling: true,
            keyboard: true,
        }
    }

    /// Parse toggles from a comma-separated string.
    pub fn from_csv(s: &str) -> Self {
        let names: Vec<String> = s.split(',').map(|s| s.trim().to_lowercase()).collect();

        Self {
            page_views: Self::named(&names, &["page_views", "pages"]),
            clicks: Self::named(&names, &["clicks", "click"]),
            mouse_movement: Self::named(&names, &["mouse", "mouse_movement"]),
            scrolling: Self::named(&names, &["scroll", "scrolling"]),
            keyboard: Self::named(&names, &["keyboard", "keys"]),
        }
    }

    fn named(names: &[String], aliases: &[&str]) -> bool {
        names
            .iter()
            .any(|n| n == "all" || aliases.contains(&n.as_str()))
    }

    /// Check if at least one signal is enabled.
    pub fn any_enabled(&self) -> bool {
        self.page_views || self.clicks || self.mouse_movement || self.scrolling || self.keyboard
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(serde_json::Error),
    #[error("Serialize error: {0}")]
    Serialize(serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Serde support for Duration as whole milliseconds.
mod millis_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
