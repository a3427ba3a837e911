//! Configuration for the search analytics connector.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default quiet period before a report is pushed.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(3000);

/// Main configuration for the connector and its command-line tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Quiet period after the last render before reporting (milliseconds on disk)
    #[serde(with = "duration_millis")]
    pub delay: Duration,

    /// Report immediately on user interaction and on teardown
    pub trigger_on_ui_interaction: bool,

    /// Path for storing report statistics
    pub data_path: PathBuf,

    /// Analytics endpoint for the HTTP sink
    pub endpoint: Option<String>,

    /// Bearer token for the HTTP sink
    pub token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("search-analytics-connector");

        Self {
            delay: DEFAULT_DELAY,
            trigger_on_ui_interaction: false,
            data_path: data_dir,
            endpoint: None,
            token: None,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults if it does not exist.
    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content =
                std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to `path`.
    pub fn save_to(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("search-analytics-connector")
            .join("config.json")
    }

    /// Path of the persisted report statistics.
    pub fn stats_path(&self) -> PathBuf {
        self.data_path.join("report_stats.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration as whole milliseconds.
mod duration_millis {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.delay, Duration::from_millis(3000));
        assert!(!config.trigger_on_ui_interaction);
        assert!(config.endpoint.is_none());
        assert!(config.stats_path().ends_with("report_stats.json"));
    }

    #[test]
    fn test_delay_serialized_in_millis() {
        let config = Config {
            delay: Duration::from_millis(750),
            ..Config::default()
        };
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["delay"], 750);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"trigger_on_ui_interaction": true}"#).unwrap();
        assert!(config.trigger_on_ui_interaction);
        assert_eq!(config.delay, DEFAULT_DELAY);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let path = std::env::temp_dir()
            .join(format!("search-analytics-config-{}", uuid::Uuid::new_v4()))
            .join("config.json");

        let config = Config {
            delay: Duration::from_millis(1200),
            trigger_on_ui_interaction: true,
            endpoint: Some("http://127.0.0.1:9000/events".to_string()),
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.delay, Duration::from_millis(1200));
        assert!(loaded.trigger_on_ui_interaction);
        assert_eq!(loaded.endpoint, config.endpoint);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_missing_file_loads_defaults() {
        let path = std::env::temp_dir().join("search-analytics-config-missing/config.json");
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.delay, DEFAULT_DELAY);
    }
}
