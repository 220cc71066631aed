//! Configuration management for Estuary.
//!
//! Configuration is read from `~/.config/estuary/config.toml` at startup.
//! If the file doesn't exist, a default configuration with comments is created.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Main configuration struct.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub sync: SyncConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file. Defaults to `<data dir>/estuary/estuary.db`.
    pub db_path: Option<PathBuf>,
    /// Storage budget in bytes used for quota accounting. Unset disables it.
    pub quota_bytes: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub interval_minutes: u64,
    pub batch_size: usize,
    pub request_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 30,
            batch_size: 5,
            request_timeout_secs: 10,
            user_agent: format!("estuary/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl SyncConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub max_total_articles: usize,
    pub deleted_feed_retention_days: i64,
    pub warning_percent: f64,
    pub critical_percent: f64,
    pub maintenance_interval_minutes: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_total_articles: 1000,
            deleted_feed_retention_days: 7,
            warning_percent: 80.0,
            critical_percent: 90.0,
            maintenance_interval_minutes: 60,
        }
    }
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// If the config file doesn't exist, creates a default one with comments.
    /// Missing fields in the config file will use default values.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::default_config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            Self::create_default_config(config_path)?;
            return Ok(Self::default());
        }

        let content = fs::read_to_string(config_path).map_err(|e| ConfigError::Io {
            path: config_path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: config_path.to_path_buf(),
            source: e,
        })
    }

    /// Get the default config file path: `~/.config/estuary/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("estuary").join("config.toml"))
    }

    fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })
    }

    fn default_config_content() -> &'static str {
        r##"# Estuary configuration

[storage]
# Database location. Defaults to the platform data directory.
# db_path = "/home/me/.local/share/estuary/estuary.db"

# Storage budget in bytes. Quota checks and emergency cleanup are
# disabled while this is unset.
# quota_bytes = 52428800

[sync]
# Minutes between background refreshes (daemon mode)
interval_minutes = 30

# Feeds refreshed concurrently per batch
batch_size = 5

# Per-request HTTP timeout in seconds
request_timeout_secs = 10

[cache]
# Upper bound on stored articles across all feeds
max_total_articles = 1000

# Days an unsubscribed feed is kept before it is purged with its articles
deleted_feed_retention_days = 7

# Quota percentages that trigger a warning and emergency cleanup
warning_percent = 80.0
critical_percent = 90.0

# Minutes between maintenance runs (daemon mode)
maintenance_interval_minutes = 60
"##
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_deserializes() {
        let config: Config = toml::from_str(Config::default_config_content())
            .expect("Default config should be valid TOML");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_config() {
        let content = r##"
[sync]
batch_size = 8

[storage]
quota_bytes = 1048576
"##;
        let config: Config = toml::from_str(content).expect("Partial config should work");

        assert_eq!(config.sync.batch_size, 8);
        assert_eq!(config.storage.quota_bytes, Some(1_048_576));
        // untouched values fall back to defaults
        assert_eq!(config.sync.interval_minutes, 30);
        assert_eq!(config.cache.max_total_articles, 1000);
    }

    #[test]
    fn test_empty_config() {
        let config: Config = toml::from_str("").expect("Empty config should work");
        assert_eq!(config, Config::default());
        assert!(config.storage.db_path.is_none());
        assert_eq!(config.sync.request_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_load_writes_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("estuary").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config, Config::default());
        assert!(path.exists());

        // second load parses the written file
        assert_eq!(Config::load_from(&path).unwrap(), Config::default());
    }

    #[test]
    fn test_invalid_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[sync]\nbatch_size = \"many\"\n").unwrap();

        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
