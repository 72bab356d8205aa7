//! Configuration management for Freshet.
//!
//! Configuration is read from `~/.config/freshet/config.toml` at startup and
//! resolved once into a plain [`Config`] value that is passed by reference
//! into the engine. If the file doesn't exist, a default configuration with
//! comments is created. Missing fields fall back to compiled-in defaults.

use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

/// Default polling interval for feeds whose cadence cannot be inferred.
pub const DEFAULT_POLLING_INTERVAL: i64 = 60 * 15;

/// Main configuration struct.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Polling interval in seconds assigned to feeds when estimation fails.
    pub default_interval_secs: i64,
    /// Maximum number of remembered entry identity tokens per feed.
    pub feed_cache_size: usize,
    /// Items older than this (seconds since receipt) are dropped by purge.
    pub item_max_age_secs: i64,
    /// Maximum length of a sanitized item title.
    pub title_max_len: usize,
    /// Maximum length of a sanitized item description.
    pub body_max_len: usize,
    /// Maximum number of feeds fetched concurrently in one cycle.
    pub max_workers: usize,
    /// HTTP request timeout in seconds.
    pub timeout_secs: u64,
    /// User-Agent header sent with every request.
    pub user_agent: String,
    /// Optional HTTP proxy URL applied to all requests.
    pub proxy_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_interval_secs: DEFAULT_POLLING_INTERVAL,
            feed_cache_size: 500,
            item_max_age_secs: 60 * 60 * 24,
            title_max_len: 120,
            body_max_len: 400,
            max_workers: 10,
            timeout_secs: 10,
            user_agent: format!("freshet/{}", env!("CARGO_PKG_VERSION")),
            proxy_url: None,
        }
    }
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// If the config file doesn't exist, creates a default one with comments.
    /// If the config file exists but is invalid, returns an error.
    /// Missing fields in the config file will use default values.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::default_config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path).map_err(|e| ConfigError::Io {
            path: config_path.clone(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: config_path,
            source: e,
        })?;

        Ok(config)
    }

    /// Get the default config file path: `~/.config/freshet/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("freshet").join("config.toml"))
    }

    /// Get the default snapshot file path: `~/.local/share/freshet/feeds.json`
    pub fn default_data_path() -> Result<PathBuf, ConfigError> {
        let data_dir = dirs::data_dir().ok_or(ConfigError::NoDataDir)?;
        let freshet_dir = data_dir.join("freshet");
        fs::create_dir_all(&freshet_dir).map_err(|e| ConfigError::Io {
            path: freshet_dir.clone(),
            source: e,
        })?;
        Ok(freshet_dir.join("feeds.json"))
    }

    /// Directory under which site icons are cached.
    pub fn icon_cache_dir() -> Result<PathBuf, ConfigError> {
        let data_dir = dirs::data_dir().ok_or(ConfigError::NoDataDir)?;
        Ok(data_dir.join("freshet").join("icons"))
    }

    /// Create a default config file with comments.
    fn create_default_config(path: &PathBuf) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let default_config = Self::default_config_content();

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.clone(),
            source: e,
        })?;

        file.write_all(default_config.as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.clone(),
                source: e,
            })?;

        Ok(())
    }

    /// Generate the default config file content with comments.
    fn default_config_content() -> String {
        format!(
            r##"# Freshet Configuration

# Polling interval (seconds) for feeds whose cadence cannot be inferred
default_interval_secs = 900

# Remembered entry identities per feed, for deduplication
feed_cache_size = 500

# Items older than this many seconds are dropped by `freshet purge`
item_max_age_secs = 86400

# Maximum lengths of sanitized item text
title_max_len = 120
body_max_len = 400

# Maximum number of feeds fetched concurrently in one update cycle
max_workers = 10

# HTTP request timeout in seconds
timeout_secs = 10

# User-Agent header sent with every request
user_agent = "freshet/{}"

# Uncomment to route all requests through an HTTP proxy
# proxy_url = "http://127.0.0.1:8118"
"##,
            env!("CARGO_PKG_VERSION")
        )
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Could not determine data directory")]
    NoDataDir,

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
