use std::path::Path;

use serde::{Deserialize, Serialize};

pub const DEFAULT_STREAM_CHANNEL: &str = "search_stream";
pub const ENV_STREAM_CHANNEL: &str = "SEEK_STREAM_CHANNEL";
pub const ENV_CACHE_TTL_SECS: &str = "SEEK_CACHE_TTL_SECS";
pub const ENV_LOG: &str = "SEEK_LOG";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Event channel the search backend publishes stream items on.
    pub stream_channel: String,
    pub listing_cache_ttl_secs: u64,
    pub listing_cache_capacity: u64,
    /// Default `tracing` filter directive when no env override is present.
    pub log_filter: String,
    pub search_result_limit: Option<usize>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            stream_channel: DEFAULT_STREAM_CHANNEL.to_string(),
            listing_cache_ttl_secs: 300,
            listing_cache_capacity: 256,
            log_filter: "warn".to_string(),
            search_result_limit: Some(10_000),
        }
    }
}

impl Settings {
    /// Reads settings from a JSON file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "config file missing, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                })
            }
        };

        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(channel) = lookup(ENV_STREAM_CHANNEL) {
            let channel = channel.trim();
            if channel.is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: ENV_STREAM_CHANNEL,
                    value: channel.to_string(),
                });
            }
            self.stream_channel = channel.to_string();
        }

        if let Some(raw) = lookup(ENV_CACHE_TTL_SECS) {
            self.listing_cache_ttl_secs =
                raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    key: ENV_CACHE_TTL_SECS,
                    value: raw.clone(),
                })?;
        }

        if let Some(filter) = lookup(ENV_LOG) {
            if !filter.trim().is_empty() {
                self.log_filter = filter.trim().to_string();
            }
        }

        Ok(self)
    }
}
