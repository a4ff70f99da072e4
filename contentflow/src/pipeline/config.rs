//! Pipeline configuration.

use super::RetryConfig;
use crate::events::EventBus;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Environment variable overriding [`PipelineConfig::name`].
pub const ENV_PIPELINE_NAME: &str = "CONTENTFLOW_PIPELINE_NAME";
/// Environment variable overriding [`PipelineConfig::default_max_retries`].
pub const ENV_MAX_RETRIES: &str = "CONTENTFLOW_MAX_RETRIES";
/// Environment variable overriding the retry base delay, in milliseconds.
pub const ENV_RETRY_BASE_MS: &str = "CONTENTFLOW_RETRY_BASE_MS";
/// Environment variable overriding the retry delay cap, in milliseconds.
pub const ENV_RETRY_MAX_MS: &str = "CONTENTFLOW_RETRY_MAX_MS";
/// Environment variable overriding [`PipelineConfig::event_queue_size`].
pub const ENV_EVENT_QUEUE_SIZE: &str = "CONTENTFLOW_EVENT_QUEUE_SIZE";

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file '{path}': {source}")]
    Io {
        /// The file path.
        path: String,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The config document is malformed.
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    /// An environment override could not be parsed.
    #[error("invalid value '{value}' for {key}")]
    InvalidOverride {
        /// The variable name.
        key: String,
        /// The offending value.
        value: String,
    },
}

fn default_name() -> String {
    "content-pipeline".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_event_queue_size() -> usize {
    1024
}

/// Configuration shared by every run of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline name, carried on every event.
    #[serde(default = "default_name")]
    pub name: String,
    /// Retries granted to retryable commands that declare `max_retries() == 0`.
    #[serde(default = "default_max_retries")]
    pub default_max_retries: u32,
    /// Backoff settings for the default retry strategy.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Queue size for an [`EventBus`](crate::events::EventBus) built from this config.
    #[serde(default = "default_event_queue_size")]
    pub event_queue_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            default_max_retries: default_max_retries(),
            retry: RetryConfig::default(),
            event_queue_size: default_event_queue_size(),
        }
    }
}

impl PipelineConfig {
    /// Creates a config with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the default retry count.
    #[must_use]
    pub fn with_default_max_retries(mut self, retries: u32) -> Self {
        self.default_max_retries = retries;
        self
    }

    /// Sets the retry config.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the event queue size.
    #[must_use]
    pub fn with_event_queue_size(mut self, size: usize) -> Self {
        self.event_queue_size = size;
        self
    }

    /// Creates an [`EventBus`] sized by `event_queue_size`.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn event_bus(&self) -> EventBus {
        EventBus::new(self.event_queue_size)
    }

    /// Parses a JSON document. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the document is malformed.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a JSON config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&contents)
    }

    /// Applies `CONTENTFLOW_*` environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOverride`] if a numeric variable does not parse.
    pub fn apply_env_overrides(self) -> Result<Self, ConfigError> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOverride`] if a numeric variable does not parse.
    pub fn apply_overrides_from<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(name) = lookup(ENV_PIPELINE_NAME) {
            self.name = name;
        }
        if let Some(retries) = parse_override(&lookup, ENV_MAX_RETRIES)? {
            self.default_max_retries = retries;
        }
        if let Some(base) = parse_override(&lookup, ENV_RETRY_BASE_MS)? {
            self.retry.base_delay_ms = base;
        }
        if let Some(max) = parse_override(&lookup, ENV_RETRY_MAX_MS)? {
            self.retry.max_delay_ms = max;
        }
        if let Some(size) = parse_override(&lookup, ENV_EVENT_QUEUE_SIZE)? {
            self.event_queue_size = size;
        }
        Ok(self)
    }
}

fn parse_override<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidOverride {
                key: key.to_string(),
                value,
            }),
    }
}
