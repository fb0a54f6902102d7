//! Client configuration module
//!
//! Settings shared by every model a client opens: the session id it
//! identifies itself with, how long requests may take, and how many events
//! a subscriber may fall behind before it starts losing them.
//!
//! Configuration can be assembled with [`ClientConfig::builder`], read from
//! `XFCOLLAB_*` environment variables, or parsed from a TOML document:
//!
//! ```toml
//! session_id = "session-a"
//! request_timeout_ms = 5000
//! event_capacity = 64
//! ```

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Default request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default broadcast channel capacity
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Session id this client identifies itself with
    pub session_id: String,
    /// How long to wait for a response before failing a request
    pub request_timeout: Duration,
    /// Capacity of model and commit-status event channels
    pub event_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl ClientConfig {
    /// Create a new ClientConfigBuilder
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session_id.trim().is_empty() {
            return Err(ConfigError::MissingValue("session_id"));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::invalid("request_timeout", "must be greater than zero"));
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::invalid("event_capacity", "must be greater than zero"));
        }
        Ok(())
    }

    /// Read `XFCOLLAB_SESSION_ID`, `XFCOLLAB_REQUEST_TIMEOUT_MS` and
    /// `XFCOLLAB_EVENT_CAPACITY`, falling back to defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`ClientConfig::from_env`] with a custom variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut builder = Self::builder();

        if let Some(session_id) = lookup("XFCOLLAB_SESSION_ID") {
            builder = builder.session_id(session_id);
        }
        if let Some(timeout) = lookup("XFCOLLAB_REQUEST_TIMEOUT_MS") {
            let millis = timeout
                .parse::<u64>()
                .map_err(|_| ConfigError::invalid("XFCOLLAB_REQUEST_TIMEOUT_MS", timeout.clone()))?;
            builder = builder.request_timeout(Duration::from_millis(millis));
        }
        if let Some(capacity) = lookup("XFCOLLAB_EVENT_CAPACITY") {
            let capacity = capacity
                .parse::<usize>()
                .map_err(|_| ConfigError::invalid("XFCOLLAB_EVENT_CAPACITY", capacity.clone()))?;
            builder = builder.event_capacity(capacity);
        }

        builder.build()
    }

    /// Parse a TOML document; missing keys take their defaults
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;

        let mut builder = Self::builder();
        if let Some(session_id) = file.session_id {
            builder = builder.session_id(session_id);
        }
        if let Some(millis) = file.request_timeout_ms {
            builder = builder.request_timeout(Duration::from_millis(millis));
        }
        if let Some(capacity) = file.event_capacity {
            builder = builder.event_capacity(capacity);
        }
        builder.build()
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    session_id: Option<String>,
    request_timeout_ms: Option<u64>,
    event_capacity: Option<usize>,
}

/// Builder for ClientConfig
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    session_id: Option<String>,
    request_timeout: Option<Duration>,
    event_capacity: Option<usize>,
}

impl ClientConfigBuilder {
    /// Set the session id
    pub fn session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Set the request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Set the event channel capacity
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = Some(capacity);
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<ClientConfig, ConfigError> {
        let defaults = ClientConfig::default();
        let config = ClientConfig {
            session_id: self.session_id.unwrap_or(defaults.session_id),
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
            event_capacity: self.event_capacity.unwrap_or(defaults.event_capacity),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Configuration errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
    #[error("missing value: {0}")]
    MissingValue(&'static str),
    #[error("invalid configuration file: {0}")]
    Parse(String),
}

impl ConfigError {
    fn invalid(field: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            value: value.into(),
        }
    }
}
