//! Client configuration

use crate::error::Result;
use serde::Deserialize;
use std::time::Duration;

/// Base URL of the training resource
pub const DEFAULT_TRAINING_URL: &str = "https://www.googleapis.com/prediction/v1/training";

/// Google ClientLogin endpoint
pub const DEFAULT_LOGIN_URL: &str = "https://www.google.com/accounts/ClientLogin";

/// Application identifier sent as `source` during ClientLogin
pub const DEFAULT_SOURCE: &str = "companyName-applicationName-versionID";

/// Client configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClientConfig {
    /// Prefix for the train, status and predict URLs
    #[serde(default = "default_training_url")]
    pub training_url: String,

    /// ClientLogin endpoint
    #[serde(default = "default_login_url")]
    pub login_url: String,

    /// `source` form field for ClientLogin
    #[serde(default = "default_source")]
    pub source: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_training_url() -> String {
    DEFAULT_TRAINING_URL.to_string()
}

fn default_login_url() -> String {
    DEFAULT_LOGIN_URL.to_string()
}

fn default_source() -> String {
    DEFAULT_SOURCE.to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            training_url: default_training_url(),
            login_url: default_login_url(),
            source: default_source(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from `PREDICTION_*` environment variables
    ///
    /// Absent variables keep their defaults, e.g. `PREDICTION_TRAINING_URL`
    /// overrides only `training_url`.
    pub fn from_env() -> Result<Self> {
        Self::from_source(config::Environment::with_prefix("PREDICTION").try_parsing(true))
    }

    fn from_source<S>(source: S) -> Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let config = config::Config::builder().add_source(source).build()?;
        Ok(config.try_deserialize()?)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}
