//! Error types for the prediction client

use crate::models::RemoteError;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, PredictionError>;

/// Failures that abort a call before a normalized reply can be produced.
///
/// Error envelopes sent by the service are *not* represented here; they come
/// back as [`crate::Reply::Remote`]. The one exception is
/// [`PredictionError::Remote`], which only appears when a caller opts in via
/// [`crate::Reply::into_result`].
#[derive(Debug, Error)]
pub enum PredictionError {
    /// ClientLogin answered without an `Auth=` line
    #[error("auth token not found in ClientLogin response{}", describe_challenge(.error, .captcha_url))]
    AuthTokenNotFound {
        /// Value of the `Error=` line, e.g. `CaptchaRequired` or `BadAuthentication`
        error: Option<String>,
        /// Value of the `CaptchaUrl=` line
        captcha_url: Option<String>,
        /// Value of the `CaptchaToken=` line
        captcha_token: Option<String>,
    },

    /// Transport-level failure (DNS, connect, TLS, timeout)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Submission shape not accepted by `predict`
    #[error("invalid input kind: {0}")]
    InvalidInputKind(String),

    #[error("invalid request URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// Non-JSON body returned with a non-success status
    #[error("unexpected HTTP status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// Non-JSON body returned with a success status
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Success envelope missing the field the operation extracts
    #[error("response is missing field `{0}`")]
    MissingField(&'static str),

    #[error("remote error: {0}")]
    Remote(RemoteError),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl PredictionError {
    /// Returns true if the request timed out at the transport layer
    pub fn is_timeout(&self) -> bool {
        matches!(self, PredictionError::Network(e) if e.is_timeout())
    }

    /// Returns true if ClientLogin asked for interactive verification
    pub fn is_captcha_challenge(&self) -> bool {
        matches!(
            self,
            PredictionError::AuthTokenNotFound { captcha_url: Some(_), .. }
        )
    }
}

fn describe_challenge(error: &Option<String>, captcha_url: &Option<String>) -> String {
    match (error, captcha_url) {
        (Some(e), Some(url)) => format!(" ({}, captcha at {})", e, url),
        (Some(e), None) => format!(" ({})", e),
        (None, Some(url)) => format!(" (captcha at {})", url),
        (None, None) => String::new(),
    }
}
