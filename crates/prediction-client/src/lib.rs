//! Client library for the Google Prediction API
//!
//! This crate provides:
//! - ClientLogin authentication
//! - Training submission and status polling
//! - Predictions for text, numeric and numeric-vector inputs
//! - Metrics and structured logging for every call
//!
//! ```no_run
//! use google_prediction::{obtain_auth_token, PredictionClient, Reply};
//!
//! # async fn run() -> google_prediction::Result<()> {
//! let token = obtain_auth_token("foo@gmail.com", "password").await?;
//! let predictor = PredictionClient::new(token, "bucket", "object");
//!
//! predictor.train().await?;
//! if let Reply::Success(label) = predictor.predict("awesome company").await? {
//!     println!("{label}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod login;
pub mod models;
pub mod observability;

pub use client::{
    invoke_training, prediction, training_status, PredictionClient, PredictionClientBuilder,
};
pub use crate::config::ClientConfig;
pub use error::{PredictionError, Result};
pub use login::{extract_auth_token, obtain_auth_token, obtain_auth_token_with, ClientLogin};
pub use models::*;
pub use observability::{ClientMetrics, Outcome, RequestLogger};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
