//! HTTP client for the Google Prediction API
//!
//! Every operation is a single request:
//! - builds the URL for the configured dataset
//! - attaches the `GoogleLogin` authorization header
//! - parses the JSON reply and splits it into success or remote error

use crate::config::ClientConfig;
use crate::error::{PredictionError, Result};
use crate::models::{
    AuthToken, DatasetRef, RemoteError, Reply, Submission, TrainRequest, TrainingAck,
    TrainingStatus,
};
use crate::observability::{operations, Outcome, RequestLogger};
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;
use std::time::Instant;
use tracing::debug;
use url::Url;

/// `<prefix>?data=<bucket>%2F<object>`
pub fn training_url(prefix: &str, dataset: &DatasetRef) -> String {
    format!("{}?data={}", prefix, dataset.encoded())
}

/// `<prefix>/<bucket>%2F<object>`
pub fn status_url(prefix: &str, dataset: &DatasetRef) -> String {
    format!("{}/{}", prefix, dataset.encoded())
}

/// `<prefix>/<bucket>%2F<object>/predict`
pub fn predict_url(prefix: &str, dataset: &DatasetRef) -> String {
    format!("{}/{}/predict", prefix, dataset.encoded())
}

/// Client bound to one auth token and one dataset
///
/// Immutable after construction; clones share the underlying HTTP client.
#[derive(Clone)]
pub struct PredictionClient {
    http: Client,
    config: ClientConfig,
    token: AuthToken,
    dataset: DatasetRef,
    logger: RequestLogger,
}

impl PredictionClient {
    /// Create a client with the default configuration. Performs no I/O.
    pub fn new(
        token: impl Into<AuthToken>,
        bucket: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            http: Client::new(),
            config: ClientConfig::default(),
            token: token.into(),
            dataset: DatasetRef::new(bucket, object),
            logger: RequestLogger::default(),
        }
    }

    /// Create a client with custom endpoints and timeouts
    pub fn with_config(
        token: impl Into<AuthToken>,
        bucket: impl Into<String>,
        object: impl Into<String>,
        config: ClientConfig,
    ) -> Result<Self> {
        PredictionClientBuilder::new(token, bucket, object)
            .config(config)
            .build()
    }

    pub fn builder(
        token: impl Into<AuthToken>,
        bucket: impl Into<String>,
        object: impl Into<String>,
    ) -> PredictionClientBuilder {
        PredictionClientBuilder::new(token, bucket, object)
    }

    pub fn token(&self) -> &AuthToken {
        &self.token
    }

    pub fn bucket(&self) -> &str {
        self.dataset.bucket()
    }

    pub fn object(&self) -> &str {
        self.dataset.object()
    }

    pub fn dataset(&self) -> &DatasetRef {
        &self.dataset
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Start training on the dataset
    ///
    /// Returns as soon as the service accepted the job; poll
    /// [`PredictionClient::check_training_status`] to follow it.
    pub async fn train(&self) -> Result<Reply<TrainingAck>> {
        let url = parse_url(training_url(&self.config.training_url, &self.dataset))?;
        let request = self.http.post(url).json(&TrainRequest::default());

        self.call(operations::TRAIN, request, normalize_training)
            .await
    }

    /// Fetch the current training status
    pub async fn check_training_status(&self) -> Result<Reply<TrainingStatus>> {
        let url = parse_url(status_url(&self.config.training_url, &self.dataset))?;
        let request = self.http.get(url);

        self.call(operations::TRAINING_STATUS, request, normalize_status)
            .await
    }

    /// Request a label for a submission
    pub async fn predict(&self, submission: impl Into<Submission>) -> Result<Reply<String>> {
        let submission = submission.into();
        let url = parse_url(predict_url(&self.config.training_url, &self.dataset))?;
        let request = self.http.post(url).json(&submission.to_request());

        self.call(operations::PREDICT, request, normalize_prediction)
            .await
    }

    /// Request a label for a dynamically typed submission
    ///
    /// Accepts a JSON string, an integer or an array of numbers. Anything else
    /// fails with [`PredictionError::InvalidInputKind`] before a request is built.
    pub async fn predict_value(&self, submission: Value) -> Result<Reply<String>> {
        let submission = Submission::try_from(submission)?;
        self.predict(submission).await
    }

    async fn call<T>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
        normalize: fn(Value) -> Result<Reply<T>>,
    ) -> Result<Reply<T>> {
        let dataset = self.dataset.path();
        debug!(operation = %operation, dataset = %dataset, "Sending prediction API request");

        let started = Instant::now();
        let response = self.round_trip(request).await;
        let elapsed = started.elapsed().as_secs_f64();

        let status = response.as_ref().ok().map(|(status, _)| status.as_u16());
        let reply = response.and_then(|(status, body)| parse_body(status, &body).and_then(normalize));

        let outcome = match &reply {
            Ok(Reply::Success(_)) => Outcome::Success,
            Ok(Reply::Remote(_)) => Outcome::RemoteError,
            Err(_) => Outcome::Failure,
        };
        self.logger
            .log_completed(operation, Some(&dataset), status, elapsed, outcome);

        reply
    }

    async fn round_trip(&self, request: RequestBuilder) -> Result<(StatusCode, String)> {
        let response = request
            .header(AUTHORIZATION, self.token.authorization_header())
            .timeout(self.config.request_timeout())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        Ok((status, body))
    }
}

/// Builder for [`PredictionClient`]
pub struct PredictionClientBuilder {
    config: ClientConfig,
    token: AuthToken,
    dataset: DatasetRef,
    http: Option<Client>,
}

impl PredictionClientBuilder {
    pub fn new(
        token: impl Into<AuthToken>,
        bucket: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            config: ClientConfig::default(),
            token: token.into(),
            dataset: DatasetRef::new(bucket, object),
            http: None,
        }
    }

    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the training URL prefix
    pub fn training_url(mut self, url: impl Into<String>) -> Self {
        self.config.training_url = url.into();
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn connect_timeout_secs(mut self, secs: u64) -> Self {
        self.config.connect_timeout_secs = secs;
        self
    }

    /// Use a preconfigured HTTP client instead of building one
    pub fn http_client(mut self, http: Client) -> Self {
        self.http = Some(http);
        self
    }

    pub fn build(self) -> Result<PredictionClient> {
        let http = match self.http {
            Some(http) => http,
            None => Client::builder()
                .connect_timeout(self.config.connect_timeout())
                .timeout(self.config.request_timeout())
                .build()?,
        };

        Ok(PredictionClient {
            http,
            config: self.config,
            token: self.token,
            dataset: self.dataset,
            logger: RequestLogger::default(),
        })
    }
}

fn parse_url(url: String) -> Result<Url> {
    Url::parse(&url).map_err(|source| PredictionError::InvalidUrl { url, source })
}

/// Decode a response body; the error envelope arrives with a non-2xx status
fn parse_body(status: StatusCode, body: &str) -> Result<Value> {
    match serde_json::from_str(body) {
        Ok(value) => Ok(value),
        Err(_) if !status.is_success() => Err(PredictionError::UnexpectedStatus {
            status: status.as_u16(),
            body: body.to_string(),
        }),
        Err(e) => Err(PredictionError::Decode(e)),
    }
}

/// `data` when present and non-null
fn data_field(response: &Value) -> Option<&Value> {
    response.get("data").filter(|data| !data.is_null())
}

fn normalize_training(response: Value) -> Result<Reply<TrainingAck>> {
    if data_field(&response).is_some() {
        Ok(Reply::Success(TrainingAck::from_raw(response)))
    } else {
        Ok(Reply::Remote(RemoteError::from_raw(response)))
    }
}

fn normalize_status(response: Value) -> Result<Reply<TrainingStatus>> {
    match data_field(&response) {
        Some(data) => {
            let modelinfo = data.get("modelinfo").cloned().unwrap_or(Value::Null);
            Ok(Reply::Success(TrainingStatus::from(modelinfo)))
        }
        None => Ok(Reply::Remote(RemoteError::from_raw(response))),
    }
}

fn normalize_prediction(response: Value) -> Result<Reply<String>> {
    match data_field(&response) {
        Some(data) => data
            .pointer("/output/output_label")
            .and_then(Value::as_str)
            .map(|label| Reply::Success(label.to_string()))
            .ok_or(PredictionError::MissingField("data.output.output_label")),
        None => Ok(Reply::Remote(RemoteError::from_raw(response))),
    }
}

/// Start training with a one-off client
pub async fn invoke_training(
    token: impl Into<AuthToken>,
    bucket: impl Into<String>,
    object: impl Into<String>,
) -> Result<Reply<TrainingAck>> {
    PredictionClient::new(token, bucket, object).train().await
}

/// Check training status with a one-off client
pub async fn training_status(
    token: impl Into<AuthToken>,
    bucket: impl Into<String>,
    object: impl Into<String>,
) -> Result<Reply<TrainingStatus>> {
    PredictionClient::new(token, bucket, object)
        .check_training_status()
        .await
}

/// Request a prediction with a one-off client
pub async fn prediction(
    token: impl Into<AuthToken>,
    bucket: impl Into<String>,
    object: impl Into<String>,
    submission: impl Into<Submission>,
) -> Result<Reply<String>> {
    PredictionClient::new(token, bucket, object)
        .predict(submission)
        .await
}
