//! Core data models for the prediction client

use crate::error::PredictionError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::fmt;

/// Status string reported while the remote job is still running
pub const STATUS_NOT_COMPLETED: &str = "Training has not completed";

/// Status string reported when training finished without cross-validation
pub const STATUS_NO_ESTIMATE: &str = "no estimate available";

/// Opaque ClientLogin token
///
/// The value is never printed by `Debug`; use [`AuthToken::expose`] to get it.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Raw token value
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Value for the `Authorization` header
    pub fn authorization_header(&self) -> String {
        format!("GoogleLogin auth={}", self.0)
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(<redacted>)")
    }
}

impl From<String> for AuthToken {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl From<&str> for AuthToken {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}

/// Location of the training data in Google Storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRef {
    bucket: String,
    object: String,
}

impl DatasetRef {
    pub fn new(bucket: impl Into<String>, object: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            object: object.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn object(&self) -> &str {
        &self.object
    }

    /// `bucket/object`
    pub fn path(&self) -> String {
        format!("{}/{}", self.bucket, self.object)
    }

    /// `bucket%2Fobject`; only the separator is escaped
    pub fn encoded(&self) -> String {
        format!("{}%2F{}", self.bucket, self.object)
    }
}

impl fmt::Display for DatasetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.object)
    }
}

/// Acknowledgement returned when training was accepted
///
/// Wraps the parsed response unmodified.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingAck {
    raw: Value,
}

impl TrainingAck {
    pub fn from_raw(raw: Value) -> Self {
        Self { raw }
    }

    /// The `data` object of the response
    pub fn data(&self) -> &Value {
        self.raw.get("data").unwrap_or(&Value::Null)
    }

    /// Dataset path echoed back by the service (`bucket/object`), if present
    pub fn dataset(&self) -> Option<&str> {
        self.raw.pointer("/data/data").and_then(Value::as_str)
    }

    /// The parsed response exactly as received
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn into_raw(self) -> Value {
        self.raw
    }
}

/// Structured error response sent by the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub errors: ErrorBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Individual error details in the order the service sent them
    #[serde(default)]
    pub errors: Vec<Value>,
    pub code: i64,
    pub message: String,
}

/// Remote-error payload: the full parsed response, untouched
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteError {
    raw: Value,
}

impl RemoteError {
    pub fn from_raw(raw: Value) -> Self {
        Self { raw }
    }

    /// The parsed response exactly as received
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn into_raw(self) -> Value {
        self.raw
    }

    /// Typed view of the response, if it has the documented envelope shape
    pub fn envelope(&self) -> Option<ErrorEnvelope> {
        serde_json::from_value(self.raw.clone()).ok()
    }

    pub fn code(&self) -> Option<i64> {
        self.raw.pointer("/errors/code").and_then(Value::as_i64)
    }

    pub fn message(&self) -> Option<&str> {
        self.raw.pointer("/errors/message").and_then(Value::as_str)
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code(), self.message()) {
            (Some(code), Some(message)) => write!(f, "{} ({})", message, code),
            (None, Some(message)) => f.write_str(message),
            _ => write!(f, "{}", self.raw),
        }
    }
}

/// Outcome of a call that reached the service and returned JSON
#[derive(Debug, Clone, PartialEq)]
pub enum Reply<T> {
    /// The service reported success; payload already extracted
    Success(T),
    /// The service reported failure (or sent an unexpected shape)
    Remote(RemoteError),
}

impl<T> Reply<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Reply::Success(_))
    }

    pub fn success(self) -> Option<T> {
        match self {
            Reply::Success(value) => Some(value),
            Reply::Remote(_) => None,
        }
    }

    pub fn remote_error(&self) -> Option<&RemoteError> {
        match self {
            Reply::Success(_) => None,
            Reply::Remote(err) => Some(err),
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Reply<U> {
        match self {
            Reply::Success(value) => Reply::Success(f(value)),
            Reply::Remote(err) => Reply::Remote(err),
        }
    }

    /// Treat a remote error envelope as a failure
    pub fn into_result(self) -> Result<T, PredictionError> {
        match self {
            Reply::Success(value) => Ok(value),
            Reply::Remote(err) => Err(PredictionError::Remote(err)),
        }
    }
}

/// Training state as reported in `modelinfo`
#[derive(Debug, Clone, PartialEq)]
pub enum TrainingStatus {
    /// "Training has not completed"
    NotCompleted,
    /// "no estimate available"
    NoEstimate,
    /// Cross-validated accuracy between 0 and 1; `raw` is `modelinfo` as sent
    Accuracy { value: f64, raw: Value },
    /// Anything else the service put in `modelinfo`, passed through as-is
    Unrecognized(Value),
}

impl TrainingStatus {
    /// Returns true once the remote job has finished
    pub fn is_complete(&self) -> bool {
        matches!(self, TrainingStatus::NoEstimate | TrainingStatus::Accuracy { .. })
    }

    pub fn accuracy(&self) -> Option<f64> {
        match self {
            TrainingStatus::Accuracy { value, .. } => Some(*value),
            _ => None,
        }
    }

    /// `modelinfo` as the service sent it
    pub fn as_value(&self) -> Value {
        match self {
            TrainingStatus::NotCompleted => Value::String(STATUS_NOT_COMPLETED.to_string()),
            TrainingStatus::NoEstimate => Value::String(STATUS_NO_ESTIMATE.to_string()),
            TrainingStatus::Accuracy { raw, .. } => raw.clone(),
            TrainingStatus::Unrecognized(value) => value.clone(),
        }
    }
}

impl From<Value> for TrainingStatus {
    fn from(modelinfo: Value) -> Self {
        match modelinfo {
            Value::String(s) if s == STATUS_NOT_COMPLETED => TrainingStatus::NotCompleted,
            Value::String(s) if s == STATUS_NO_ESTIMATE => TrainingStatus::NoEstimate,
            Value::String(s) => match s.trim().parse::<f64>() {
                Ok(value) if (0.0..=1.0).contains(&value) => TrainingStatus::Accuracy {
                    value,
                    raw: Value::String(s),
                },
                _ => TrainingStatus::Unrecognized(Value::String(s)),
            },
            Value::Number(n) => match n.as_f64() {
                Some(value) if (0.0..=1.0).contains(&value) => TrainingStatus::Accuracy {
                    value,
                    raw: Value::Number(n),
                },
                _ => TrainingStatus::Unrecognized(Value::Number(n)),
            },
            other => TrainingStatus::Unrecognized(other),
        }
    }
}

impl fmt::Display for TrainingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrainingStatus::NotCompleted => f.write_str(STATUS_NOT_COMPLETED),
            TrainingStatus::NoEstimate => f.write_str(STATUS_NO_ESTIMATE),
            TrainingStatus::Accuracy { raw, .. } | TrainingStatus::Unrecognized(raw) => match raw {
                Value::String(s) => f.write_str(s),
                other => write!(f, "{}", other),
            },
        }
    }
}

/// Input accepted by `predict`
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// Sent as `{"text": [value]}`
    Text(String),
    /// Sent as `{"numeric": [value]}`
    Number(i64),
    /// Sent as `{"numeric": values}`
    Numbers(Vec<Number>),
}

impl Submission {
    /// Request body for this submission
    pub fn to_request(&self) -> PredictRequest {
        let input = match self {
            Submission::Text(text) => PredictInput::Text(vec![text.clone()]),
            Submission::Number(n) => PredictInput::Numeric(vec![Number::from(*n)]),
            Submission::Numbers(values) => PredictInput::Numeric(values.clone()),
        };
        PredictRequest {
            data: PredictData { input },
        }
    }
}

impl From<&str> for Submission {
    fn from(text: &str) -> Self {
        Submission::Text(text.to_string())
    }
}

impl From<String> for Submission {
    fn from(text: String) -> Self {
        Submission::Text(text)
    }
}

impl From<i64> for Submission {
    fn from(n: i64) -> Self {
        Submission::Number(n)
    }
}

impl From<i32> for Submission {
    fn from(n: i32) -> Self {
        Submission::Number(n.into())
    }
}

impl From<u32> for Submission {
    fn from(n: u32) -> Self {
        Submission::Number(n.into())
    }
}

impl From<Vec<i64>> for Submission {
    fn from(values: Vec<i64>) -> Self {
        Submission::Numbers(values.into_iter().map(Number::from).collect())
    }
}

impl From<&[i64]> for Submission {
    fn from(values: &[i64]) -> Self {
        Submission::Numbers(values.iter().copied().map(Number::from).collect())
    }
}

impl TryFrom<Vec<f64>> for Submission {
    type Error = PredictionError;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        values
            .into_iter()
            .map(|v| {
                Number::from_f64(v).ok_or_else(|| {
                    PredictionError::InvalidInputKind(format!(
                        "numeric submission contains non-finite value {}",
                        v
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Submission::Numbers)
    }
}

impl TryFrom<Value> for Submission {
    type Error = PredictionError;

    /// String, then integral number, then array of numbers; anything else is rejected
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(text) => Ok(Submission::Text(text)),
            Value::Number(n) => n.as_i64().map(Submission::Number).ok_or_else(|| {
                PredictionError::InvalidInputKind(format!(
                    "submission must be a string, an integer or an array of numbers, got number {}",
                    n
                ))
            }),
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::Number(n) => Ok(n),
                    other => Err(PredictionError::InvalidInputKind(format!(
                        "numeric submission contains a {}",
                        kind_name(&other)
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Submission::Numbers),
            other => Err(PredictionError::InvalidInputKind(format!(
                "submission must be a string, an integer or an array of numbers, got {}",
                kind_name(&other)
            ))),
        }
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Body of the training request: `{"data": {}}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainRequest {
    pub data: Map<String, Value>,
}

/// Body of the prediction request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictRequest {
    pub data: PredictData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictData {
    pub input: PredictInput,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictInput {
    Text(Vec<String>),
    Numeric(Vec<Number>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dataset_paths() {
        let dataset = DatasetRef::new("mybucket", "language_id.txt");
        assert_eq!(dataset.path(), "mybucket/language_id.txt");
        assert_eq!(dataset.encoded(), "mybucket%2Flanguage_id.txt");
        assert_eq!(dataset.to_string(), "mybucket/language_id.txt");
    }

    #[test]
    fn test_auth_token_is_redacted() {
        let token = AuthToken::new("secret-token");
        assert_eq!(format!("{:?}", token), "AuthToken(<redacted>)");
        assert_eq!(token.expose(), "secret-token");
        assert_eq!(token.authorization_header(), "GoogleLogin auth=secret-token");
    }

    #[test]
    fn test_predict_bodies() {
        let text = serde_json::to_value(Submission::from("awesome company").to_request()).unwrap();
        assert_eq!(text, json!({"data": {"input": {"text": ["awesome company"]}}}));

        let number = serde_json::to_value(Submission::from(13).to_request()).unwrap();
        assert_eq!(number, json!({"data": {"input": {"numeric": [13]}}}));

        let numbers = serde_json::to_value(Submission::from(vec![3i64, 5, 7, 11]).to_request()).unwrap();
        assert_eq!(numbers, json!({"data": {"input": {"numeric": [3, 5, 7, 11]}}}));
    }

    #[test]
    fn test_predict_bodies_survive_encoding() {
        let requests = [
            Submission::from("awesome nonprofit").to_request(),
            Submission::from(13).to_request(),
            Submission::from(vec![3i64, 5, 7, 11]).to_request(),
        ];

        for request in requests {
            let encoded = serde_json::to_string(&request).unwrap();
            let decoded: PredictRequest = serde_json::from_str(&encoded).unwrap();
            assert_eq!(decoded, request);
        }
    }

    #[test]
    fn test_train_body() {
        let body = serde_json::to_string(&TrainRequest::default()).unwrap();
        assert_eq!(body, r#"{"data":{}}"#);
    }

    #[test]
    fn test_submission_from_value_dispatch() {
        assert_eq!(
            Submission::try_from(json!("awesome company")).unwrap(),
            Submission::Text("awesome company".to_string())
        );
        assert_eq!(Submission::try_from(json!(13)).unwrap(), Submission::Number(13));
        assert_eq!(
            Submission::try_from(json!([3, 5.5])).unwrap(),
            Submission::Numbers(vec![Number::from(3), Number::from_f64(5.5).unwrap()])
        );
    }

    #[test]
    fn test_submission_rejects_other_kinds() {
        for value in [
            json!(3.14),
            json!({"text": "x"}),
            json!(true),
            json!(null),
            json!([1, "two"]),
            json!(u64::MAX),
        ] {
            let err = Submission::try_from(value).unwrap_err();
            assert!(matches!(err, PredictionError::InvalidInputKind(_)));
        }
    }

    #[test]
    fn test_submission_rejects_non_finite_floats() {
        assert!(Submission::try_from(vec![1.0, f64::NAN]).is_err());
        assert_eq!(
            Submission::try_from(vec![0.5]).unwrap(),
            Submission::Numbers(vec![Number::from_f64(0.5).unwrap()])
        );
    }

    #[test]
    fn test_training_status_from_modelinfo() {
        assert_eq!(
            TrainingStatus::from(json!("Training has not completed")),
            TrainingStatus::NotCompleted
        );
        assert_eq!(
            TrainingStatus::from(json!("no estimate available")),
            TrainingStatus::NoEstimate
        );
        assert_eq!(
            TrainingStatus::from(json!("0.87")),
            TrainingStatus::Accuracy {
                value: 0.87,
                raw: json!("0.87")
            }
        );
        assert_eq!(TrainingStatus::from(json!(0.91)).accuracy(), Some(0.91));
        assert_eq!(
            TrainingStatus::from(json!("1.7")),
            TrainingStatus::Unrecognized(json!("1.7"))
        );
        assert_eq!(
            TrainingStatus::from(json!({"estimate": 1})),
            TrainingStatus::Unrecognized(json!({"estimate": 1}))
        );
    }

    #[test]
    fn test_training_status_helpers() {
        assert!(!TrainingStatus::NotCompleted.is_complete());
        assert!(TrainingStatus::NoEstimate.is_complete());
        let accuracy = TrainingStatus::from(json!(0.5));
        assert_eq!(accuracy.accuracy(), Some(0.5));
        assert_eq!(TrainingStatus::NotCompleted.as_value(), json!("Training has not completed"));
        assert_eq!(accuracy.as_value(), json!(0.5));
    }

    #[test]
    fn test_accuracy_keeps_modelinfo_as_sent() {
        let status = TrainingStatus::from(json!("0.870"));
        assert_eq!(status.accuracy(), Some(0.87));
        assert_eq!(status.as_value(), json!("0.870"));
        assert_eq!(status.to_string(), "0.870");

        let status = TrainingStatus::from(json!("0.87"));
        assert_eq!(status.as_value(), json!("0.87"));
    }

    #[test]
    fn test_training_ack_keeps_full_response() {
        let ack = TrainingAck::from_raw(json!({"data": {"data": "b/o", "id": "x"}}));
        assert_eq!(ack.dataset(), Some("b/o"));
        assert_eq!(ack.data(), &json!({"data": "b/o", "id": "x"}));
        assert_eq!(ack.raw(), &json!({"data": {"data": "b/o", "id": "x"}}));

        let empty = TrainingAck::from_raw(json!({"data": {}}));
        assert_eq!(empty.dataset(), None);
        assert_eq!(empty.data(), &json!({}));
    }

    #[test]
    fn test_remote_error_exposes_envelope() {
        let raw = json!({
            "errors": {
                "errors": [{"domain": "global", "reason": "invalid"}],
                "code": 400,
                "message": "Invalid Value"
            }
        });
        let err = RemoteError::from_raw(raw.clone());

        assert_eq!(err.code(), Some(400));
        assert_eq!(err.message(), Some("Invalid Value"));
        assert_eq!(err.to_string(), "Invalid Value (400)");
        let envelope = err.envelope().unwrap();
        assert_eq!(envelope.errors.errors.len(), 1);
        assert_eq!(err.into_raw(), raw);
    }

    #[test]
    fn test_remote_error_with_unexpected_shape() {
        let err = RemoteError::from_raw(json!({"unexpected": true}));
        assert!(err.envelope().is_none());
        assert_eq!(err.code(), None);
        assert_eq!(err.to_string(), r#"{"unexpected":true}"#);
    }

    #[test]
    fn test_reply_helpers() {
        let ok: Reply<i32> = Reply::Success(1);
        assert!(ok.is_success());
        assert_eq!(ok.clone().map(|v| v + 1), Reply::Success(2));
        assert_eq!(ok.into_result().unwrap(), 1);

        let remote: Reply<i32> = Reply::Remote(RemoteError::from_raw(json!({"errors": {}})));
        assert!(remote.remote_error().is_some());
        assert!(matches!(remote.into_result(), Err(PredictionError::Remote(_))));
    }
}
