use std::time::Duration;
use thiserror::Error;

/// Rejected at construction time; domain records never hold these values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("question text is empty")]
    EmptyQuestion,
    #[error("market id is empty")]
    EmptyMarketId,
    #[error("price {0} outside [0, 1]")]
    PriceOutOfRange(f64),
    #[error("volume {0} must be finite and non-negative")]
    InvalidVolume(f64),
    #[error("{field} = {value} outside [0, 1]")]
    ProbabilityOutOfRange { field: &'static str, value: f64 },
    #[error("confidence {0} outside [0, 100]")]
    ConfidenceOutOfRange(f64),
    #[error("{0} is not a finite number")]
    NotFinite(&'static str),
    #[error("profile id is empty")]
    EmptyProfileId,
    #[error("{field} = {value} is not a valid threshold")]
    InvalidThreshold { field: &'static str, value: f64 },
}

/// Why the decision model did not yield a usable prediction.
#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("model transport failed: {0}")]
    Transport(String),
    #[error("model call timed out after {0:?}")]
    Timeout(Duration),
    #[error("model returned no content")]
    EmptyResponse,
    #[error("model output is not JSON: {snippet:?}")]
    NotJson { snippet: String },
    #[error("model output looks truncated: {snippet:?}")]
    Truncated { snippet: String },
    #[error("model output violates the prediction schema: {source}")]
    Schema {
        #[source]
        source: serde_json::Error,
        snippet: String,
    },
    #[error("unknown action {0:?}")]
    UnknownAction(String),
    #[error("model output failed validation: {0}")]
    Invalid(#[from] ValidationError),
}

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("query on {table} failed: {source}")]
    Query {
        table: &'static str,
        #[source]
        source: sqlx::Error,
    },
    #[error("could not encode {table} row: {source}")]
    Encode {
        table: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("row in {table} is invalid: {reason}")]
    InvalidRow { table: &'static str, reason: String },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// One failed delivery: a single alert channel or a single order submission.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("{channel} request failed: {source}")]
    Http {
        channel: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{channel} answered with status {status}")]
    Status { channel: &'static str, status: u16 },
    #[error("order blocked by risk gate: {0}")]
    RiskRejected(String),
    #[error("execution failed: {0}")]
    Execution(String),
}

/// First 200 characters of model output, for error messages and logs.
pub fn snippet(raw: &str) -> String {
    raw.chars().take(200).collect()
}
