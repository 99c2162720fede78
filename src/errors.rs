// src/errors.rs
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::tracking::TrackingState;

/// Main error type for the ride-tracker crate.
///
/// The polling path never surfaces these to callers; fetch failures are
/// classified into [`TrackingState`] values instead. Errors are returned from
/// setup operations (starting a session, loading configuration, building
/// HTTP clients) and from one-shot helpers.
#[derive(Debug, Error)]
pub enum TrackingError {
    // Validation errors
    #[error("Validation failed: {} errors", .0.len())]
    ValidationFailed(Vec<ValidationError>),
    #[error("Invalid value '{value}' for field '{field}': {reason}")]
    InvalidFieldValue { field: String, value: String, reason: String },

    // Network and HTTP client errors
    #[error("Network request timed out")]
    NetworkTimeout,
    #[error("Network connection error: {0}")]
    NetworkConnection(String),
    #[error("HTTP client error: {0}")]
    HttpClient(String),
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    // Serialization and parsing errors
    #[error("JSON parsing error: {0}")]
    JsonParsing(String),
    #[error("JSON serialization error: {0}")]
    JsonSerialization(String),
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
    #[error("Malformed location payload: {0}")]
    MalformedPayload(String),

    // Configuration and setup errors
    #[error("Missing environment variable: {0}")]
    MissingEnvironmentVariable(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    // Session lifecycle errors
    #[error("No tracking session has been started")]
    NoActiveSession,
    #[error("Tracking cannot be retried from state {0:?}")]
    RetryNotAllowed(TrackingState),
    #[error("Tracking task failed: {0}")]
    TaskFailed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

// Convenience type alias for Results
pub type TrackingResult<T> = Result<T, TrackingError>;

impl From<reqwest::Error> for TrackingError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TrackingError::NetworkTimeout
        } else if err.is_connect() {
            TrackingError::NetworkConnection(err.to_string())
        } else if err.is_decode() {
            TrackingError::JsonParsing(err.to_string())
        } else {
            TrackingError::HttpClient(err.to_string())
        }
    }
}

impl From<serde_json::Error> for TrackingError {
    fn from(err: serde_json::Error) -> Self {
        // decode failures, including type mismatches, are parse errors
        if err.is_syntax() || err.is_eof() || err.is_data() {
            TrackingError::JsonParsing(err.to_string())
        } else {
            TrackingError::JsonSerialization(err.to_string())
        }
    }
}

impl From<chrono::ParseError> for TrackingError {
    fn from(err: chrono::ParseError) -> Self {
        TrackingError::InvalidFormat(format!("Invalid date/time format: {}", err))
    }
}

impl From<tokio::task::JoinError> for TrackingError {
    fn from(err: tokio::task::JoinError) -> Self {
        TrackingError::TaskFailed(err.to_string())
    }
}

// Helper functions for creating common errors
impl TrackingError {
    pub fn validation_error(field: impl Into<String>, message: impl Into<String>) -> Self {
        TrackingError::ValidationFailed(vec![ValidationError {
            field: field.into(),
            message: message.into(),
        }])
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        TrackingError::InvalidConfiguration(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        TrackingError::MalformedPayload(msg.into())
    }

    /// True for failures that a later poll may not repeat (timeouts, refused
    /// connections, unexpected 5xx).
    pub fn is_transient(&self) -> bool {
        match self {
            TrackingError::NetworkTimeout | TrackingError::NetworkConnection(_) => true,
            TrackingError::UnexpectedStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
