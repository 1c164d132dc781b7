use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use thiserror::Error;

use crate::sort::Column;

/// Errors returned by the local platform REST client.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a response (connection refused, timeout, ...).
    #[error("Network error: {0}")]
    Network(String),
    /// The backend answered with a non-2xx status.
    #[error("{message} (HTTP {status})")]
    Status { status: StatusCode, message: String },
    /// A 2xx body that is not the JSON we expected.
    #[error("Malformed response: {0}")]
    Malformed(String),
    #[error("Invalid request URL: {0}")]
    Url(String),
}

impl ApiError {
    /// Text shown to the user in a notification.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Status { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("Filter start {start} is after end {end}")]
    Inverted {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SortError {
    #[error("Sort spec needs at least one column")]
    NoColumns,
    #[error("Column '{0}' is not part of this table")]
    UnknownColumn(Column),
    #[error("Unknown column name '{0}'")]
    UnknownColumnName(String),
}
