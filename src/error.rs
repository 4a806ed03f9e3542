//! Error types shared by the request model, the debug client and storage.

use std::collections::BTreeMap;

use thiserror::Error;

/// A request definition, body, hook or validator that can't be built or sent.
///
/// Local variants are raised before anything reaches the network;
/// `Rejected` carries a 400 answer from the backend.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("validator has no comparator key")]
    MissingComparator,
    #[error("validator sets more than one comparator: {0:?}")]
    MultipleComparators(Vec<String>),
    #[error("unknown comparator `{0}`")]
    UnknownComparator(String),
    #[error("validator `{comparator}` expects a [check, expect] pair")]
    MalformedValidator { comparator: String },
    #[error("body of type `{kind}` cannot carry {found} content")]
    BodyContentMismatch { kind: String, found: &'static str },
    #[error("unknown body type `{0}`")]
    UnknownBodyType(String),
    #[error("invalid hook: {0}")]
    InvalidHook(String),
    #[error("request URL is empty")]
    EmptyUrl,
    #[error("URL `{0}` is relative and no environment was given to resolve it")]
    RelativeUrlWithoutEnvironment(String),
    #[error("{field} entry #{index} has an empty key")]
    EmptyKey { field: &'static str, index: usize },
    #[error("invalid field `{field}`: {reason}")]
    InvalidField { field: String, reason: String },
    #[error("backend rejected the request: {message}")]
    Rejected {
        message: String,
        fields: BTreeMap<String, Vec<String>>,
    },
}

/// Errors surfaced by the debug client.
///
/// A backend that was reached but failed to execute the request does not
/// produce an `ApiError`; that outcome is a `DebugResult` with an error status.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("not found: {message}")]
    NotFound { message: String },
    #[error("not authorized: {message}")]
    Unauthorized { message: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("request to the execution backend timed out")]
    Timeout,
    #[error("backend returned {status}: {message}")]
    Server { status: u16, message: String },
    #[error("failed to parse backend response: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else if err.is_decode() {
            ApiError::Parse(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

/// Failures of the durable key/value storage behind the tab store.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage I/O failed for `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("SQLite storage failed: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("failed to serialize session state: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("storage lock poisoned")]
    Poisoned,
}
