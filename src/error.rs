//! Typed errors for the seams where callers branch on the failure kind.
//!
//! Store and loader plumbing returns `anyhow::Result`; the types here cover
//! task-service responses, composite keys and rule URLs.

use thiserror::Error;

/// Classification of a failed task-service call.
///
/// A call either yields a decoded payload or one of these; callers never
/// see a half-decoded response.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The service answered 404 for the requested resource.
    #[error("resource not found")]
    NotFound,

    /// Any other non-200 status.
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    /// A 200 response whose content type is not JSON.
    #[error("unsupported content type {0:?}")]
    ContentType(String),

    /// A JSON body that does not match the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(#[source] serde_json::Error),

    /// Connection, timeout or protocol failure before a status was received.
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),
}

impl ApiError {
    /// True when the service reported the resource as missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound)
    }
}

/// Result of a task-service call.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// A mirror relation key that is not of the form `src:{source}:dst:{mirror}`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid mirror relation key {0:?}")]
pub struct RelationKeyError(pub String);

/// Why a folder/list/team reference could not be read from a rule URL.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UrlRefError {
    #[error("failed to parse url {url:?}: {reason}")]
    Malformed { url: String, reason: String },

    #[error("url {url:?} has no {segment} segment")]
    MissingSegment { url: String, segment: &'static str },

    #[error("url {url:?} is not a {expected} url")]
    WrongKind { url: String, expected: &'static str },

    #[error("url {url:?} has a non-numeric {segment} id {value:?}")]
    NotNumeric {
        url: String,
        segment: &'static str,
        value: String,
    },
}
