//! Error types for the tracking-service client.

use thiserror::Error;

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur while talking to the tracking service.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The service answered with a non-success status.
    #[error("service returned {status} for {url}")]
    Status { status: u16, url: String },

    /// A stored query name did not match any query in the project.
    #[error("no stored query named '{0}' found")]
    QueryNotFound(String),

    /// HTTP transport error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The access token cannot be turned into an HTTP header.
    #[error("invalid authorization header: {0}")]
    Header(#[from] reqwest::header::InvalidHeaderValue),

    /// A URL pattern failed to compile.
    #[error("invalid url pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// JSON parsing error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error (cache file handling).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Core model error.
    #[error(transparent)]
    Core(#[from] bex_core::CoreError),
}
