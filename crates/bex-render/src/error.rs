//! Error types for rendering and exporting.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for render operations.
pub type Result<T> = std::result::Result<T, RenderError>;

/// Errors that can occur while rendering or writing an export.
#[derive(Debug, Error)]
pub enum RenderError {
    /// No template is configured for a work item type present in the tree.
    #[error("could not find template \"{0}\"")]
    MissingTemplate(String),

    /// The destination exists and overwriting was not allowed.
    #[error(
        "output '{0}' already exists; pass --overwrite or set overwrite on the output config"
    )]
    OutputExists(PathBuf),

    /// The destination's parent directory is missing and mkdir was not
    /// allowed.
    #[error("output folder '{0}' does not exist; create it or set mkdir on the output config")]
    OutputDirMissing(PathBuf),

    /// No registered exporter matched the output.
    #[error("no exporter found for {0}")]
    NoExporter(String),

    /// A URL pattern failed to compile.
    #[error("invalid url pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// IO error while writing the export.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Core model error.
    #[error(transparent)]
    Core(#[from] bex_core::CoreError),

    /// Client error while resolving attachments.
    #[error(transparent)]
    Client(#[from] bex_client::ClientError),
}
