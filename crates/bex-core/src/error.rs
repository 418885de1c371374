//! Error types for bex-core.

use thiserror::Error;

/// Result type alias for bex-core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur while building or querying a backlog.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A content level (or the whole backlog) declares no work item types.
    #[error("cannot build content without a work item type hierarchy")]
    EmptyHierarchy,

    /// A required well-known field is missing from a record.
    #[error("work item {id} has no '{field}' defined")]
    MissingField { id: u64, field: &'static str },

    /// A queued absent-parent fetch returned no record for this id, or a
    /// placeholder survived tree construction. The remote dataset
    /// contradicts its own link graph.
    #[error("work item {0} was registered as an expected parent but was never resolved")]
    UnresolvedPlaceholder(u64),

    /// An item was used as a resolved record while still pending.
    #[error("work item {0} is still a pending placeholder")]
    PendingItem(u64),

    /// A query spec names zero or several of wiql / id / name.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// The caller-supplied fetch callback failed.
    #[error("fetching work items failed: {0}")]
    Fetch(String),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
