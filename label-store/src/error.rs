//! Error types for the label store

use thiserror::Error;

/// Storage-layer error types
///
/// Empty results are not errors: allocation and most reads report "nothing
/// there" as `Ok(None)` or an empty vec.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Import reconciliation referenced a name the project does not hold
    #[error("no image named {original_name} in project {project_id}")]
    NotFound {
        project_id: i64,
        original_name: String,
    },

    /// A stored label payload failed to parse on read
    #[error("malformed label payload on image {image_id}")]
    MalformedLabel {
        image_id: i64,
        #[source]
        source: serde_json::Error,
    },

    /// Transient store failure; propagated unchanged for the caller to retry
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;
