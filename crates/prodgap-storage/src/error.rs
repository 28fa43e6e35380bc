use prodgap_common::error::ParseEnumError;
use prodgap_common::CoreError;

/// Errors that can occur within the storage layer.
///
/// # Examples
///
/// ```rust
/// use prodgap_storage::StorageError;
///
/// let err = StorageError::NotFound {
///     entity: "equipment",
///     id: "SEP-99".to_string(),
/// };
/// assert!(err.to_string().contains("equipment"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A required record was not found in the database.
    #[error("Storage: {entity} not found (id={id})")]
    NotFound { entity: &'static str, id: String },

    /// An underlying SQLite error.
    #[error("Storage: SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// JSON serialization or deserialization failure (details/analysis columns).
    #[error("Storage: JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A text column held a value that is not a known enum variant.
    #[error("Storage: invalid value in column '{column}': {source}")]
    InvalidValue {
        column: &'static str,
        source: ParseEnumError,
    },

    /// A stored row violates an invariant, e.g. a threshold with no scope.
    #[error("Storage: invalid {entity} row (id={id}): {reason}")]
    InvalidRow {
        entity: &'static str,
        id: String,
        reason: &'static str,
    },

    /// Creating the data directory failed.
    #[error("Storage: I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StorageError> for CoreError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound { entity, id } => CoreError::NotFound { entity, id },
            other => CoreError::Storage(other.to_string()),
        }
    }
}

/// Convenience `Result` alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
