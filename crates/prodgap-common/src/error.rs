/// Error kinds shared by the graph, evaluator, storage and service layers.
///
/// The HTTP boundary maps these onto status codes: `NotFound` to 404,
/// `Validation` to 400, `UpstreamUnavailable` to a degraded payload and the
/// rest to 500.
///
/// # Examples
///
/// ```rust
/// use prodgap_common::CoreError;
///
/// let err = CoreError::not_found("equipment", "SEP-01");
/// assert!(err.to_string().contains("SEP-01"));
/// assert!(err.is_not_found());
/// ```
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoreError {
    /// A referenced entity id does not exist.
    #[error("{entity} not found (id={id})")]
    NotFound { entity: &'static str, id: String },

    /// Malformed input, e.g. a negative trace depth or an unknown enum value.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A stored configuration cannot be used, e.g. a threshold with no limits.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An external system (production database, historian, document store)
    /// could not serve the request.
    #[error("{system} unavailable: {reason}")]
    UpstreamUnavailable { system: String, reason: String },

    /// The persistence layer failed.
    #[error("storage failure: {0}")]
    Storage(String),
}

impl CoreError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Raised when a stored or submitted string is not a known enum value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl From<ParseEnumError> for CoreError {
    fn from(e: ParseEnumError) -> Self {
        CoreError::Validation(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
