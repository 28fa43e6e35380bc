use prodgap_common::CoreError;

/// Errors returned by vendor adapters.
///
/// # Examples
///
/// ```rust
/// use prodgap_adapters::error::AdapterError;
///
/// let err = AdapterError::Unsupported {
///     adapter: "ec_rest".to_string(),
///     capability: "facility_kpis",
/// };
/// assert!(err.to_string().contains("facility_kpis"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// The adapter exists but does not implement this capability.
    #[error("{adapter} does not support {capability}")]
    Unsupported {
        adapter: String,
        capability: &'static str,
    },

    /// No adapter is configured for the capability.
    #[error("no {0} adapter configured")]
    NotConfigured(&'static str),

    /// Non-2xx status code from the vendor API.
    #[error("{adapter} API HTTP error: status={status}, body={body}")]
    Http {
        adapter: String,
        status: u16,
        body: String,
    },

    /// An underlying HTTP transport error from `reqwest`.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON serialization or deserialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Adapter configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AdapterError {
    pub fn unsupported(adapter: &str, capability: &'static str) -> Self {
        Self::Unsupported {
            adapter: adapter.to_string(),
            capability,
        }
    }

    /// Name of the upstream system the error is attributed to.
    pub fn system(&self) -> &str {
        match self {
            Self::Unsupported { adapter, .. } | Self::Http { adapter, .. } => adapter,
            Self::NotConfigured(capability) => capability,
            Self::Network(_) | Self::Json(_) | Self::Config(_) => "upstream",
        }
    }
}

impl From<AdapterError> for CoreError {
    fn from(e: AdapterError) -> Self {
        match e {
            AdapterError::Config(msg) => CoreError::Configuration(msg),
            other => CoreError::UpstreamUnavailable {
                system: other.system().to_string(),
                reason: other.to_string(),
            },
        }
    }
}

/// Convenience type alias so callers can write `error::Result<T>`.
pub type Result<T> = std::result::Result<T, AdapterError>;
