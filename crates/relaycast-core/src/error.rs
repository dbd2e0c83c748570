use thiserror::Error;

/// Error taxonomy shared across the core subsystems (see module docs for the
/// propagation policy: only `ConfigMissing` is fatal at startup, everything
/// else is logged and rolled back to a consistent state by its caller).
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Configuration error: {0}")]
    ConfigMissing(String),

    #[error("Credential missing: {0}")]
    CredentialMissing(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Duplicate content")]
    DuplicateContent,

    #[error("Lost reservation race")]
    RaceLost,

    #[error("Storage busy: {0}")]
    StorageBusy(String),

    #[error("Storage corrupt: {0}")]
    StorageCorrupt(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelayError {
    /// Short error code, used in structured log fields.
    pub fn code(&self) -> &'static str {
        match self {
            RelayError::ConfigMissing(_) => "CONFIG_MISSING",
            RelayError::CredentialMissing(_) => "CREDENTIAL_MISSING",
            RelayError::UpstreamUnavailable(_) => "UPSTREAM_UNAVAILABLE",
            RelayError::RateLimited { .. } => "RATE_LIMITED",
            RelayError::InvalidPayload(_) => "INVALID_PAYLOAD",
            RelayError::DuplicateContent => "DUPLICATE_CONTENT",
            RelayError::RaceLost => "RACE_LOST",
            RelayError::StorageBusy(_) => "STORAGE_BUSY",
            RelayError::StorageCorrupt(_) => "STORAGE_CORRUPT",
            RelayError::NotFound(_) => "NOT_FOUND",
            RelayError::Cancelled => "CANCELLED",
            RelayError::Database(_) => "DATABASE_ERROR",
            RelayError::Serialization(_) => "SERIALIZATION_ERROR",
            RelayError::Io(_) => "IO_ERROR",
        }
    }

    /// Whether a caller should treat this as transient and retry on a later tick.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RelayError::RateLimited { .. }
                | RelayError::UpstreamUnavailable(_)
                | RelayError::StorageBusy(_)
                | RelayError::DuplicateContent
                | RelayError::RaceLost
        )
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
