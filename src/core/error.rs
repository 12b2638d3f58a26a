use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Remote store unreachable: {0}")]
    RemoteUnavailable(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Record '{0}' not found")]
    RecordNotFound(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Local storage error: {0}")]
    LocalStorage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    /// Whether the caller may retry the same call unchanged and expect it to
    /// succeed once the remote store is reachable again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::RemoteUnavailable(_))
    }
}
