use thiserror::Error;

/// ACR sample error types
#[derive(Error, Debug)]
pub enum SampleError {
    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Token acquisition failed
    #[error("Authentication failed: {authority} - {message}")]
    AuthError { authority: String, message: String },

    /// Azure Resource Manager rejected a request
    #[error("Management API error: {status} {code} - {message}")]
    ArmError {
        status: u16,
        code: String,
        message: String,
    },

    /// A long-running operation reached a failed terminal state
    #[error("Operation failed: {operation} ended in state {state}: {message}")]
    OperationFailed {
        operation: String,
        state: String,
        message: String,
    },

    /// Transport-level HTTP failure
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Timeout error
    #[error("Timeout: {0}")]
    TimeoutError(String),

    /// Docker engine error
    #[error("Docker error: {endpoint} - {message}")]
    DockerError { endpoint: String, message: String },

    /// Image reference error
    #[error("Image reference error: {0}")]
    ImageReferenceError(String),

    /// Malformed Azure resource ID
    #[error("Invalid resource ID '{id}': {reason}")]
    ResourceIdError { id: String, reason: String },

    /// Container registry error
    #[error("Registry error: {registry} - {message}")]
    RegistryError { registry: String, message: String },

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for SampleError {
    fn from(err: serde_json::Error) -> Self {
        SampleError::SerializationError(err.to_string())
    }
}

/// Result type alias for ACR sample operations
pub type Result<T> = std::result::Result<T, SampleError>;
