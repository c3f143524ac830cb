use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Container not found: {id}")]
    ContainerNotFound { id: String },

    #[error("Image not found: {name}")]
    ImageNotFound { name: String },

    #[error("Connection error: {message}")]
    ConnectionError { message: String },

    #[error("Runtime operation failed: {operation} - {message}")]
    OperationFailed { operation: String, message: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl RuntimeError {
    pub fn operation_failed(operation: impl Into<String>, message: impl Into<String>) -> Self {
        RuntimeError::OperationFailed {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// True when the referenced container or image no longer exists.
    ///
    /// Existence checks rely on this to tell "already gone" apart from a
    /// runtime that failed to answer.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RuntimeError::ContainerNotFound { .. } | RuntimeError::ImageNotFound { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
