use refit_runtime::RuntimeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DockerError {
    #[error("Docker connection failed: {0}")]
    ConnectionError(String),

    #[error("Unsupported Docker host: {0}")]
    InvalidHost(String),

    #[error("Docker API error: {0}")]
    ApiError(#[from] bollard::errors::Error),
}

pub type Result<T> = std::result::Result<T, DockerError>;

impl From<DockerError> for RuntimeError {
    fn from(err: DockerError) -> Self {
        match err {
            DockerError::ConnectionError(message) | DockerError::InvalidHost(message) => {
                RuntimeError::ConnectionError { message }
            }
            DockerError::ApiError(e) => RuntimeError::operation_failed("docker", e.to_string()),
        }
    }
}

fn status_code(err: &bollard::errors::Error) -> Option<u16> {
    match err {
        bollard::errors::Error::DockerResponseServerError { status_code, .. } => Some(*status_code),
        _ => None,
    }
}

/// Map a bollard error from a container call, keeping 404 distinguishable.
pub(crate) fn container_error(operation: &str, id: &str, err: bollard::errors::Error) -> RuntimeError {
    match status_code(&err) {
        Some(404) => RuntimeError::ContainerNotFound { id: id.to_string() },
        _ => RuntimeError::operation_failed(operation, err.to_string()),
    }
}

/// Map a bollard error from an image call, keeping 404 distinguishable.
pub(crate) fn image_error(operation: &str, name: &str, err: bollard::errors::Error) -> RuntimeError {
    match status_code(&err) {
        Some(404) => RuntimeError::ImageNotFound { name: name.to_string() },
        _ => RuntimeError::operation_failed(operation, err.to_string()),
    }
}

/// 304 from `start` means the container was already in the requested state.
pub(crate) fn is_not_modified(err: &bollard::errors::Error) -> bool {
    status_code(err) == Some(304)
}
