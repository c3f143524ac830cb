use refit_core::UpdateError;
use refit_runtime::RuntimeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid configuration: {}", .0.join(" "))]
    InvalidConfiguration(Vec<String>),

    #[error("Cannot reach Docker at {host}: {message}")]
    Unreachable { host: String, message: String },

    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("Update error: {0}")]
    Update(#[from] UpdateError),
}

pub type Result<T> = std::result::Result<T, CliError>;
