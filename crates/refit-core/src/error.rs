use refit_runtime::RuntimeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UpdateError {
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("Failed to start recreated container '{name}'")]
    StartRefused { name: String },

    #[error("Update cancelled")]
    Cancelled,

    #[error("Self-update failed: {0}")]
    SelfUpdate(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, UpdateError>;
