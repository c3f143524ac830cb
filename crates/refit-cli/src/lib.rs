pub mod cli;
pub mod config;
pub mod error;

pub use cli::{Cli, Commands, UpdaterArgs};
pub use config::describe;
pub use error::{CliError, Result};
