pub mod connection;
pub mod container;
pub mod convert;
pub mod error;

pub use connection::connect;
pub use container::DockerRuntime;
pub use error::{DockerError, Result};
