pub mod traits;
pub mod types;
pub mod config;
pub mod error;
pub mod image;
pub mod memory;

pub use traits::*;
pub use types::*;
pub use config::*;
pub use error::*;
pub use image::ImageReference;
pub use memory::{InMemoryRuntime, Operation, RuntimeCall};
