pub mod error;
pub mod loader;
pub mod raw;

pub use error::ConfigError;
pub use loader::{load_defaults, Defaults};
