pub mod config;
pub mod error;
pub mod metrics;
pub mod offset;
pub mod types;

pub use config::Config;
pub use error::{Result, RustMqError};
