pub mod config;
pub mod error;
pub mod logging;

pub use config::{AfyaConfig, ConfigOrigin};
pub use error::{AfyaError, ErrorCategory};
