//! Infrastructure shared by the sigflow crates: logging setup and the
//! layered server configuration.

pub mod config;
pub mod errors;
pub mod logging;

pub use config::{
    BillingSection, DialogSection, EngineSection, LoggingSection, ShutdownMode, SigflowConfig,
};
pub use errors::{ConfigError, Error, Result};
pub use logging::{log_welcome, parse_log_level, setup_logging, LoggingConfig};
