//! # SkyRelay Infra-Common
//!
//! Shared infrastructure for the SkyRelay crates:
//!
//! - [`logging`]: `tracing-subscriber` setup and contextual spans
//! - [`errors`]: the common error type and error context helpers

pub mod errors;
pub mod logging;

pub use errors::context::{ErrorContext, ErrorExt};
pub use errors::types::{Error, Result};
pub use logging::context::LogContext;
pub use logging::setup::{LoggingConfig, log_welcome, parse_log_level, setup_logging};
