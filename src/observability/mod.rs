//! Logging setup
//!
//! The engine only emits `tracing` events and never installs a subscriber
//! itself. Binaries and embedders call [`init`] once at startup to choose an
//! output format and filter.
//!
//! # Usage
//!
//! ```ignore
//! use dcmforge::observability::{ObservabilityConfig, LogFormat, init};
//!
//! // From environment variables
//! init(&ObservabilityConfig::from_env())?;
//!
//! // Or programmatically
//! let config = ObservabilityConfig::builder()
//!     .log_format(LogFormat::Json)
//!     .log_filter("dcmforge=debug")
//!     .build();
//! init(&config)?;
//! ```

mod config;
mod providers;

pub use config::{LogFormat, ObservabilityConfig, ObservabilityConfigBuilder};

use thiserror::Error;
use tracing::debug;

/// Install the global tracing subscriber.
///
/// # Errors
///
/// Returns an error if the filter directive is invalid or a global
/// subscriber is already installed.
pub fn init(config: &ObservabilityConfig) -> Result<(), ObservabilityError> {
    providers::init_tracing(config)?;

    debug!(
        log_format = ?config.log_format,
        log_filter = %config.log_filter,
        "Logging initialized"
    );

    Ok(())
}

/// Logging initialization errors
#[derive(Error, Debug)]
pub enum ObservabilityError {
    /// Invalid configuration
    #[error("Observability config error: {0}")]
    Config(String),
    /// Subscriber installation failed
    #[error("Provider error: {0}")]
    Provider(String),
}
