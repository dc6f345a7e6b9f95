//! Error types for the dcmforge CLI

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// CLI error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file read error
    #[error("Failed to read configuration file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration parse error
    #[error("Failed to parse configuration file {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    /// Input file read error
    #[error("Failed to read {path}: {source}")]
    InputRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Descriptor file parse error
    #[error("Failed to parse descriptors {path}: {message}")]
    DescriptorParse { path: PathBuf, message: String },

    /// File write error
    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Missing required input
    #[error("Missing required input: {field}")]
    MissingRequired { field: String },

    /// Logging setup failed
    #[error(transparent)]
    Logging(#[from] dcmforge::observability::ObservabilityError),

    /// Composition failed
    #[error(transparent)]
    Compose(#[from] dcmforge::ComposeError),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Create a missing required input error
    pub fn missing(field: impl Into<String>) -> Self {
        Self::MissingRequired {
            field: field.into(),
        }
    }
}
