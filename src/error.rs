//! Error types for artifact composition
//!
//! Every fatal condition raised by the engine is a [`ComposeError`]. Each
//! variant belongs to one [`ErrorClass`], which tells the caller whether the
//! input, the document, or the environment was at fault.
//!
//! Advisory conditions (for example a Rule referencing a registry Setting
//! with a data type outside `String`/`Int64`) are not errors. They are
//! reported as `tracing` warnings and construction continues.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for composition operations
pub type Result<T> = std::result::Result<T, ComposeError>;

/// Broad classification of a [`ComposeError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The document does not have a recognized shape
    Structural,
    /// Caller-supplied input was rejected before any mutation
    InputValidation,
    /// The persistence collaborator or its site context is unavailable
    Environment,
    /// XML or filesystem failure while serializing or persisting
    Io,
}

/// Composition errors
#[derive(Error, Debug)]
pub enum ComposeError {
    /// Document flavor is neither OperatingSystem nor Application
    #[error("Unrecognized document structure: {message}")]
    Structural { message: String },

    /// Unknown registry hive alias
    #[error("Invalid registry hive: {value}. Valid options: HKLM, HKCU, HKCR, HKU, HKCC (or their long forms)")]
    InvalidHive { value: String },

    /// Unknown scalar data type alias
    #[error("Invalid data type: {value}. Valid options: REG_SZ, String, REG_QWORD, QWORD, Int64")]
    InvalidDataType { value: String },

    /// Unknown registry value kind tag
    #[error("Invalid registry value kind: {value}. Valid options: REG_SZ, REG_MULTI_SZ, REG_EXPAND_SZ, REG_DWORD, REG_QWORD, REG_BINARY")]
    InvalidValueKind { value: String },

    /// Value data that cannot be encoded for its value kind
    #[error("Invalid value data for {kind}: {message}")]
    InvalidValueData { kind: String, message: String },

    /// Composite identifier without exactly three `/`-separated parts
    #[error("Invalid artifact identifier '{value}': expected <AuthoringScopeId>/<LogicalName>/<Version>")]
    InvalidIdentity { value: String },

    /// Malformed element or attribute passed to fragment construction
    #[error("Invalid attribute specification on <{element}>: {message}")]
    InvalidAttribute { element: String, message: String },

    /// Any other rejected input field
    #[error("Invalid value for {field}: {message}")]
    InvalidInput { field: String, message: String },

    /// Referenced Setting is absent from the document (opt-in verification only)
    #[error("Setting '{logical_name}' not found in the target document")]
    SettingNotFound { logical_name: String },

    /// Site context or persistence collaborator unavailable
    #[error("Persistence environment unavailable: {message}")]
    Environment { message: String },

    /// XML read or write failure
    #[error("XML error: {message}")]
    Xml { message: String },

    /// Store write failure
    #[error("Failed to write artifact {path}: {source}")]
    StoreWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ComposeError {
    /// Create a structural error
    pub fn structural(message: impl Into<String>) -> Self {
        Self::Structural {
            message: message.into(),
        }
    }

    /// Create an environment error
    pub fn environment(message: impl Into<String>) -> Self {
        Self::Environment {
            message: message.into(),
        }
    }

    /// Create an XML error from any displayable parser/writer error
    pub fn xml(err: impl std::fmt::Display) -> Self {
        Self::Xml {
            message: err.to_string(),
        }
    }

    /// Create an invalid attribute error
    pub fn attribute(element: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidAttribute {
            element: element.into(),
            message: message.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Classify this error
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Structural { .. } => ErrorClass::Structural,
            Self::InvalidHive { .. }
            | Self::InvalidDataType { .. }
            | Self::InvalidValueKind { .. }
            | Self::InvalidValueData { .. }
            | Self::InvalidIdentity { .. }
            | Self::InvalidAttribute { .. }
            | Self::InvalidInput { .. }
            | Self::SettingNotFound { .. } => ErrorClass::InputValidation,
            Self::Environment { .. } => ErrorClass::Environment,
            Self::Xml { .. } | Self::StoreWrite { .. } | Self::Io(_) => ErrorClass::Io,
        }
    }
}
