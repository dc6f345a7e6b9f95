//! # dcmforge
//!
//! Compose Settings and Rules into desired-configuration documents.
//!
//! This crate builds Setting and Rule fragments for configuration item
//! documents and merges them into an existing document without disturbing
//! unrelated content. Registry values the platform cannot remediate natively
//! are checked through synthesized VBScript instead.
//!
//! ## Features
//!
//! - **Type normalization**: hive and data-type aliases (`HKLM`, `REG_SZ`, ...)
//! - **Script synthesis**: detection/remediation VBScript for multi-string,
//!   expandable-string, DWORD and binary values
//! - **Fragment construction**: Settings with unique logical names, equality Rules
//! - **Merging**: flavor-aware insertion with namespace import
//! - **Execution modes**: commit through an [`ArtifactStore`] or return the
//!   updated document
//!
//! ## Quick Start
//!
//! ```ignore
//! use dcmforge::{ComposeConfig, Composer, ExecutionMode, RegistryValueRequest};
//! use dcmforge::registry::{Hive, RegistryValueKind};
//!
//! fn main() -> dcmforge::Result<()> {
//!     let composer = Composer::new(ComposeConfig::from_env());
//!     let document = std::fs::read_to_string("application.xml")?;
//!
//!     let outcome = composer.registry_compose(
//!         ExecutionMode::Transform {
//!             document: &document,
//!             source_identity: "ScopeId_1/Application_2/1",
//!         },
//!         &[RegistryValueRequest::new(
//!             Hive::LocalMachine,
//!             r"Software\Contoso",
//!             "Channel",
//!             "Stable",
//!             RegistryValueKind::String,
//!         )],
//!     )?;
//!
//!     println!("{}", outcome.document().unwrap_or_default());
//!     Ok(())
//! }
//! ```

mod annotation;
pub mod artifact;
pub mod compose;
mod config;
pub mod error;
pub mod observability;
pub mod registry;
pub mod rule;
pub mod script;
pub mod setting;
pub mod store;
pub mod xml;

// Re-exports
pub use artifact::{Artifact, ArtifactSummary, Flavor, SourceArtifactIdentity};
pub use compose::{
    ComposeOutcome, Composer, Descriptors, ExecutionMode, RegistryValueRequest, RuleRequest,
    ScriptRequest,
};
pub use config::{ComposeConfig, ComposeConfigBuilder};
pub use error::{ComposeError, ErrorClass, Result};
pub use observability::ObservabilityConfigBuilder;
pub use rule::{RuleOptions, Severity};
pub use store::{ArtifactStore, FileStore, LiveArtifact, MemoryStore};
