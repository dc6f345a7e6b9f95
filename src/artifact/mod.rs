//! Configuration item documents
//!
//! An [`Artifact`] wraps a parsed desired-configuration document and knows
//! its [`Flavor`]. The flavor element is a direct child of the document root
//! and holds the `Settings` and `Rules` containers:
//!
//! ```text
//! DesiredConfigurationDigest
//!   Application | OperatingSystem (AuthoringScopeId, LogicalName, Version)
//!     Settings
//!       RootComplexSetting        <- Settings are appended here
//!     Rules                       <- created on first Rule
//! ```

mod identity;
mod merge;

pub use identity::SourceArtifactIdentity;

use std::fmt;

use serde::Serialize;

use crate::error::{ComposeError, Result};
use crate::xml::{Element, XmlDocument};

/// Document shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Flavor {
    OperatingSystem,
    Application,
}

impl Flavor {
    /// Local name of the flavor element
    pub fn element_name(&self) -> &'static str {
        match self {
            Self::OperatingSystem => "OperatingSystem",
            Self::Application => "Application",
        }
    }

    fn from_local_name(name: &str) -> Option<Self> {
        match name {
            "OperatingSystem" => Some(Self::OperatingSystem),
            "Application" => Some(Self::Application),
            _ => None,
        }
    }
}

impl fmt::Display for Flavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.element_name())
    }
}

/// Summary of a document's composed content
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactSummary {
    pub flavor: Flavor,
    pub identity: Option<SourceArtifactIdentity>,
    pub settings: Vec<String>,
    pub rules: Vec<String>,
}

/// A desired-configuration document of known flavor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    document: XmlDocument,
    flavor: Flavor,
}

impl Artifact {
    /// Parse document text
    pub fn parse(xml: &str) -> Result<Self> {
        Self::from_document(XmlDocument::parse(xml)?)
    }

    /// Wrap a parsed document, determining its flavor
    ///
    /// The root must carry exactly one flavor element.
    pub fn from_document(document: XmlDocument) -> Result<Self> {
        let flavors: Vec<Flavor> = document
            .root
            .child_elements()
            .filter_map(|e| Flavor::from_local_name(e.local_name()))
            .collect();

        let flavor = match flavors.as_slice() {
            [flavor] => *flavor,
            [] => {
                return Err(ComposeError::structural(format!(
                    "<{}> has neither an OperatingSystem nor an Application element",
                    document.root.name()
                )))
            }
            _ => {
                return Err(ComposeError::structural(format!(
                    "<{}> has more than one flavor element",
                    document.root.name()
                )))
            }
        };

        tracing::debug!(flavor = %flavor, "Parsed artifact");
        Ok(Self { document, flavor })
    }

    pub fn flavor(&self) -> Flavor {
        self.flavor
    }

    pub fn document(&self) -> &XmlDocument {
        &self.document
    }

    /// Serialize the document
    pub fn to_xml(&self) -> Result<String> {
        self.document.to_xml()
    }

    fn flavor_element(&self) -> Option<&Element> {
        self.document.root.child(self.flavor.element_name())
    }

    /// Identity declared on the flavor element, if complete
    pub fn identity(&self) -> Option<SourceArtifactIdentity> {
        let flavor = self.flavor_element()?;
        Some(SourceArtifactIdentity {
            authoring_scope_id: flavor.attribute("AuthoringScopeId")?.to_string(),
            logical_name: flavor.attribute("LogicalName")?.to_string(),
            version: flavor.attribute("Version")?.to_string(),
        })
    }

    /// Logical names of every `SimpleSetting` in the Settings container
    pub fn setting_names(&self) -> Vec<String> {
        let mut settings = Vec::new();
        if let Some(container) = self.flavor_element().and_then(|f| f.child("Settings")) {
            container.descendants("SimpleSetting", &mut settings);
        }
        settings
            .into_iter()
            .filter_map(|s| s.attribute("LogicalName"))
            .map(str::to_string)
            .collect()
    }

    pub fn contains_setting(&self, logical_name: &str) -> bool {
        self.setting_names().iter().any(|n| n == logical_name)
    }

    /// Ids of every Rule in the Rules container
    pub fn rule_ids(&self) -> Vec<String> {
        self.flavor_element()
            .and_then(|f| f.child("Rules"))
            .map(|rules| {
                rules
                    .child_elements()
                    .filter(|r| r.local_name() == "Rule")
                    .filter_map(|r| r.attribute("id"))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Summarize flavor, identity and composed content
    pub fn inspect(&self) -> ArtifactSummary {
        ArtifactSummary {
            flavor: self.flavor,
            identity: self.identity(),
            settings: self.setting_names(),
            rules: self.rule_ids(),
        }
    }
}
