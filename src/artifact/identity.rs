//! Source artifact identity

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{ComposeError, Result};

/// The (scope, logical name, version) triple naming a document
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SourceArtifactIdentity {
    pub authoring_scope_id: String,
    pub logical_name: String,
    pub version: String,
}

impl SourceArtifactIdentity {
    /// Split a composite `<AuthoringScopeId>/<LogicalName>/<Version>` identifier
    ///
    /// Only the component count is checked.
    pub fn parse(composite: &str) -> Result<Self> {
        let parts: Vec<&str> = composite.split('/').collect();
        match parts.as_slice() {
            [scope, logical, version] => Ok(Self {
                authoring_scope_id: scope.to_string(),
                logical_name: logical.to_string(),
                version: version.to_string(),
            }),
            _ => Err(ComposeError::InvalidIdentity {
                value: composite.to_string(),
            }),
        }
    }

    /// File-name friendly form, `<scope>_<logical>_<version>`
    pub fn file_stem(&self) -> String {
        format!(
            "{}_{}_{}",
            self.authoring_scope_id, self.logical_name, self.version
        )
        .chars()
        .map(|c| match c {
            '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c => c,
        })
        .collect()
    }
}

impl fmt::Display for SourceArtifactIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.authoring_scope_id, self.logical_name, self.version
        )
    }
}

impl FromStr for SourceArtifactIdentity {
    type Err = ComposeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_three_parts() {
        let id = SourceArtifactIdentity::parse("ScopeId_1/Application_2/3").unwrap();
        assert_eq!(id.authoring_scope_id, "ScopeId_1");
        assert_eq!(id.logical_name, "Application_2");
        assert_eq!(id.version, "3");
        assert_eq!(id.to_string(), "ScopeId_1/Application_2/3");
    }

    #[test]
    fn test_rejects_wrong_part_count() {
        for bad in ["", "a", "a/b", "a/b/c/d"] {
            assert!(matches!(
                SourceArtifactIdentity::parse(bad),
                Err(ComposeError::InvalidIdentity { .. })
            ));
        }
    }

    #[test]
    fn test_empty_components_are_accepted() {
        let id: SourceArtifactIdentity = "//".parse().unwrap();
        assert_eq!(id.logical_name, "");
    }

    #[test]
    fn test_file_stem() {
        let id = SourceArtifactIdentity::parse("Scope:1/App/2").unwrap();
        assert_eq!(id.file_stem(), "Scope-1_App_2");
    }
}
