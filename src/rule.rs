//! Rule construction
//!
//! A Rule asserts that a referenced Setting equals a constant value:
//!
//! ```text
//! Rule(id, Severity, NonCompliantWhenSettingIsNotFound)
//!   Annotation
//!     DisplayName(Text, ResourceID)
//!     Description(Text[, ResourceID])
//!   Expression
//!     Operator = Equals
//!     Operands
//!       SettingReference(AuthoringScopeId, LogicalName, Version, DataType,
//!                        SettingLogicalName, SettingSourceType, Method, Changeable)
//!       ConstantValue(Value, DataType)
//! ```
//!
//! The reference is trusted as given; whether the Setting really lives in
//! the named source document is not checked here.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::annotation::annotation;
use crate::artifact::SourceArtifactIdentity;
use crate::error::{ComposeError, Result};
use crate::registry::ScalarType;
use crate::setting::{bool_literal, Setting, SettingKind};
use crate::xml::Element;

/// Namespace of Rule fragments
pub const RULES_NS: &str =
    "http://schemas.microsoft.com/SystemsCenterConfigurationManager/2009/06/14/Rules";

/// Rule severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Severity {
    None,
    #[default]
    Warning,
    Critical,
    CriticalWithEvent,
}

impl Severity {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "information" | "informational" => Ok(Self::None),
            "warning" => Ok(Self::Warning),
            "critical" => Ok(Self::Critical),
            "criticalwithevent" => Ok(Self::CriticalWithEvent),
            _ => Err(ComposeError::invalid(
                "severity",
                format!("'{}' is not one of None, Warning, Critical, CriticalWithEvent", s),
            )),
        }
    }

    /// Token written to the `Severity` attribute
    ///
    /// The Rules schema enumerates severities in Pascal case
    /// (`None`, `Warning`, `Critical`, `CriticalWithEvent`), so this is the
    /// form emitted whatever casing the input used.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Warning => "Warning",
            Self::Critical => "Critical",
            Self::CriticalWithEvent => "CriticalWithEvent",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = ComposeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Severity {
    type Error = ComposeError;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<Severity> for String {
    fn from(severity: Severity) -> Self {
        severity.as_str().to_string()
    }
}

/// Naming and policy fields shared by every composite request
///
/// Unset policy fields fall back to the composer's configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleOptions {
    /// Display name for the Setting and the Rule
    pub name: Option<String>,

    /// Description; empty means no localization resource
    pub description: String,

    pub severity: Option<Severity>,

    /// Whether the platform may remediate a non-compliant value
    pub remediate: Option<bool>,

    /// Whether a missing Setting value counts as non-compliant
    pub noncompliant_when_not_found: Option<bool>,
}

/// Fully resolved Rule policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RulePolicy {
    pub display_name: String,
    pub description: String,
    pub severity: Severity,
    pub remediate: bool,
    pub noncompliant_when_not_found: bool,
}

/// Reference from a Rule to a Setting on some source document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingReference {
    pub source: SourceArtifactIdentity,
    pub setting_logical_name: String,
    pub kind: SettingKind,
    pub data_type: ScalarType,
}

impl SettingReference {
    /// Reference a Setting that was just built
    pub fn to_setting(setting: &Setting, source: SourceArtifactIdentity) -> Self {
        Self {
            source,
            setting_logical_name: setting.logical_name().as_str().to_string(),
            kind: setting.kind(),
            data_type: setting.data_type(),
        }
    }

    /// Conditions the platform may not remediate correctly
    pub fn advisories(&self) -> Vec<String> {
        let mut advisories = Vec::new();
        if self.kind == SettingKind::Registry
            && !matches!(self.data_type, ScalarType::String | ScalarType::Int64)
        {
            advisories.push(format!(
                "registry setting '{}' has data type {}; remediation is only verified for String and Int64",
                self.setting_logical_name, self.data_type
            ));
        }
        advisories
    }
}

/// Constant operand of the equality
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantValue {
    pub value: String,
    pub data_type: ScalarType,
}

/// An equality Rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    id: String,
    policy: RulePolicy,
    reference: SettingReference,
    constant: ConstantValue,
}

impl Rule {
    pub fn new(policy: RulePolicy, reference: SettingReference, constant: ConstantValue) -> Self {
        let id = format!("Rule_{}", Uuid::new_v4());
        for advisory in reference.advisories() {
            tracing::warn!(rule_id = %id, "{}", advisory);
        }
        Self {
            id,
            policy,
            reference,
            constant,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Serialize as a namespace-qualified `Rule` fragment
    pub fn to_element(&self) -> Result<Element> {
        let mut rule = Element::build(
            "Rule",
            &[
                ("xmlns", RULES_NS),
                ("id", self.id.as_str()),
                ("Severity", self.policy.severity.as_str()),
                (
                    "NonCompliantWhenSettingIsNotFound",
                    bool_literal(self.policy.noncompliant_when_not_found),
                ),
            ],
        )?;
        rule.push_element(annotation(&self.policy.display_name, &self.policy.description)?);

        let reference = &self.reference;
        let mut operands = Element::new("Operands")?;
        operands.push_element(Element::build(
            "SettingReference",
            &[
                ("AuthoringScopeId", reference.source.authoring_scope_id.as_str()),
                ("LogicalName", reference.source.logical_name.as_str()),
                ("Version", reference.source.version.as_str()),
                ("DataType", reference.data_type.as_str()),
                ("SettingLogicalName", reference.setting_logical_name.as_str()),
                ("SettingSourceType", reference.kind.source_type()),
                ("Method", "Value"),
                ("Changeable", bool_literal(self.policy.remediate)),
            ],
        )?);
        operands.push_element(Element::build(
            "ConstantValue",
            &[
                ("Value", self.constant.value.as_str()),
                ("DataType", self.constant.data_type.as_str()),
            ],
        )?);

        let mut expression = Element::new("Expression")?;
        expression.push_element(Element::with_text("Operator", "Equals")?);
        expression.push_element(operands);
        rule.push_element(expression);

        tracing::debug!(
            rule_id = %self.id,
            setting_logical_name = %reference.setting_logical_name,
            "Built rule fragment"
        );
        Ok(rule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> SourceArtifactIdentity {
        SourceArtifactIdentity::parse("ScopeId_ABC/Application_123/4").unwrap()
    }

    fn policy(description: &str) -> RulePolicy {
        RulePolicy {
            display_name: "Check foo".into(),
            description: description.into(),
            severity: Severity::Critical,
            remediate: true,
            noncompliant_when_not_found: false,
        }
    }

    fn reference(kind: SettingKind, data_type: ScalarType) -> SettingReference {
        SettingReference {
            source: identity(),
            setting_logical_name: "RegistrySetting_1".into(),
            kind,
            data_type,
        }
    }

    fn constant() -> ConstantValue {
        ConstantValue {
            value: "bar".into(),
            data_type: ScalarType::String,
        }
    }

    #[test]
    fn test_rule_fragment_shape() {
        let rule = Rule::new(
            policy(""),
            reference(SettingKind::Registry, ScalarType::String),
            constant(),
        );
        let el = rule.to_element().unwrap();

        assert_eq!(el.default_namespace(), Some(RULES_NS));
        assert_eq!(el.attribute("id"), Some(rule.id()));
        assert!(rule.id().starts_with("Rule_"));
        assert_eq!(el.attribute("Severity"), Some("Critical"));
        assert_eq!(el.attribute("NonCompliantWhenSettingIsNotFound"), Some("false"));

        let expression = el.child("Expression").unwrap();
        assert_eq!(expression.child("Operator").unwrap().text(), "Equals");

        let operands = expression.child("Operands").unwrap();
        let setting_ref = operands.child("SettingReference").unwrap();
        assert_eq!(setting_ref.attribute("AuthoringScopeId"), Some("ScopeId_ABC"));
        assert_eq!(setting_ref.attribute("LogicalName"), Some("Application_123"));
        assert_eq!(setting_ref.attribute("Version"), Some("4"));
        assert_eq!(setting_ref.attribute("SettingLogicalName"), Some("RegistrySetting_1"));
        assert_eq!(setting_ref.attribute("SettingSourceType"), Some("Registry"));
        assert_eq!(setting_ref.attribute("Method"), Some("Value"));
        assert_eq!(setting_ref.attribute("Changeable"), Some("true"));

        let constant = operands.child("ConstantValue").unwrap();
        assert_eq!(constant.attribute("Value"), Some("bar"));
        assert_eq!(constant.attribute("DataType"), Some("String"));
    }

    #[test]
    fn test_setting_reference_attribute_order() {
        let el = Rule::new(
            policy(""),
            reference(SettingKind::Script, ScalarType::String),
            constant(),
        )
        .to_element()
        .unwrap();
        let setting_ref = el
            .child("Expression")
            .and_then(|e| e.child("Operands"))
            .and_then(|o| o.child("SettingReference"))
            .unwrap();
        let names: Vec<&str> = setting_ref
            .attributes()
            .iter()
            .map(|a| a.name.as_str())
            .collect();
        assert_eq!(
            names,
            vec![
                "AuthoringScopeId",
                "LogicalName",
                "Version",
                "DataType",
                "SettingLogicalName",
                "SettingSourceType",
                "Method",
                "Changeable"
            ]
        );
    }

    #[test]
    fn test_description_resource_id_only_when_non_empty() {
        let empty = Rule::new(
            policy(""),
            reference(SettingKind::Script, ScalarType::String),
            constant(),
        )
        .to_element()
        .unwrap();
        let description = empty.child("Annotation").and_then(|a| a.child("Description")).unwrap();
        assert!(description.attribute("ResourceID").is_none());

        let described = Rule::new(
            policy("Value must be bar"),
            reference(SettingKind::Script, ScalarType::String),
            constant(),
        )
        .to_element()
        .unwrap();
        let description = described
            .child("Annotation")
            .and_then(|a| a.child("Description"))
            .unwrap();
        assert!(description.attribute("ResourceID").is_some());
    }

    #[test]
    fn test_advisory_for_unverified_registry_types() {
        assert!(reference(SettingKind::Registry, ScalarType::String)
            .advisories()
            .is_empty());
        assert!(reference(SettingKind::Registry, ScalarType::Int64)
            .advisories()
            .is_empty());
        assert_eq!(
            reference(SettingKind::Registry, ScalarType::StringArray)
                .advisories()
                .len(),
            1
        );
        assert!(reference(SettingKind::Script, ScalarType::Boolean)
            .advisories()
            .is_empty());
    }

    #[test]
    fn test_severity_parse_any_case() {
        assert_eq!(Severity::parse("critical").unwrap(), Severity::Critical);
        assert_eq!(Severity::parse("CRITICALWITHEVENT").unwrap(), Severity::CriticalWithEvent);
        assert_eq!(Severity::parse("None").unwrap(), Severity::None);
        assert!(Severity::parse("fatal").is_err());
    }

    #[test]
    fn test_severity_written_in_schema_casing() {
        for (input, written) in [
            ("critical", "Critical"),
            ("WARNING", "Warning"),
            ("criticalwithevent", "CriticalWithEvent"),
            ("none", "None"),
        ] {
            assert_eq!(Severity::parse(input).unwrap().as_str(), written);
        }
    }

    #[test]
    fn test_rule_ids_are_unique() {
        let script = || reference(SettingKind::Script, ScalarType::String);
        let a = Rule::new(policy(""), script(), constant());
        let b = Rule::new(policy(""), script(), constant());
        assert_ne!(a.id(), b.id());
    }
}
