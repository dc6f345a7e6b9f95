//! Setting entities
//!
//! A Setting is a named check definition: either a script pair or a direct
//! registry value reference. Each one receives a [`LogicalName`] when it is
//! constructed; the name never changes afterwards.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::annotation::annotation;
use crate::error::{ComposeError, Result};
use crate::registry::{Hive, RegistryDataType, ScalarType};
use crate::xml::{self, Element};

/// Namespace of Setting fragments and of the configuration item document
pub const DESIRED_CONFIGURATION_NS: &str =
    "http://schemas.microsoft.com/SystemsCenterConfigurationManager/2009/07/10/DesiredConfiguration";

/// Language of a detection or remediation script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ScriptLanguage {
    #[default]
    VbScript,
    JScript,
    PowerShell,
}

impl ScriptLanguage {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vbscript" | "vbs" => Ok(Self::VbScript),
            "jscript" | "js" => Ok(Self::JScript),
            "powershell" | "ps1" => Ok(Self::PowerShell),
            _ => Err(ComposeError::invalid(
                "script language",
                format!("'{}' is not one of VBScript, JScript, PowerShell", s),
            )),
        }
    }

    /// Tag written to `ScriptType`
    pub fn tag(&self) -> &'static str {
        match self {
            Self::VbScript => "VBScript",
            Self::JScript => "JScript",
            Self::PowerShell => "PowerShell",
        }
    }
}

impl fmt::Display for ScriptLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for ScriptLanguage {
    type Err = ComposeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ScriptLanguage {
    type Error = ComposeError;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<ScriptLanguage> for String {
    fn from(lang: ScriptLanguage) -> Self {
        lang.tag().to_string()
    }
}

/// Which kind of source a Setting reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SettingKind {
    Script,
    Registry,
}

impl SettingKind {
    /// Value of `SettingSourceType` in Rule references
    pub fn source_type(&self) -> &'static str {
        match self {
            Self::Script => "Script",
            Self::Registry => "Registry",
        }
    }
}

impl fmt::Display for SettingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.source_type())
    }
}

/// Opaque unique Setting identity, `<Kind>Setting_<uuid>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct LogicalName(String);

impl LogicalName {
    /// Generate a fresh name for a Setting of the given kind
    pub fn generate(kind: SettingKind) -> Self {
        Self(format!("{}Setting_{}", kind.source_type(), Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LogicalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Body of a detection or remediation script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptBody {
    pub language: ScriptLanguage,
    pub source: String,
}

impl ScriptBody {
    pub fn new(language: ScriptLanguage, source: impl Into<String>) -> Self {
        Self {
            language,
            source: source.into(),
        }
    }
}

/// Script-based Setting; always returns a string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSetting {
    pub detection: ScriptBody,
    pub remediation: ScriptBody,
    pub per_user: bool,
    pub is_64bit: bool,
}

/// Registry-based Setting; only `String` and `Int64` values qualify
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrySetting {
    pub hive: Hive,
    pub key_path: String,
    pub value_name: String,
    pub data_type: RegistryDataType,
    pub is_64bit: bool,
}

impl RegistrySetting {
    /// Registry Settings always create a missing key on remediation
    pub fn creates_missing_key(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingSource {
    Script(ScriptSetting),
    Registry(RegistrySetting),
}

/// A Setting with its generated identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Setting {
    logical_name: LogicalName,
    display_name: String,
    description: String,
    source: SettingSource,
}

impl Setting {
    pub fn script(
        display_name: impl Into<String>,
        description: impl Into<String>,
        script: ScriptSetting,
    ) -> Self {
        Self::with_source(display_name.into(), description.into(), SettingSource::Script(script))
    }

    pub fn registry(
        display_name: impl Into<String>,
        description: impl Into<String>,
        registry: RegistrySetting,
    ) -> Self {
        Self::with_source(
            display_name.into(),
            description.into(),
            SettingSource::Registry(registry),
        )
    }

    fn with_source(display_name: String, description: String, source: SettingSource) -> Self {
        let kind = match source {
            SettingSource::Script(_) => SettingKind::Script,
            SettingSource::Registry(_) => SettingKind::Registry,
        };
        let logical_name = LogicalName::generate(kind);
        tracing::debug!(logical_name = %logical_name, kind = %kind, "Constructed setting");
        Self {
            logical_name,
            display_name,
            description,
            source,
        }
    }

    pub fn logical_name(&self) -> &LogicalName {
        &self.logical_name
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn kind(&self) -> SettingKind {
        match self.source {
            SettingSource::Script(_) => SettingKind::Script,
            SettingSource::Registry(_) => SettingKind::Registry,
        }
    }

    /// Data type the Setting reports; scripts always report strings
    pub fn data_type(&self) -> ScalarType {
        match &self.source {
            SettingSource::Script(_) => ScalarType::String,
            SettingSource::Registry(r) => r.data_type.into(),
        }
    }

    /// Serialize the entity as a `SimpleSetting` element
    pub fn to_element(&self) -> Result<Element> {
        let data_type = self.data_type();
        let mut setting = Element::build(
            "SimpleSetting",
            &[
                ("xmlns", DESIRED_CONFIGURATION_NS),
                ("LogicalName", self.logical_name.as_str()),
                ("DataType", data_type.as_str()),
            ],
        )?;
        setting.push_element(annotation(&self.display_name, &self.description)?);

        match &self.source {
            SettingSource::Script(script) => {
                let mut source = Element::build(
                    "ScriptDiscoverySource",
                    &[("Is64Bit", bool_literal(script.is_64bit))],
                )?;
                source.push_element(script_body("DiscoveryScriptBody", &script.detection)?);
                source.push_element(script_body("RemediationScriptBody", &script.remediation)?);
                source.push_element(Element::with_text(
                    "RunAsCurrentUser",
                    bool_literal(script.per_user),
                )?);
                setting.push_element(source);
            }
            SettingSource::Registry(registry) => {
                let mut source = Element::build(
                    "RegistryDiscoverySource",
                    &[
                        ("Hive", registry.hive.canonical()),
                        ("Depth", "Base"),
                        ("Is64Bit", bool_literal(registry.is_64bit)),
                        ("CreateMissingPath", bool_literal(registry.creates_missing_key())),
                    ],
                )?;
                source.push_element(text_element("Key", &registry.key_path)?);
                source.push_element(text_element("ValueName", &registry.value_name)?);
                setting.push_element(source);
            }
        }

        Ok(setting)
    }

    /// Serialize and re-read the entity as an importable fragment
    pub fn to_fragment(&self) -> Result<Element> {
        xml::round_trip(&self.to_element()?)
    }
}

/// Lower-case boolean literal used throughout the document schema
pub fn bool_literal(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

fn text_element(name: &str, text: &str) -> Result<Element> {
    if text.is_empty() {
        Element::new(name)
    } else {
        Element::with_text(name, text)
    }
}

fn script_body(name: &str, body: &ScriptBody) -> Result<Element> {
    let mut element = text_element(name, &body.source)?;
    element.push_attribute("ScriptType", body.language.tag())?;
    Ok(element)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn registry_setting() -> Setting {
        Setting::registry(
            r"HKLM\Software\Test\foo",
            "",
            RegistrySetting {
                hive: Hive::LocalMachine,
                key_path: r"Software\Test".into(),
                value_name: "foo".into(),
                data_type: RegistryDataType::String,
                is_64bit: true,
            },
        )
    }

    fn script_setting() -> Setting {
        Setting::script(
            "Check",
            "Checks something",
            ScriptSetting {
                detection: ScriptBody::new(ScriptLanguage::PowerShell, "Write-Output 'ok'\n"),
                remediation: ScriptBody::new(ScriptLanguage::PowerShell, "exit 0"),
                per_user: true,
                is_64bit: false,
            },
        )
    }

    #[test]
    fn test_logical_name_prefix_by_kind() {
        assert!(registry_setting()
            .logical_name()
            .as_str()
            .starts_with("RegistrySetting_"));
        assert!(script_setting()
            .logical_name()
            .as_str()
            .starts_with("ScriptSetting_"));
    }

    #[test]
    fn test_logical_names_never_repeat() {
        let names: HashSet<LogicalName> = (0..10_000)
            .map(|_| LogicalName::generate(SettingKind::Registry))
            .collect();
        assert_eq!(names.len(), 10_000);
    }

    #[test]
    fn test_registry_setting_element() {
        let setting = registry_setting();
        let el = setting.to_element().unwrap();

        assert_eq!(el.attribute("DataType"), Some("String"));
        assert_eq!(el.attribute("LogicalName"), Some(setting.logical_name().as_str()));

        let source = el.child("RegistryDiscoverySource").unwrap();
        assert_eq!(source.attribute("Hive"), Some("HKEY_LOCAL_MACHINE"));
        assert_eq!(source.attribute("CreateMissingPath"), Some("true"));
        assert_eq!(source.child("Key").unwrap().text(), r"Software\Test");
        assert_eq!(source.child("ValueName").unwrap().text(), "foo");
    }

    #[test]
    fn test_script_setting_element() {
        let el = script_setting().to_element().unwrap();
        assert_eq!(el.attribute("DataType"), Some("String"));

        let source = el.child("ScriptDiscoverySource").unwrap();
        assert_eq!(source.attribute("Is64Bit"), Some("false"));
        let detection = source.child("DiscoveryScriptBody").unwrap();
        assert_eq!(detection.attribute("ScriptType"), Some("PowerShell"));
        assert_eq!(detection.text(), "Write-Output 'ok'\n");
        assert_eq!(source.child("RunAsCurrentUser").unwrap().text(), "true");
    }

    #[test]
    fn test_fragment_keeps_identity_and_script_text() {
        let setting = script_setting();
        let fragment = setting.to_fragment().unwrap();

        assert_eq!(fragment.default_namespace(), Some(DESIRED_CONFIGURATION_NS));
        assert_eq!(
            fragment.attribute("LogicalName"),
            Some(setting.logical_name().as_str())
        );
        let source = fragment.child("ScriptDiscoverySource").unwrap();
        assert_eq!(source.child("RemediationScriptBody").unwrap().text(), "exit 0");
    }

    #[test]
    fn test_script_language_parse() {
        assert_eq!(ScriptLanguage::parse("vbscript").unwrap(), ScriptLanguage::VbScript);
        assert_eq!(ScriptLanguage::parse("PowerShell").unwrap(), ScriptLanguage::PowerShell);
        assert!(ScriptLanguage::parse("bash").is_err());
    }
}
