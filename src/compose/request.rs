//! Composite operation inputs
//!
//! Requests deserialize from TOML or JSON descriptors; hive, kind and data
//! spellings are normalized during deserialization so a bad descriptor is
//! rejected before anything runs.

use serde::{Deserialize, Serialize};

use crate::registry::{Hive, RegistryValueData, RegistryValueKind, ScalarType};
use crate::rule::RuleOptions;
use crate::setting::{ScriptLanguage, SettingKind};

/// A script Setting plus its equality Rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptRequest {
    /// Detection script source
    pub detection: String,

    /// Remediation script source
    pub remediation: String,

    /// Value the detection script prints when compliant
    pub compliant_value: String,

    /// Script language; the configured default when unset
    #[serde(default)]
    pub language: Option<ScriptLanguage>,

    /// Run as the logged-on user
    #[serde(default)]
    pub per_user: bool,

    #[serde(default)]
    pub is_64bit: Option<bool>,

    #[serde(flatten)]
    pub options: RuleOptions,
}

impl ScriptRequest {
    pub fn new(
        name: impl Into<String>,
        detection: impl Into<String>,
        remediation: impl Into<String>,
        compliant_value: impl Into<String>,
    ) -> Self {
        Self {
            detection: detection.into(),
            remediation: remediation.into(),
            compliant_value: compliant_value.into(),
            language: None,
            per_user: false,
            is_64bit: None,
            options: RuleOptions {
                name: Some(name.into()),
                ..Default::default()
            },
        }
    }
}

/// One registry value descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryValueRequest {
    pub hive: Hive,

    pub key_path: String,

    /// Value name; empty names the key's default value
    #[serde(default)]
    pub value_name: String,

    pub data: RegistryValueData,

    pub kind: RegistryValueKind,

    /// Check a DWORD through a native Int64 Setting instead of scripts
    #[serde(default)]
    pub convert_dword_to_qword: bool,

    #[serde(default)]
    pub is_64bit: Option<bool>,

    #[serde(flatten)]
    pub options: RuleOptions,
}

impl RegistryValueRequest {
    pub fn new(
        hive: Hive,
        key_path: impl Into<String>,
        value_name: impl Into<String>,
        data: impl Into<RegistryValueData>,
        kind: RegistryValueKind,
    ) -> Self {
        Self {
            hive,
            key_path: key_path.into(),
            value_name: value_name.into(),
            data: data.into(),
            kind,
            convert_dword_to_qword: false,
            is_64bit: None,
            options: RuleOptions::default(),
        }
    }

    pub fn convert_dword_to_qword(mut self, convert: bool) -> Self {
        self.convert_dword_to_qword = convert;
        self
    }

    pub fn options(mut self, options: RuleOptions) -> Self {
        self.options = options;
        self
    }

    /// `<short hive>\<key path>\<value name>`
    pub fn default_display_name(&self) -> String {
        format!(
            "{}\\{}\\{}",
            self.hive.short_name(),
            self.key_path.trim_matches('\\'),
            self.value_name
        )
    }
}

/// A Rule against a Setting that already exists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleRequest {
    pub setting_logical_name: String,

    pub setting_kind: SettingKind,

    pub data_type: ScalarType,

    pub compliant_value: String,

    #[serde(flatten)]
    pub options: RuleOptions,
}

/// A file of descriptors for batch use
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptors {
    #[serde(default, rename = "registry")]
    pub values: Vec<RegistryValueRequest>,
}
