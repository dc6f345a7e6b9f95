//! Registry type normalization
//!
//! Callers spell hives and data types many ways (`HKLM`, `HKEY_LOCAL_MACHINE`,
//! `LocalMachine`; `REG_SZ`, `String`). Everything downstream works on the
//! canonical forms defined here, and unknown spellings are rejected at the
//! boundary instead of being passed through.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ComposeError;

/// A registry hive in canonical form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Hive {
    ClassesRoot,
    CurrentUser,
    LocalMachine,
    Users,
    CurrentConfig,
}

impl Hive {
    /// Every accepted spelling, grouped by hive
    const ALIASES: &'static [(Hive, &'static [&'static str])] = &[
        (Hive::ClassesRoot, &["HKCR", "HKEY_CLASSES_ROOT", "ClassesRoot"]),
        (Hive::CurrentUser, &["HKCU", "HKEY_CURRENT_USER", "CurrentUser"]),
        (Hive::LocalMachine, &["HKLM", "HKEY_LOCAL_MACHINE", "LocalMachine"]),
        (Hive::Users, &["HKU", "HKEY_USERS", "Users"]),
        (Hive::CurrentConfig, &["HKCC", "HKEY_CURRENT_CONFIG", "CurrentConfig"]),
    ];

    /// Normalize a user-supplied hive spelling (case-insensitive)
    pub fn parse(s: &str) -> Result<Self, ComposeError> {
        let needle = s.trim();
        Self::ALIASES
            .iter()
            .find(|(_, aliases)| aliases.iter().any(|a| a.eq_ignore_ascii_case(needle)))
            .map(|(hive, _)| *hive)
            .ok_or_else(|| ComposeError::InvalidHive {
                value: s.to_string(),
            })
    }

    /// Canonical token written into Setting documents
    pub fn canonical(&self) -> &'static str {
        match self {
            Self::ClassesRoot => "HKEY_CLASSES_ROOT",
            Self::CurrentUser => "HKEY_CURRENT_USER",
            Self::LocalMachine => "HKEY_LOCAL_MACHINE",
            Self::Users => "HKEY_USERS",
            Self::CurrentConfig => "HKEY_CURRENT_CONFIG",
        }
    }

    /// Short form used in derived display names
    pub fn short_name(&self) -> &'static str {
        match self {
            Self::ClassesRoot => "HKCR",
            Self::CurrentUser => "HKCU",
            Self::LocalMachine => "HKLM",
            Self::Users => "HKU",
            Self::CurrentConfig => "HKCC",
        }
    }

    /// Numeric hive handle expected by the StdRegProv WMI provider
    pub fn wmi_handle(&self) -> &'static str {
        match self {
            Self::ClassesRoot => "&H80000000",
            Self::CurrentUser => "&H80000001",
            Self::LocalMachine => "&H80000002",
            Self::Users => "&H80000003",
            Self::CurrentConfig => "&H80000005",
        }
    }

    /// Whether checks against this hive run in the logged-on user's context
    pub fn is_per_user(&self) -> bool {
        matches!(self, Self::CurrentUser)
    }
}

impl fmt::Display for Hive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical())
    }
}

impl FromStr for Hive {
    type Err = ComposeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Hive {
    type Error = ComposeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Hive> for String {
    fn from(hive: Hive) -> Self {
        hive.canonical().to_string()
    }
}

/// Scalar data type of a registry-backed Setting
///
/// Only these two are natively remediable. Every other registry value kind
/// goes through a synthesized script instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistryDataType {
    String,
    Int64,
}

impl RegistryDataType {
    /// Normalize a data type spelling (case-insensitive)
    pub fn parse(s: &str) -> Result<Self, ComposeError> {
        let needle = s.trim();
        if ["REG_SZ", "String"].iter().any(|a| a.eq_ignore_ascii_case(needle)) {
            Ok(Self::String)
        } else if ["REG_QWORD", "QWORD", "Int64"]
            .iter()
            .any(|a| a.eq_ignore_ascii_case(needle))
        {
            Ok(Self::Int64)
        } else {
            Err(ComposeError::InvalidDataType {
                value: s.to_string(),
            })
        }
    }

    /// Canonical token
    pub fn canonical(&self) -> &'static str {
        ScalarType::from(*self).as_str()
    }
}

impl fmt::Display for RegistryDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical())
    }
}

impl FromStr for RegistryDataType {
    type Err = ComposeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Data types a Setting reference may carry in a Rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ScalarType {
    String,
    Int64,
    Boolean,
    DateTime,
    Double,
    Version,
    StringArray,
    Int64Array,
}

impl ScalarType {
    const ALL: [ScalarType; 8] = [
        Self::String,
        Self::Int64,
        Self::Boolean,
        Self::DateTime,
        Self::Double,
        Self::Version,
        Self::StringArray,
        Self::Int64Array,
    ];

    /// Parse a type name (case-insensitive); registry aliases are accepted too
    pub fn parse(s: &str) -> Result<Self, ComposeError> {
        if let Ok(registry) = RegistryDataType::parse(s) {
            return Ok(registry.into());
        }
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ComposeError::InvalidDataType {
                value: s.to_string(),
            })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "String",
            Self::Int64 => "Int64",
            Self::Boolean => "Boolean",
            Self::DateTime => "DateTime",
            Self::Double => "Double",
            Self::Version => "Version",
            Self::StringArray => "StringArray",
            Self::Int64Array => "Int64Array",
        }
    }
}

impl From<RegistryDataType> for ScalarType {
    fn from(t: RegistryDataType) -> Self {
        match t {
            RegistryDataType::String => Self::String,
            RegistryDataType::Int64 => Self::Int64,
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for ScalarType {
    type Error = ComposeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<ScalarType> for String {
    fn from(t: ScalarType) -> Self {
        t.as_str().to_string()
    }
}

/// Registry value kind as tagged by the caller (`REG_*`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RegistryValueKind {
    String,
    MultiString,
    ExpandString,
    DWord,
    QWord,
    Binary,
}

impl RegistryValueKind {
    /// Parse a `REG_*` tag (case-insensitive)
    pub fn parse(s: &str) -> Result<Self, ComposeError> {
        match s.trim().to_ascii_uppercase().as_str() {
            "REG_SZ" => Ok(Self::String),
            "REG_MULTI_SZ" => Ok(Self::MultiString),
            "REG_EXPAND_SZ" => Ok(Self::ExpandString),
            "REG_DWORD" => Ok(Self::DWord),
            "REG_QWORD" => Ok(Self::QWord),
            "REG_BINARY" => Ok(Self::Binary),
            _ => Err(ComposeError::InvalidValueKind {
                value: s.to_string(),
            }),
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Self::String => "REG_SZ",
            Self::MultiString => "REG_MULTI_SZ",
            Self::ExpandString => "REG_EXPAND_SZ",
            Self::DWord => "REG_DWORD",
            Self::QWord => "REG_QWORD",
            Self::Binary => "REG_BINARY",
        }
    }

    /// Data type of a registry Setting for this kind, if one can remediate it
    ///
    /// `DWord` maps to `Int64` only when the caller opted into the QWORD
    /// conversion.
    pub fn native_data_type(&self, convert_dword_to_qword: bool) -> Option<RegistryDataType> {
        match self {
            Self::String => Some(RegistryDataType::String),
            Self::QWord => Some(RegistryDataType::Int64),
            Self::DWord if convert_dword_to_qword => Some(RegistryDataType::Int64),
            _ => None,
        }
    }
}

impl fmt::Display for RegistryValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for RegistryValueKind {
    type Err = ComposeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RegistryValueKind {
    type Error = ComposeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<RegistryValueKind> for String {
    fn from(kind: RegistryValueKind) -> Self {
        kind.tag().to_string()
    }
}

/// Value data supplied for a registry value
///
/// Single values arrive as text (or a bare integer from TOML/JSON); list
/// values are used for multi-string and, optionally, binary data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RegistryValueData {
    Integer(i64),
    Single(String),
    List(Vec<String>),
}

impl RegistryValueData {
    /// Value as a single text
    pub fn text(&self, kind: RegistryValueKind) -> Result<String, ComposeError> {
        match self {
            Self::Integer(n) => Ok(n.to_string()),
            Self::Single(s) => Ok(s.clone()),
            Self::List(_) => Err(invalid_data(kind, "expected a single value, found a list")),
        }
    }

    /// Value as an ordered list of texts; a single value is a one-element list
    pub fn texts(&self) -> Vec<String> {
        match self {
            Self::Integer(n) => vec![n.to_string()],
            Self::Single(s) => vec![s.clone()],
            Self::List(items) => items.clone(),
        }
    }

    /// Value as a signed 64-bit integer (decimal or `0x` hex)
    pub fn integer(&self, kind: RegistryValueKind) -> Result<i64, ComposeError> {
        match self {
            Self::Integer(n) => Ok(*n),
            Self::Single(s) => parse_integer(s).ok_or_else(|| {
                invalid_data(kind, format!("'{}' is not an integer", s))
            }),
            Self::List(_) => Err(invalid_data(kind, "expected a single integer, found a list")),
        }
    }

    /// Value as a DWORD (`0..=u32::MAX`)
    pub fn dword(&self) -> Result<u32, ComposeError> {
        let kind = RegistryValueKind::DWord;
        let n = self.integer(kind)?;
        u32::try_from(n).map_err(|_| invalid_data(kind, format!("{} is out of DWORD range", n)))
    }

    /// Value as raw bytes
    ///
    /// Accepts `"01,ff,0a"`, `"01 ff 0a"`, `"01ff0a"`, or a list of byte
    /// tokens; each token may carry a `0x` prefix.
    pub fn bytes(&self) -> Result<Vec<u8>, ComposeError> {
        let kind = RegistryValueKind::Binary;
        let tokens: Vec<String> = match self {
            Self::Integer(n) => {
                return u8::try_from(*n)
                    .map(|b| vec![b])
                    .map_err(|_| invalid_data(kind, format!("{} is not a byte", n)));
            }
            Self::List(items) => items.iter().map(|t| t.trim().to_string()).collect(),
            Self::Single(s) => {
                let s = s.trim();
                if s.contains(',') || s.contains(char::is_whitespace) {
                    s.split(|c: char| c == ',' || c.is_whitespace())
                        .filter(|t| !t.is_empty())
                        .map(str::to_string)
                        .collect()
                } else {
                    let s = strip_hex_prefix(s);
                    if s.len() % 2 != 0 {
                        return Err(invalid_data(kind, "hex string has an odd number of digits"));
                    }
                    (0..s.len())
                        .step_by(2)
                        .map(|i| s.get(i..i + 2).unwrap_or_default().to_string())
                        .collect()
                }
            }
        };

        tokens
            .iter()
            .map(|t| {
                u8::from_str_radix(strip_hex_prefix(t), 16)
                    .map_err(|_| invalid_data(kind, format!("'{}' is not a hex byte", t)))
            })
            .collect()
    }
}

impl From<&str> for RegistryValueData {
    fn from(s: &str) -> Self {
        Self::Single(s.to_string())
    }
}

impl From<String> for RegistryValueData {
    fn from(s: String) -> Self {
        Self::Single(s)
    }
}

impl From<Vec<String>> for RegistryValueData {
    fn from(items: Vec<String>) -> Self {
        Self::List(items)
    }
}

fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

fn parse_integer(s: &str) -> Option<i64> {
    let s = s.trim();
    if s.starts_with("0x") || s.starts_with("0X") {
        i64::from_str_radix(strip_hex_prefix(s), 16).ok()
    } else {
        s.parse::<i64>().ok()
    }
}

fn invalid_data(kind: RegistryValueKind, message: impl Into<String>) -> ComposeError {
    ComposeError::InvalidValueData {
        kind: kind.tag().to_string(),
        message: message.into(),
    }
}
