//! Fallback script synthesis
//!
//! The Setting schema can only remediate `REG_SZ` and `REG_QWORD` values
//! natively. For every other value kind we emit a VBScript detection script
//! that prints `Compliant` / `NonCompliant`, and a remediation script that
//! creates the key when missing, writes the value, and reports the provider's
//! return code as its process exit code.
//!
//! Scripts are only emitted as text. Nothing here runs them.

use crate::error::Result;
use crate::registry::{Hive, RegistryValueData, RegistryValueKind};
use crate::setting::ScriptLanguage;

/// Output printed by a detection script when the value matches
pub const COMPLIANT: &str = "Compliant";

/// Output printed by a detection script when the value is absent or differs
pub const NON_COMPLIANT: &str = "NonCompliant";

/// Line-break constant used to split multi-line literals
pub const LINE_BREAK: &str = "vbCrLf";

const STD_REG_PROV: &str =
    r#"GetObject("winmgmts:{impersonationLevel=impersonate}!\\.\root\default:StdRegProv")"#;

/// Escape text as a VBScript string literal expression
///
/// Quotes are doubled, every line-ending style is normalized to a single
/// newline, and each newline becomes `" & vbCrLf & "` so the expression
/// evaluates back to the multi-line text.
pub fn escape_literal(text: &str) -> String {
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    let doubled = normalized.replace('"', "\"\"");
    let body = doubled.replace('\n', &format!("\" & {} & \"", LINE_BREAK));
    format!("\"{}\"", body)
}

/// Evaluate a literal expression produced by [`escape_literal`]
///
/// Returns the text with line breaks as `\n`, or `None` if the expression
/// is not a concatenation of quoted literals and line-break constants.
pub fn unescape_literal(expr: &str) -> Option<String> {
    let mut out = String::new();
    let mut rest = expr.trim();

    loop {
        rest = rest.strip_prefix('"')?;

        let mut end = None;
        let mut chars = rest.char_indices().peekable();
        while let Some((i, c)) = chars.next() {
            if c != '"' {
                out.push(c);
            } else if matches!(chars.peek(), Some((_, '"'))) {
                chars.next();
                out.push('"');
            } else {
                end = Some(i + 1);
                break;
            }
        }

        rest = rest[end?..].trim_start();
        if rest.is_empty() {
            return Some(out);
        }

        rest = rest.strip_prefix('&')?.trim_start();
        rest = rest.strip_prefix(LINE_BREAK)?.trim_start();
        rest = rest.strip_prefix('&')?.trim_start();
        out.push('\n');
    }
}

/// Value encoded for embedding in a script
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptValue {
    Text(String),
    Number(i64),
    TextArray(Vec<String>),
    ByteArray(Vec<u8>),
}

impl ScriptValue {
    /// Encode caller-supplied data for the given value kind
    pub fn encode(kind: RegistryValueKind, data: &RegistryValueData) -> Result<Self> {
        Ok(match kind {
            RegistryValueKind::String | RegistryValueKind::ExpandString => {
                Self::Text(data.text(kind)?)
            }
            RegistryValueKind::MultiString => Self::TextArray(data.texts()),
            RegistryValueKind::DWord => Self::Number(i64::from(data.dword()?)),
            RegistryValueKind::QWord => Self::Number(data.integer(kind)?),
            RegistryValueKind::Binary => Self::ByteArray(data.bytes()?),
        })
    }

    /// Script expression for this value
    pub fn literal(&self) -> String {
        match self {
            Self::Text(s) => escape_literal(s),
            Self::Number(n) => n.to_string(),
            Self::TextArray(items) => {
                let parts: Vec<String> = items.iter().map(|s| escape_literal(s)).collect();
                format!("Array({})", parts.join(", "))
            }
            Self::ByteArray(bytes) => {
                let parts: Vec<String> = bytes.iter().map(|b| b.to_string()).collect();
                format!("Array({})", parts.join(", "))
            }
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Self::TextArray(_) | Self::ByteArray(_))
    }
}

/// Registry location a synthesized script operates on
#[derive(Debug, Clone, Copy)]
pub struct RegistryTarget<'a> {
    pub hive: Hive,
    pub key_path: &'a str,
    pub value_name: &'a str,
}

/// A detection/remediation script pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedScripts {
    pub language: ScriptLanguage,
    pub detection: String,
    pub remediation: String,
}

/// Synthesize the script pair for one registry value
pub fn synthesize(
    target: RegistryTarget<'_>,
    kind: RegistryValueKind,
    value: &ScriptValue,
) -> SynthesizedScripts {
    tracing::debug!(
        hive = %target.hive,
        key_path = target.key_path,
        value_name = target.value_name,
        kind = %kind,
        "Synthesizing fallback scripts"
    );

    SynthesizedScripts {
        language: ScriptLanguage::VbScript,
        detection: detection_script(target, kind, value),
        remediation: remediation_script(target, kind, value),
    }
}

fn provider_methods(kind: RegistryValueKind) -> (&'static str, &'static str) {
    match kind {
        RegistryValueKind::String => ("GetStringValue", "SetStringValue"),
        RegistryValueKind::ExpandString => ("GetExpandedStringValue", "SetExpandedStringValue"),
        RegistryValueKind::MultiString => ("GetMultiStringValue", "SetMultiStringValue"),
        RegistryValueKind::DWord => ("GetDWORDValue", "SetDWORDValue"),
        RegistryValueKind::QWord => ("GetQWORDValue", "SetQWORDValue"),
        RegistryValueKind::Binary => ("GetBinaryValue", "SetBinaryValue"),
    }
}

fn write_preamble(out: &mut String, target: RegistryTarget<'_>) {
    let hive = target.hive.canonical();
    out.push_str(&format!("Const {} = {}\n", hive, target.hive.wmi_handle()));
    out.push_str(&format!("Set oReg = {}\n", STD_REG_PROV));
    out.push_str(&format!("strKeyPath = {}\n", escape_literal(target.key_path)));
    out.push_str(&format!("strValueName = {}\n", escape_literal(target.value_name)));
}

fn write_verdict_and_quit(out: &mut String, indent: &str, verdict: &str) {
    out.push_str(&format!("{}WScript.Echo \"{}\"\n", indent, verdict));
    out.push_str(&format!("{}WScript.Quit 0\n", indent));
}

fn detection_script(
    target: RegistryTarget<'_>,
    kind: RegistryValueKind,
    value: &ScriptValue,
) -> String {
    let hive = target.hive.canonical();
    let (getter, _) = provider_methods(kind);
    let mut out = String::new();

    write_preamble(&mut out, target);
    out.push_str(&format!("expected = {}\n", value.literal()));
    // GetExpandedStringValue returns the value with variables already expanded
    if kind == RegistryValueKind::ExpandString {
        out.push_str(
            "expected = CreateObject(\"WScript.Shell\").ExpandEnvironmentStrings(expected)\n",
        );
    }
    out.push_str(&format!(
        "oReg.{} {}, strKeyPath, strValueName, actual\n",
        getter, hive
    ));

    out.push_str("If IsNull(actual) Then\n");
    write_verdict_and_quit(&mut out, "    ", NON_COMPLIANT);
    out.push_str("End If\n");

    if value.is_array() {
        out.push_str("If UBound(actual) <> UBound(expected) Then\n");
        write_verdict_and_quit(&mut out, "    ", NON_COMPLIANT);
        out.push_str("End If\n");
        out.push_str("For i = 0 To UBound(expected)\n");
        out.push_str("    If actual(i) <> expected(i) Then\n");
        write_verdict_and_quit(&mut out, "        ", NON_COMPLIANT);
        out.push_str("    End If\n");
        out.push_str("Next\n");
        out.push_str(&format!("WScript.Echo \"{}\"\n", COMPLIANT));
    } else {
        out.push_str("If actual = expected Then\n");
        out.push_str(&format!("    WScript.Echo \"{}\"\n", COMPLIANT));
        out.push_str("Else\n");
        out.push_str(&format!("    WScript.Echo \"{}\"\n", NON_COMPLIANT));
        out.push_str("End If\n");
    }

    out
}

fn remediation_script(
    target: RegistryTarget<'_>,
    kind: RegistryValueKind,
    value: &ScriptValue,
) -> String {
    let hive = target.hive.canonical();
    let (_, setter) = provider_methods(kind);
    let mut out = String::new();

    write_preamble(&mut out, target);
    out.push_str(&format!("value = {}\n", value.literal()));
    out.push_str(&format!(
        "If oReg.EnumKey({}, strKeyPath, arrSubKeys) <> 0 Then\n",
        hive
    ));
    out.push_str(&format!("    result = oReg.CreateKey({}, strKeyPath)\n", hive));
    out.push_str("    If result <> 0 Then\n");
    out.push_str("        WScript.Quit result\n");
    out.push_str("    End If\n");
    out.push_str("End If\n");
    out.push_str(&format!(
        "result = oReg.{}({}, strKeyPath, strValueName, value)\n",
        setter, hive
    ));
    out.push_str("WScript.Quit result\n");

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn target() -> RegistryTarget<'static> {
        RegistryTarget {
            hive: Hive::LocalMachine,
            key_path: r"Software\Test",
            value_name: "foo",
        }
    }

    #[test]
    fn test_escape_literal_quotes_and_newlines() {
        assert_eq!(escape_literal("plain"), "\"plain\"");
        assert_eq!(escape_literal("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(
            escape_literal("a\r\nb\rc\nd"),
            "\"a\" & vbCrLf & \"b\" & vbCrLf & \"c\" & vbCrLf & \"d\""
        );
        assert_eq!(escape_literal(""), "\"\"");
    }

    #[test]
    fn test_unescape_rejects_garbage() {
        assert_eq!(unescape_literal("no quotes"), None);
        assert_eq!(unescape_literal("\"open"), None);
        assert_eq!(unescape_literal("\"a\" & vbTab & \"b\""), None);
    }

    #[test]
    fn test_dword_detection_is_single_value_comparison() {
        let value = ScriptValue::encode(RegistryValueKind::DWord, &"1".into()).unwrap();
        let scripts = synthesize(target(), RegistryValueKind::DWord, &value);

        assert_eq!(scripts.language, ScriptLanguage::VbScript);
        assert!(scripts.detection.contains("expected = 1\n"));
        assert!(scripts.detection.contains("oReg.GetDWORDValue HKEY_LOCAL_MACHINE"));
        assert!(scripts.detection.contains("If actual = expected Then"));
        assert!(!scripts.detection.contains("UBound"));
    }

    #[test]
    fn test_expand_string_detection_expands_expected() {
        let value =
            ScriptValue::encode(RegistryValueKind::ExpandString, &r"%windir%\Temp".into()).unwrap();
        let scripts = synthesize(target(), RegistryValueKind::ExpandString, &value);

        let expand = scripts
            .detection
            .find("ExpandEnvironmentStrings(expected)")
            .unwrap();
        let read = scripts.detection.find("oReg.GetExpandedStringValue").unwrap();
        assert!(expand < read);
        assert!(scripts.remediation.contains("value = \"%windir%\\Temp\"\n"));
        assert!(!scripts.remediation.contains("ExpandEnvironmentStrings"));
    }

    #[test]
    fn test_string_detection_compares_literal() {
        let value = ScriptValue::encode(RegistryValueKind::String, &"%windir%".into()).unwrap();
        let scripts = synthesize(target(), RegistryValueKind::String, &value);
        assert!(!scripts.detection.contains("ExpandEnvironmentStrings"));
    }

    #[test]
    fn test_multi_string_detection_short_circuits() {
        let data = RegistryValueData::List(vec!["one".into(), "two \"2\"".into()]);
        let value = ScriptValue::encode(RegistryValueKind::MultiString, &data).unwrap();
        let scripts = synthesize(target(), RegistryValueKind::MultiString, &value);

        assert!(scripts
            .detection
            .contains("expected = Array(\"one\", \"two \"\"2\"\"\")"));
        assert!(scripts.detection.contains("If IsNull(actual) Then"));
        assert!(scripts
            .detection
            .contains("If UBound(actual) <> UBound(expected) Then"));
        assert!(scripts.detection.contains("If actual(i) <> expected(i) Then"));
    }

    #[test]
    fn test_binary_encoded_as_byte_array() {
        let value = ScriptValue::encode(RegistryValueKind::Binary, &"01,ff".into()).unwrap();
        assert_eq!(value.literal(), "Array(1, 255)");

        let scripts = synthesize(target(), RegistryValueKind::Binary, &value);
        assert!(scripts.remediation.contains("oReg.SetBinaryValue(HKEY_LOCAL_MACHINE"));
    }

    #[test]
    fn test_remediation_creates_missing_key_before_write() {
        let value =
            ScriptValue::encode(RegistryValueKind::ExpandString, &"%windir%".into()).unwrap();
        let scripts = synthesize(target(), RegistryValueKind::ExpandString, &value);
        let remediation = &scripts.remediation;

        let create = remediation.find("oReg.CreateKey").unwrap();
        let set = remediation.find("oReg.SetExpandedStringValue").unwrap();
        assert!(remediation
            .contains("If oReg.EnumKey(HKEY_LOCAL_MACHINE, strKeyPath, arrSubKeys) <> 0 Then"));
        assert!(create < set);
        assert!(remediation.trim_end().ends_with("WScript.Quit result"));
    }

    #[test]
    fn test_current_user_hive_handle() {
        let value = ScriptValue::Number(3);
        let scripts = synthesize(
            RegistryTarget {
                hive: Hive::CurrentUser,
                key_path: "Software",
                value_name: "x",
            },
            RegistryValueKind::DWord,
            &value,
        );
        assert!(scripts
            .detection
            .starts_with("Const HKEY_CURRENT_USER = &H80000001\n"));
    }

    #[test]
    fn test_key_path_is_escaped() {
        let value = ScriptValue::Number(0);
        let scripts = synthesize(
            RegistryTarget {
                hive: Hive::LocalMachine,
                key_path: "Software\\\"Quoted\"",
                value_name: "v",
            },
            RegistryValueKind::DWord,
            &value,
        );
        assert!(scripts
            .detection
            .contains("strKeyPath = \"Software\\\"\"Quoted\"\"\"\n"));
    }

    proptest! {
        #[test]
        fn prop_escape_round_trips(
            parts in prop::collection::vec("[a-z\" ]{0,6}", 0..6),
            breaks in prop::collection::vec(prop::sample::select(vec!["\n", "\r\n", "\r"]), 0..6),
        ) {
            let mut text = String::new();
            for (i, part) in parts.iter().enumerate() {
                text.push_str(part);
                if let Some(br) = breaks.get(i) {
                    text.push_str(br);
                }
            }

            let expected = text.replace("\r\n", "\n").replace('\r', "\n");
            prop_assert_eq!(unescape_literal(&escape_literal(&text)), Some(expected));
        }
    }
}
