//! Scratch-file round trip for freshly built fragments
//!
//! A fragment is serialized to a temporary file, read back, and parsed into
//! an owned tree ready for import. The file is removed when the handle drops,
//! so every exit path (including parse failures) cleans up.

use std::io::Write;
use std::path::Path;

use super::{Element, XmlDocument};
use crate::error::Result;

/// Serialize `fragment` through a scratch file and parse it back
pub fn round_trip(fragment: &Element) -> Result<Element> {
    let text = fragment.to_xml()?;
    parse_through_scratch(&std::env::temp_dir(), &text)
}

fn parse_through_scratch(dir: &Path, text: &str) -> Result<Element> {
    let mut scratch = tempfile::Builder::new()
        .prefix("dcmforge-fragment-")
        .suffix(".xml")
        .tempfile_in(dir)?;
    scratch.write_all(text.as_bytes())?;
    scratch.flush()?;

    let read_back = std::fs::read_to_string(scratch.path())?;
    tracing::trace!(
        path = %scratch.path().display(),
        bytes = read_back.len(),
        "Fragment round-tripped through scratch file"
    );

    Ok(XmlDocument::parse(&read_back)?.root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ComposeError;

    fn scratch_files(dir: &Path) -> usize {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry
                    .file_name()
                    .to_string_lossy()
                    .starts_with("dcmforge-fragment-")
            })
            .count()
    }

    #[test]
    fn test_round_trip_returns_equal_fragment() {
        let mut fragment =
            Element::build("SimpleSetting", &[("LogicalName", "x"), ("DataType", "String")])
                .unwrap();
        fragment.push_element(Element::with_text("Key", r"Software\Test").unwrap());

        let back = round_trip(&fragment).unwrap();
        assert_eq!(back, fragment);
    }

    #[test]
    fn test_scratch_file_removed_after_success() {
        let dir = tempfile::tempdir().unwrap();
        let fragment = Element::with_text("Key", "value").unwrap();

        let back = parse_through_scratch(dir.path(), &fragment.to_xml().unwrap()).unwrap();
        assert_eq!(back, fragment);
        assert_eq!(scratch_files(dir.path()), 0);
    }

    #[test]
    fn test_scratch_file_removed_after_parse_failure() {
        let dir = tempfile::tempdir().unwrap();

        let err = parse_through_scratch(dir.path(), "<SimpleSetting>").unwrap_err();
        assert!(matches!(err, ComposeError::Xml { .. }));
        assert_eq!(scratch_files(dir.path()), 0);
    }
}
