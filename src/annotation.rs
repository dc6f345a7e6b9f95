//! Display name / description annotations shared by Settings and Rules

use uuid::Uuid;

use crate::error::Result;
use crate::xml::Element;

/// Generate a localization resource id
pub fn resource_id() -> String {
    format!("ID-{}", Uuid::new_v4())
}

/// Build an `Annotation` element
///
/// `DisplayName` always carries a resource id. `Description` only carries
/// one when its text is non-empty.
pub fn annotation(display_name: &str, description: &str) -> Result<Element> {
    let mut annotation = Element::new("Annotation")?;

    let display_id = resource_id();
    annotation.push_element(Element::build(
        "DisplayName",
        &[("Text", display_name), ("ResourceID", display_id.as_str())],
    )?);

    let description = if description.is_empty() {
        Element::build("Description", &[("Text", "")])?
    } else {
        let description_id = resource_id();
        Element::build(
            "Description",
            &[("Text", description), ("ResourceID", description_id.as_str())],
        )?
    };
    annotation.push_element(description);

    Ok(annotation)
}
