//! Element tree for configuration item documents
//!
//! A small owned tree over `quick-xml` events. Attributes are an ordered list
//! of name/value records so serialization is reproducible, and every name is
//! validated when an element is constructed.

mod document;
mod scratch;

pub use document::{Declaration, Misc, XmlDocument};
pub use scratch::round_trip;

use crate::error::{ComposeError, Result};

/// A single attribute record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

/// A child node of an element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    CData(String),
    Comment(String),
    ProcessingInstruction(String),
}

/// An XML element with ordered attributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: String,
    attributes: Vec<Attribute>,
    children: Vec<Node>,
}

impl Element {
    /// Create an element, validating its name
    pub fn new(name: &str) -> Result<Self> {
        if !is_valid_name(name) {
            return Err(ComposeError::attribute(name, "invalid element name"));
        }
        Ok(Self::unchecked(name.to_string()))
    }

    /// Create an element with attributes in the given order
    pub fn build(name: &str, attributes: &[(&str, &str)]) -> Result<Self> {
        let mut element = Self::new(name)?;
        for (attr, value) in attributes {
            element.push_attribute(attr, value)?;
        }
        Ok(element)
    }

    /// Create an element holding a single text child
    pub fn with_text(name: &str, text: &str) -> Result<Self> {
        let mut element = Self::new(name)?;
        element.children.push(Node::Text(text.to_string()));
        Ok(element)
    }

    pub(crate) fn unchecked(name: String) -> Self {
        Self {
            name,
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub(crate) fn push_attribute_unchecked(&mut self, name: String, value: String) {
        self.attributes.push(Attribute { name, value });
    }

    /// Declare the default namespace as the first attribute
    pub(crate) fn declare_default_namespace(&mut self, namespace: &str) {
        self.remove_attribute("xmlns");
        self.attributes.insert(
            0,
            Attribute {
                name: "xmlns".to_string(),
                value: namespace.to_string(),
            },
        );
    }

    /// Append an attribute; rejects invalid names and duplicates
    pub fn push_attribute(&mut self, name: &str, value: &str) -> Result<()> {
        if !is_valid_name(name) {
            return Err(ComposeError::attribute(
                &self.name,
                format!("invalid attribute name '{}'", name),
            ));
        }
        if self.attribute(name).is_some() {
            return Err(ComposeError::attribute(
                &self.name,
                format!("duplicate attribute '{}'", name),
            ));
        }
        self.attributes.push(Attribute {
            name: name.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }

    /// Qualified name as written
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name without its namespace prefix
    pub fn local_name(&self) -> &str {
        local_part(&self.name)
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Remove an attribute, returning its value
    pub fn remove_attribute(&mut self, name: &str) -> Option<String> {
        let pos = self.attributes.iter().position(|a| a.name == name)?;
        Some(self.attributes.remove(pos).value)
    }

    /// Default namespace declared on this element
    pub fn default_namespace(&self) -> Option<&str> {
        self.attribute("xmlns")
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub(crate) fn push_node(&mut self, node: Node) {
        self.children.push(node);
    }

    /// Append a child element as the last child
    ///
    /// Whitespace-only text becomes formatting once the element has element
    /// children, and is removed.
    pub fn push_element(&mut self, child: Element) {
        self.children
            .retain(|n| !matches!(n, Node::Text(t) if t.trim().is_empty()));
        self.children.push(Node::Element(child));
    }

    /// Child elements in document order
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    fn child_elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    /// First child element with the given local name
    pub fn child(&self, local_name: &str) -> Option<&Element> {
        self.child_elements().find(|e| e.local_name() == local_name)
    }

    pub fn child_mut(&mut self, local_name: &str) -> Option<&mut Element> {
        self.child_elements_mut()
            .find(|e| e.local_name() == local_name)
    }

    /// First child element of any name
    pub fn first_child_element_mut(&mut self) -> Option<&mut Element> {
        self.child_elements_mut().next()
    }

    /// Concatenated text and CDATA content of direct children
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|n| match n {
                Node::Text(t) | Node::CData(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Depth-first search for every element with the given local name
    pub fn descendants<'a>(&'a self, local_name: &str, out: &mut Vec<&'a Element>) {
        for child in self.child_elements() {
            if child.local_name() == local_name {
                out.push(child);
            }
            child.descendants(local_name, out);
        }
    }

    /// Serialize this element alone, without an XML declaration
    pub fn to_xml(&self) -> Result<String> {
        document::write_fragment(self)
    }
}

fn local_part(name: &str) -> &str {
    name.rsplit_once(':').map(|(_, local)| local).unwrap_or(name)
}

/// Loose XML `Name` production check
fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | ':' | '-' | '.'))
}
