//! Reading and writing whole documents

use std::borrow::Cow;

use quick_xml::escape::{escape, unescape};
use quick_xml::events::attributes::Attribute as QuickAttribute;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesPI, BytesStart, BytesText, Event};
use quick_xml::name::QName;
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;

use super::{Element, Node};
use crate::error::{ComposeError, Result};

/// The `<?xml ...?>` declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub version: String,
    pub encoding: Option<String>,
    pub standalone: Option<String>,
}

impl Default for Declaration {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            encoding: Some("utf-8".to_string()),
            standalone: None,
        }
    }
}

/// Markup outside the root element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Misc {
    Comment(String),
    ProcessingInstruction(String),
    /// Raw DOCTYPE content
    DocType(String),
}

/// A parsed document: declaration, prolog, one root element, epilog
///
/// Whitespace-only text is kept in elements without element children and
/// dropped elsewhere; output is re-indented with two spaces. Line endings
/// are normalized on read and carriage returns are written as `&#xD;`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    pub declaration: Option<Declaration>,
    pub prolog: Vec<Misc>,
    pub root: Element,
    pub epilog: Vec<Misc>,
}

impl XmlDocument {
    pub fn new(root: Element) -> Self {
        Self {
            declaration: Some(Declaration::default()),
            prolog: Vec::new(),
            root,
            epilog: Vec::new(),
        }
    }

    /// Parse a document from text
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;
        let mut declaration = None;
        let mut prolog = Vec::new();
        let mut epilog = Vec::new();

        loop {
            let misc = match reader.read_event().map_err(ComposeError::xml)? {
                Event::Decl(decl) => {
                    declaration = Some(read_declaration(&decl)?);
                    None
                }
                Event::Start(start) => {
                    stack.push(element_from_start(&start)?);
                    None
                }
                Event::Empty(start) => {
                    let element = element_from_start(&start)?;
                    attach(&mut stack, &mut root, element)?;
                    None
                }
                Event::End(_) => {
                    let mut element = stack
                        .pop()
                        .ok_or_else(|| ComposeError::xml("unexpected closing tag"))?;
                    drop_indentation(&mut element);
                    attach(&mut stack, &mut root, element)?;
                    None
                }
                Event::Text(text) => {
                    if let Some(parent) = stack.last_mut() {
                        parent.push_node(Node::Text(read_escaped(&text)?));
                    }
                    None
                }
                Event::CData(data) => {
                    if let Some(parent) = stack.last_mut() {
                        let text = String::from_utf8_lossy(&data.into_inner()).into_owned();
                        parent.push_node(Node::CData(text));
                    }
                    None
                }
                Event::Comment(comment) => {
                    let text = String::from_utf8_lossy(&comment).into_owned();
                    match stack.last_mut() {
                        Some(parent) => {
                            parent.push_node(Node::Comment(text));
                            None
                        }
                        None => Some(Misc::Comment(text)),
                    }
                }
                Event::PI(pi) => {
                    let text = String::from_utf8_lossy(&pi).into_owned();
                    match stack.last_mut() {
                        Some(parent) => {
                            parent.push_node(Node::ProcessingInstruction(text));
                            None
                        }
                        None => Some(Misc::ProcessingInstruction(text)),
                    }
                }
                Event::DocType(doctype) => {
                    Some(Misc::DocType(String::from_utf8_lossy(&doctype).into_owned()))
                }
                Event::Eof => break,
            };

            if let Some(misc) = misc {
                if root.is_some() {
                    epilog.push(misc);
                } else {
                    prolog.push(misc);
                }
            }
        }

        if let Some(open) = stack.last() {
            return Err(ComposeError::xml(format!(
                "unclosed element <{}>",
                open.name()
            )));
        }

        let root = root.ok_or_else(|| ComposeError::xml("document has no root element"))?;
        Ok(Self {
            declaration,
            prolog,
            root,
            epilog,
        })
    }

    /// Serialize the document
    pub fn to_xml(&self) -> Result<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        if let Some(decl) = &self.declaration {
            let event = BytesDecl::new(
                &decl.version,
                decl.encoding.as_deref(),
                decl.standalone.as_deref(),
            );
            writer
                .write_event(Event::Decl(event))
                .map_err(ComposeError::xml)?;
        }
        for misc in &self.prolog {
            write_misc(&mut writer, misc)?;
        }
        write_element(&mut writer, &self.root)?;
        for misc in &self.epilog {
            write_misc(&mut writer, misc)?;
        }
        String::from_utf8(writer.into_inner()).map_err(ComposeError::xml)
    }
}

pub(super) fn write_fragment(element: &Element) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    write_element(&mut writer, element)?;
    String::from_utf8(writer.into_inner()).map_err(ComposeError::xml)
}

fn read_declaration(decl: &BytesDecl<'_>) -> Result<Declaration> {
    Ok(Declaration {
        version: lossy(decl.version().map_err(ComposeError::xml)?),
        encoding: decl
            .encoding()
            .transpose()
            .map_err(ComposeError::xml)?
            .map(lossy),
        standalone: decl
            .standalone()
            .transpose()
            .map_err(ComposeError::xml)?
            .map(lossy),
    })
}

fn lossy(bytes: Cow<'_, [u8]>) -> String {
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Unescape raw character data after end-of-line normalization
///
/// Literal `\r\n` and `\r` become `\n`; a `&#xD;` reference still yields `\r`.
fn read_escaped(raw: &[u8]) -> Result<String> {
    let raw = String::from_utf8_lossy(raw);
    let normalized = if raw.contains('\r') {
        Cow::Owned(raw.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        raw
    };
    Ok(unescape(&normalized).map_err(ComposeError::xml)?.into_owned())
}

fn escape_text(text: &str) -> String {
    escape(text).replace('\r', "&#xD;")
}

fn escape_attribute(value: &str) -> String {
    escape(value)
        .replace('\r', "&#xD;")
        .replace('\n', "&#xA;")
        .replace('\t', "&#x9;")
}

fn element_from_start(start: &BytesStart<'_>) -> Result<Element> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut element = Element::unchecked(name);
    for attr in start.attributes() {
        let attr = attr.map_err(ComposeError::xml)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = read_escaped(&attr.value)?;
        element.push_attribute_unchecked(key, value);
    }
    Ok(element)
}

/// Remove formatting whitespace between element children
fn drop_indentation(element: &mut Element) {
    let has_elements = element
        .children
        .iter()
        .any(|n| matches!(n, Node::Element(_)));
    if has_elements {
        element
            .children
            .retain(|n| !matches!(n, Node::Text(t) if t.trim().is_empty()));
    }
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.push_element(element);
        return Ok(());
    }
    if root.is_some() {
        return Err(ComposeError::xml("document has more than one root element"));
    }
    *root = Some(element);
    Ok(())
}

fn write_element<W: std::io::Write>(writer: &mut Writer<W>, element: &Element) -> Result<()> {
    let mut start = BytesStart::new(element.name());
    for attr in element.attributes() {
        let value = escape_attribute(&attr.value);
        start.push_attribute(QuickAttribute {
            key: QName(attr.name.as_bytes()),
            value: Cow::Borrowed(value.as_bytes()),
        });
    }

    if element.children().is_empty() {
        writer
            .write_event(Event::Empty(start))
            .map_err(ComposeError::xml)?;
        return Ok(());
    }

    writer
        .write_event(Event::Start(start))
        .map_err(ComposeError::xml)?;
    for child in element.children() {
        match child {
            Node::Element(e) => write_element(writer, e)?,
            Node::Text(t) => writer
                .write_event(Event::Text(BytesText::from_escaped(escape_text(t))))
                .map_err(ComposeError::xml)?,
            Node::CData(t) => writer
                .write_event(Event::CData(BytesCData::new(t.as_str())))
                .map_err(ComposeError::xml)?,
            Node::Comment(t) => writer
                .write_event(Event::Comment(BytesText::from_escaped(t.as_str())))
                .map_err(ComposeError::xml)?,
            Node::ProcessingInstruction(t) => writer
                .write_event(Event::PI(BytesPI::new(t.as_str())))
                .map_err(ComposeError::xml)?,
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.name())))
        .map_err(ComposeError::xml)?;
    Ok(())
}

fn write_misc<W: std::io::Write>(writer: &mut Writer<W>, misc: &Misc) -> Result<()> {
    let event = match misc {
        Misc::Comment(t) => Event::Comment(BytesText::from_escaped(t.as_str())),
        Misc::ProcessingInstruction(t) => Event::PI(BytesPI::new(t.as_str())),
        Misc::DocType(t) => Event::DocType(BytesText::from_escaped(t.as_str())),
    };
    writer.write_event(event).map_err(ComposeError::xml)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_write_preserves_structure() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<Root xmlns="urn:a" b="1" a="2">
  <!-- note -->
  <Child>text &amp; more</Child>
  <Empty/>
</Root>"#;
        let doc = XmlDocument::parse(xml).unwrap();
        assert_eq!(doc.declaration, Some(Declaration::default()));
        assert_eq!(doc.root.default_namespace(), Some("urn:a"));
        assert_eq!(doc.root.child("Child").unwrap().text(), "text & more");

        let written = doc.to_xml().unwrap();
        assert!(written.contains(r#"<Root xmlns="urn:a" b="1" a="2">"#));
        assert!(written.contains("<Child>text &amp; more</Child>"));
        assert!(written.contains("<Empty/>"));

        let reparsed = XmlDocument::parse(&written).unwrap();
        assert_eq!(reparsed, doc);
    }

    #[test]
    fn test_multiline_text_survives() {
        let mut root = Element::new("Body").unwrap();
        root.push_node(Node::Text("line1\nline2 \"q\" <x>".into()));
        let doc = XmlDocument::new(root);

        let reparsed = XmlDocument::parse(&doc.to_xml().unwrap()).unwrap();
        assert_eq!(reparsed.root.text(), "line1\nline2 \"q\" <x>");
    }

    #[test]
    fn test_rejects_malformed_documents() {
        assert!(XmlDocument::parse("").is_err());
        assert!(XmlDocument::parse("<a><b></a>").is_err());
        assert!(XmlDocument::parse("<a>").is_err());
        assert!(XmlDocument::parse("<a/><b/>").is_err());
    }

    #[test]
    fn test_unrelated_markup_survives_round_trip() {
        let xml = "<?xml version=\"1.0\" encoding=\"utf-8\" standalone=\"yes\"?>\n\
<?xml-stylesheet type=\"text/xsl\" href=\"ci.xsl\"?>\n\
<!DOCTYPE Root>\n\
<Root>\n  <Body note=\"a&#xD;&#xA;b\">line1&#xD;\nline2</Body>\n  <Pad>   </Pad>\n  <?keep me?>\n</Root>\n\
<!-- trailer -->";
        let doc = XmlDocument::parse(xml).unwrap();
        let body = doc.root.child("Body").unwrap();
        assert_eq!(body.text(), "line1\r\nline2");
        assert_eq!(body.attribute("note"), Some("a\r\nb"));
        assert_eq!(doc.root.child("Pad").unwrap().text(), "   ");
        assert_eq!(
            doc.declaration.as_ref().and_then(|d| d.standalone.as_deref()),
            Some("yes")
        );

        let written = doc.to_xml().unwrap();
        assert!(written.contains("standalone=\"yes\""));
        assert!(written.contains("<?xml-stylesheet type=\"text/xsl\" href=\"ci.xsl\"?>"));
        assert!(written.contains("<!DOCTYPE Root>"));
        assert!(written.contains("line1&#xD;\nline2"));
        assert!(written.contains("note=\"a&#xD;&#xA;b\""));
        assert!(written.contains("<Pad>   </Pad>"));
        assert!(written.contains("<?keep me?>"));
        assert!(written.contains("<!-- trailer -->"));
        assert!(!written.contains('\r'));

        assert_eq!(XmlDocument::parse(&written).unwrap(), doc);
    }

    #[test]
    fn test_literal_line_endings_are_normalized() {
        let doc = XmlDocument::parse("<Root>a\r\nb\rc</Root>").unwrap();
        assert_eq!(doc.root.text(), "a\nb\nc");
        assert!(doc.declaration.is_none());
    }
}
