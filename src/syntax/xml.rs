//! Grammar document reader
//!
//!     Kate grammars are small XML documents, read once per grammar. Rather than driving the
//!     loader off a stream of reader events we build a tiny owned element tree first, which keeps
//!     the loader a plain tree walk.
//!
//!     Many real grammars declare shorthand entities in the DOCTYPE internal subset
//!     (`<!ENTITY int "(?:[0-9]++)">`) and use them inside rule attributes, so those declarations
//!     are collected and handed to quick-xml's unescaper, which also covers the predefined
//!     entities and numeric character references.

use crate::syntax::error::LoadError;
use once_cell::sync::Lazy;
use quick_xml::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;
use std::collections::HashMap;

static ENTITY_DECLARATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<!ENTITY\s+([A-Za-z_][\w.\-]*)\s+(?:"([^"]*)"|'([^']*)')\s*>"#).unwrap()
});

/// An element with its attributes (in document order), child elements and text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
    pub text: String,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// First child element with the given tag
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|child| child.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |child| child.name == name)
    }
}

/// Parse a complete document and return its root element
pub fn parse_document(source: &str) -> Result<Element, LoadError> {
    let mut reader = Reader::from_str(source);
    reader.trim_text(true);

    let mut entities: HashMap<String, String> = HashMap::new();
    let mut open: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let position = reader.buffer_position();
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(err) => {
                return Err(xml_error(format!(
                    "{} at byte {}",
                    err,
                    reader.buffer_position()
                )))
            }
        };
        match event {
            Event::DocType(doctype) => {
                collect_entities(&String::from_utf8_lossy(&doctype), &mut entities);
            }
            Event::Start(start) => open.push(open_element(&start, &entities)?),
            Event::Empty(start) => {
                let element = open_element(&start, &entities)?;
                close_element(element, &mut open, &mut root, position)?;
            }
            Event::End(_) => {
                let element = open.pop().ok_or_else(|| {
                    xml_error(format!("unexpected end tag at byte {}", position))
                })?;
                close_element(element, &mut open, &mut root, position)?;
            }
            Event::Text(text) => {
                if let Some(current) = open.last_mut() {
                    let raw = String::from_utf8_lossy(&text);
                    current.text.push_str(&unescape(&raw, &entities)?);
                }
            }
            Event::CData(data) => {
                if let Some(current) = open.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(unclosed) = open.last() {
        return Err(xml_error(format!("element <{}> is never closed", unclosed.name)));
    }
    root.ok_or_else(|| xml_error("document has no root element".to_string()))
}

fn xml_error(message: String) -> LoadError {
    LoadError::Xml { message }
}

fn collect_entities(doctype: &str, entities: &mut HashMap<String, String>) {
    for caps in ENTITY_DECLARATION.captures_iter(doctype) {
        let value = caps.get(2).or_else(|| caps.get(3)).map_or("", |m| m.as_str());
        entities.insert(caps[1].to_string(), value.to_string());
    }
}

fn open_element(
    start: &BytesStart<'_>,
    entities: &HashMap<String, String>,
) -> Result<Element, LoadError> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    for attribute in start.attributes() {
        let attribute = attribute
            .map_err(|err| xml_error(format!("bad attribute on <{}>: {}", name, err)))?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let raw = String::from_utf8_lossy(&attribute.value);
        attributes.push((key, unescape(&raw, entities)?));
    }
    Ok(Element {
        name,
        attributes,
        children: Vec::new(),
        text: String::new(),
    })
}

fn close_element(
    element: Element,
    open: &mut [Element],
    root: &mut Option<Element>,
    position: usize,
) -> Result<(), LoadError> {
    if let Some(parent) = open.last_mut() {
        parent.children.push(element);
    } else if root.is_some() {
        return Err(xml_error(format!(
            "second root element <{}> at byte {}",
            element.name, position
        )));
    } else {
        *root = Some(element);
    }
    Ok(())
}

fn unescape(raw: &str, entities: &HashMap<String, String>) -> Result<String, LoadError> {
    escape::unescape_with(raw, |name| entities.get(name).map(String::as_str))
        .map(|value| value.into_owned())
        .map_err(|err| xml_error(format!("bad entity reference in '{}': {}", raw, err)))
}
