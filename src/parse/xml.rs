//! Minimal element tree over quick-xml.
//!
//! Element and attribute names keep only their local part, so
//! `catalog:eventid` is looked up as `eventid`.

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use super::ParseError;

/// One XML element with its attributes, text and children
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Follow a chain of first-matching children
    pub fn find(&self, path: &[&str]) -> Option<&Element> {
        path.iter().try_fold(self, |element, name| element.child(name))
    }

    /// Trimmed, non-empty text at `path`
    pub fn text_at(&self, path: &[&str]) -> Option<&str> {
        self.find(path)
            .map(|element| element.text.trim())
            .filter(|text| !text.is_empty())
    }
}

/// Parse a document into its root element
pub fn parse_xml(bytes: &[u8]) -> Result<Element, ParseError> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => stack.push(open(e)?),
            Ok(Event::Empty(ref e)) => {
                let element = open(e)?;
                attach(&mut stack, &mut root, element);
            }
            Ok(Event::End(_)) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| ParseError::Xml("unbalanced closing tag".to_string()))?;
                attach(&mut stack, &mut root, element);
            }
            Ok(Event::Text(ref t)) => {
                if let Some(top) = stack.last_mut() {
                    let text = t.unescape().map_err(|e| ParseError::Xml(e.to_string()))?;
                    top.text.push_str(&text);
                }
            }
            Ok(Event::CData(ref c)) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(c));
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(ParseError::Xml(format!(
                    "at byte {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
        }
        buf.clear();
    }

    if let Some(open) = stack.last() {
        return Err(ParseError::Xml(format!("unclosed element <{}>", open.name)));
    }
    root.ok_or_else(|| ParseError::Xml("document has no root element".to_string()))
}

fn open(start: &BytesStart<'_>) -> Result<Element, ParseError> {
    let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| ParseError::Xml(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| ParseError::Xml(e.to_string()))?
            .into_owned();
        attributes.push((key, value));
    }
    Ok(Element {
        name,
        attributes,
        ..Element::default()
    })
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => {
            if root.is_none() {
                *root = Some(element);
            }
        }
    }
}
