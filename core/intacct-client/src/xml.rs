//! Minimal XML element tree and the tree-to-record transform.
//!
//! Gateway responses are small, fully buffered documents, so they are read
//! into an owned tree once and then navigated by path.

use crate::error::{ClientError, ClientResult};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde_json::{Map, Value};

/// An owned XML element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    /// Local tag name.
    pub tag: String,
    /// Attributes in document order.
    pub attributes: Vec<(String, String)>,
    /// Concatenated character data, untrimmed.
    pub text: String,
    /// Child elements in document order.
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    /// Creates an empty element.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    /// Adds a child element.
    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(child);
        self
    }

    /// Sets the element text.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Returns the first direct child with the given tag.
    pub fn child(&self, tag: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.tag == tag)
    }

    /// Returns all direct children with the given tag.
    pub fn children_named<'a, 'b>(
        &'a self,
        tag: &'b str,
    ) -> impl Iterator<Item = &'a XmlElement> + 'b
    where
        'a: 'b,
    {
        self.children.iter().filter(move |c| c.tag == tag)
    }

    /// Follows a `/`-separated path of child tags, taking the first match at
    /// each step.
    pub fn find(&self, path: &str) -> Option<&XmlElement> {
        path.split('/')
            .filter(|step| !step.is_empty())
            .try_fold(self, |node, step| node.child(step))
    }

    /// Returns every element reachable through the `/`-separated path.
    pub fn find_all(&self, path: &str) -> Vec<&XmlElement> {
        let mut current = vec![self];
        for step in path.split('/').filter(|s| !s.is_empty()) {
            current = current
                .into_iter()
                .flat_map(move |node| node.children.iter().filter(move |c| c.tag == step))
                .collect();
        }
        current
    }

    /// Returns the first descendant (depth-first, document order) with the
    /// given tag.
    pub fn descendant(&self, tag: &str) -> Option<&XmlElement> {
        for child in &self.children {
            if child.tag == tag {
                return Some(child);
            }
            if let Some(found) = child.descendant(tag) {
                return Some(found);
            }
        }
        None
    }

    /// Trimmed text of the element at `path`; `None` if missing or blank.
    pub fn text_at(&self, path: &str) -> Option<&str> {
        self.find(path).and_then(XmlElement::trimmed_text)
    }

    /// Trimmed text of this element; `None` if blank.
    pub fn trimmed_text(&self) -> Option<&str> {
        let trimmed = self.text.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }

    /// Returns the value of an attribute.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Converts the element into a JSON value.
    ///
    /// - no children: trimmed text
    /// - children with distinct tags: an object keyed by tag
    /// - repeated sibling tags: an array in document order under that tag
    pub fn to_value(&self) -> Value {
        if self.children.is_empty() {
            return Value::String(self.text.trim().to_string());
        }

        let mut grouped: Vec<(&str, Vec<Value>)> = Vec::new();
        for child in &self.children {
            let value = child.to_value();
            match grouped.iter_mut().find(|(tag, _)| *tag == child.tag) {
                Some((_, values)) => values.push(value),
                None => grouped.push((child.tag.as_str(), vec![value])),
            }
        }

        let mut object = Map::new();
        for (tag, mut values) in grouped {
            let value = if values.len() == 1 {
                values.remove(0)
            } else {
                Value::Array(values)
            };
            object.insert(tag.to_string(), value);
        }
        Value::Object(object)
    }
}

/// Parses a complete XML document into its root element.
pub fn parse_document(xml: &str) -> ClientResult<XmlElement> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| malformed(format!("at byte {}: {e}", reader.buffer_position())))?;

        match event {
            Event::Start(start) => stack.push(open_element(&start)?),
            Event::Empty(start) => {
                let element = open_element(&start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| malformed("unbalanced closing tag".to_string()))?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(text) => {
                if let Some(top) = stack.last_mut() {
                    let unescaped = text.unescape().map_err(|e| malformed(e.to_string()))?;
                    top.text.push_str(&unescaped);
                }
            }
            Event::CData(data) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(malformed("unexpected end of document".to_string()));
    }
    root.ok_or_else(|| malformed("document has no root element".to_string()))
}

fn malformed(detail: impl std::fmt::Display) -> ClientError {
    ClientError::Protocol(format!("malformed XML: {detail}"))
}

fn open_element(start: &BytesStart<'_>) -> ClientResult<XmlElement> {
    let mut element = XmlElement::new(String::from_utf8_lossy(start.local_name().as_ref()));
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| malformed(e.to_string()))?;
        let value = attribute
            .unescape_value()
            .map_err(|e| malformed(e.to_string()))?;
        element.attributes.push((
            String::from_utf8_lossy(attribute.key.local_name().as_ref()).into_owned(),
            value.into_owned(),
        ));
    }
    Ok(element)
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> ClientResult<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => return Err(malformed("multiple root elements".to_string())),
    }
    Ok(())
}
