//! # Element Tree
//!
//! Minimal ordered XML tree used to assemble request bodies.
//!
//! Children and attributes keep insertion order because the target schema
//! defines fixed sequences. Text and attribute values are escaped on
//! serialization; pre-rendered fragments are embedded verbatim as `Raw` nodes.

use std::borrow::Cow;

use quick_xml::escape::{escape, partial_escape};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::errors::NfseError;

/// A node inside an element's child list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    /// Character data, escaped on output
    Text(String),
    /// Markup emitted as-is
    Raw(String),
}

/// An XML element with ordered attributes and children.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct XmlElement {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<XmlNode>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Element holding a single text node.
    pub fn with_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(name).text(text)
    }

    pub fn attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.children.push(XmlNode::Text(text.into()));
        self
    }

    pub fn child(mut self, child: XmlElement) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    /// Append `child` only when present.
    pub fn optional_child(mut self, child: Option<XmlElement>) -> Self {
        if let Some(child) = child {
            self.children.push(XmlNode::Element(child));
        }
        self
    }

    /// Shorthand for `child(XmlElement::with_text(name, text))`.
    pub fn text_child(self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.child(XmlElement::with_text(name, text))
    }

    pub fn raw(mut self, markup: impl Into<String>) -> Self {
        self.children.push(XmlNode::Raw(markup.into()));
        self
    }

    pub fn push(&mut self, node: XmlNode) {
        self.children.push(node);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn children(&self) -> &[XmlNode] {
        &self.children
    }

    /// First direct child element named `name`.
    pub fn find(&self, name: &str) -> Option<&XmlElement> {
        self.child_elements().find(|e| e.name == name)
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(e) => Some(e),
            _ => None,
        })
    }

    /// Index in the child list of the first direct child element named `name`.
    pub fn child_position(&self, name: &str) -> Option<usize> {
        self.children
            .iter()
            .position(|node| matches!(node, XmlNode::Element(e) if e.name == name))
    }

    /// Concatenated text of the direct text children.
    pub fn text_content(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                XmlNode::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Move the direct child `moved` so that it immediately precedes the direct
    /// child `anchor`. Returns `false` when either child is missing.
    pub fn move_child_before(&mut self, moved: &str, anchor: &str) -> bool {
        let (Some(from), Some(_)) = (self.child_position(moved), self.child_position(anchor))
        else {
            return false;
        };
        let node = self.children.remove(from);
        // anchor index shifts when the moved node sat before it
        let Some(to) = self.child_position(anchor) else {
            self.children.insert(from, node);
            return false;
        };
        self.children.insert(to, node);
        true
    }

    /// Depth-first search (self included) for the first element whose direct
    /// children satisfy `predicate`.
    pub fn find_descendant_mut<F>(&mut self, predicate: &F) -> Option<&mut XmlElement>
    where
        F: Fn(&XmlElement) -> bool,
    {
        if predicate(self) {
            return Some(self);
        }
        self.children.iter_mut().find_map(|node| match node {
            XmlNode::Element(e) => e.find_descendant_mut(predicate),
            _ => None,
        })
    }

    /// Serialize the tree. No XML declaration is emitted.
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        self.write_to(&mut out);
        out
    }

    fn write_to(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attributes {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(&escape(value.as_str()));
            out.push('"');
        }
        out.push('>');
        for node in &self.children {
            match node {
                XmlNode::Element(e) => e.write_to(out),
                XmlNode::Text(t) => out.push_str(&partial_escape(t.as_str())),
                XmlNode::Raw(r) => out.push_str(r),
            }
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }

    /// Parse a single-rooted fragment into a tree.
    ///
    /// Comments, processing instructions and declarations are dropped; CDATA
    /// sections are kept verbatim as `Raw` nodes.
    ///
    /// # Errors
    /// * `NfseError::MalformedDocument` - unbalanced tags, bad escapes, or
    ///   zero/multiple root elements
    pub fn parse(fragment: &str) -> Result<XmlElement, NfseError> {
        let mut reader = Reader::from_str(fragment);
        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            match reader.read_event().map_err(malformed)? {
                Event::Start(start) => stack.push(element_from_start(&start)?),
                Event::Empty(start) => {
                    let element = element_from_start(&start)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack.pop().ok_or_else(|| {
                        NfseError::MalformedDocument("unexpected closing tag".to_string())
                    })?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(text) => {
                    let text = text.unescape().map_err(malformed)?;
                    match stack.last_mut() {
                        Some(parent) => parent.push(XmlNode::Text(text.into_owned())),
                        None if text.trim().is_empty() => {}
                        None => {
                            return Err(NfseError::MalformedDocument(
                                "text outside of the root element".to_string(),
                            ))
                        }
                    }
                }
                Event::CData(cdata) => {
                    let inner = String::from_utf8_lossy(&cdata.into_inner()).into_owned();
                    if let Some(parent) = stack.last_mut() {
                        parent.push(XmlNode::Raw(format!("<![CDATA[{inner}]]>")));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(NfseError::MalformedDocument(
                "unclosed element at end of input".to_string(),
            ));
        }
        root.ok_or_else(|| NfseError::MalformedDocument("no root element".to_string()))
    }
}

fn element_from_start(start: &BytesStart<'_>) -> Result<XmlElement, NfseError> {
    let mut element = XmlElement::new(String::from_utf8_lossy(start.name().as_ref()));
    for attribute in start.attributes() {
        let attribute = attribute.map_err(malformed)?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value: Cow<'_, str> = attribute.unescape_value().map_err(malformed)?;
        element.attributes.push((key, value.into_owned()));
    }
    Ok(element)
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<(), NfseError> {
    match stack.last_mut() {
        Some(parent) => {
            parent.push(XmlNode::Element(element));
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(NfseError::MalformedDocument(
            "more than one root element".to_string(),
        )),
    }
}

fn malformed(e: impl std::fmt::Display) -> NfseError {
    NfseError::MalformedDocument(e.to_string())
}

/// Insert `addition` right before the closing tag of the document's root
/// element.
///
/// The closing tag is located by walking the parser events, so prologs,
/// signatures or trailing whitespace around it do not matter.
///
/// # Errors
/// * `NfseError::MalformedDocument` - the document cannot be parsed or has no
///   closed root element
pub fn insert_before_root_end(document: &str, addition: &str) -> Result<String, NfseError> {
    let mut reader = Reader::from_str(document);
    let mut depth = 0usize;
    let mut root_end = None;

    loop {
        match reader.read_event().map_err(malformed)? {
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    NfseError::MalformedDocument("unexpected closing tag".to_string())
                })?;
                if depth == 0 {
                    root_end = Some(usize::try_from(reader.buffer_position()).map_err(malformed)?);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let tag_end = root_end
        .ok_or_else(|| NfseError::MalformedDocument("no closed root element".to_string()))?;
    let head = document
        .get(..tag_end)
        .ok_or_else(|| NfseError::MalformedDocument("root end outside document".to_string()))?;
    let tag_start = head
        .rfind("</")
        .ok_or_else(|| NfseError::MalformedDocument("root closing tag not found".to_string()))?;

    let mut out = String::with_capacity(document.len() + addition.len());
    out.push_str(&document[..tag_start]);
    out.push_str(addition);
    out.push_str(&document[tag_start..]);
    Ok(out)
}
