// SPDX-License-Identifier: Apache-2.0
//! A minimal, semantics-free tag tree plus its quick-xml-backed serialization
//! (§4.E). Everything that knows what an `Item` or a `Properties` block
//! *means* lives in [`crate::tform`]; this module only knows how to turn
//! bytes into nested named nodes with attributes and text, and back.

use quick_xml::events::{BytesCData, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;
use thiserror::Error;

/// Errors parsing or rendering the tag tree.
#[derive(Debug, Error)]
pub enum TagError {
    /// The underlying XML reader/writer reported a malformed document.
    #[error("malformed tag tree: {0}")]
    Malformed(String),
}

/// One node in the tag tree: a name, its attributes (in document order),
/// accumulated text content, and child nodes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Tag {
    /// Tag name, e.g. `"Item"` or `"int"`.
    pub name: String,
    /// Attributes in document order; lookups are linear (trees are small).
    pub attrs: Vec<(String, String)>,
    /// Concatenated text content of this tag (entities already unescaped).
    pub text: String,
    /// Whether `text` should be written back out as a `CDATA` section.
    pub cdata: bool,
    /// Child tags, in document order.
    pub children: Vec<Tag>,
}

impl Tag {
    /// A new, empty tag with no attributes, text, or children.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    /// Builder-style attribute attach.
    #[must_use]
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((key.into(), value.into()));
        self
    }

    /// Builder-style text attach.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Builder-style: mark this tag's text for CDATA rendering.
    #[must_use]
    pub fn as_cdata(mut self) -> Self {
        self.cdata = true;
        self
    }

    /// Builder-style child attach.
    #[must_use]
    pub fn with_child(mut self, child: Tag) -> Self {
        self.children.push(child);
        self
    }

    /// Look up the first attribute named `key`.
    #[must_use]
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// The first child named `name`.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&Tag> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All children named `name`.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Tag> {
        self.children.iter().filter(move |c| c.name == name)
    }
}

/// Parse a byte stream into the top-level sibling tags.
///
/// # Errors
///
/// Returns [`TagError::Malformed`] on ill-formed XML (mismatched tags,
/// invalid UTF-8, unterminated attributes).
pub fn parse(bytes: &[u8]) -> Result<Vec<Tag>, TagError> {
    let mut reader = Reader::from_reader(bytes);
    reader.trim_text(true);

    let mut roots: Vec<Tag> = Vec::new();
    let mut stack: Vec<Tag> = Vec::new();
    let mut buf = Vec::new();

    loop {
        let event = reader.read_event_into(&mut buf).map_err(|e| TagError::Malformed(e.to_string()))?;
        match event {
            Event::Start(start) => stack.push(tag_from_start(&start)?),
            Event::Empty(start) => {
                let tag = tag_from_start(&start)?;
                push_completed(&mut stack, &mut roots, tag);
            }
            Event::End(_end) => {
                let tag = stack.pop().ok_or_else(|| TagError::Malformed("unmatched close tag".to_string()))?;
                push_completed(&mut stack, &mut roots, tag);
            }
            Event::Text(text) => {
                let unescaped = text.unescape().map_err(|e| TagError::Malformed(e.to_string()))?;
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&unescaped);
                }
            }
            Event::CData(cdata) => {
                let raw = String::from_utf8_lossy(&cdata.into_inner()).into_owned();
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&raw);
                    top.cdata = true;
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(TagError::Malformed("unclosed tag at end of document".to_string()));
    }
    Ok(roots)
}

fn push_completed(stack: &mut Vec<Tag>, roots: &mut Vec<Tag>, tag: Tag) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(tag),
        None => roots.push(tag),
    }
}

fn tag_from_start(start: &BytesStart<'_>) -> Result<Tag, TagError> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut tag = Tag::new(name);
    for attr in start.attributes() {
        let attr = attr.map_err(|e| TagError::Malformed(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(|e| TagError::Malformed(e.to_string()))?.into_owned();
        tag.attrs.push((key, value));
    }
    Ok(tag)
}

/// Render top-level sibling tags back to bytes.
#[must_use]
pub fn render(tags: &[Tag]) -> Vec<u8> {
    let mut writer = Writer::new(Vec::new());
    for tag in tags {
        render_one(&mut writer, tag);
    }
    writer.into_inner()
}

fn render_one(writer: &mut Writer<Vec<u8>>, tag: &Tag) {
    if tag.children.is_empty() && tag.text.is_empty() {
        let mut start = BytesStart::new(tag.name.clone());
        for (k, v) in &tag.attrs {
            start.push_attribute((k.as_str(), v.as_str()));
        }
        let _ = writer.write_event(Event::Empty(start));
        return;
    }

    let mut start = BytesStart::new(tag.name.clone());
    for (k, v) in &tag.attrs {
        start.push_attribute((k.as_str(), v.as_str()));
    }
    let _ = writer.write_event(Event::Start(start));
    if !tag.text.is_empty() {
        if tag.cdata {
            let _ = writer.write_event(Event::CData(BytesCData::new(tag.text.as_str())));
        } else {
            let _ = writer.write_event(Event::Text(BytesText::new(tag.text.as_str())));
        }
    }
    for child in &tag.children {
        render_one(writer, child);
    }
    let _ = writer.write_event(Event::End(BytesEnd::new(tag.name.clone())));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_nested_tags_with_attributes_and_text() {
        let tags = vec![Tag::new("Item")
            .with_attr("class", "Part")
            .with_attr("referent", "RBX1")
            .with_child(Tag::new("Properties").with_child(Tag::new("int").with_attr("name", "X").with_text("5")))];
        let bytes = render(&tags);
        let parsed = parse(&bytes).unwrap();
        assert_eq!(parsed, tags);
    }

    #[test]
    fn cdata_round_trips() {
        let tags = vec![Tag::new("BinaryString").with_text("not ]] > special").as_cdata()];
        let bytes = render(&tags);
        let parsed = parse(&bytes).unwrap();
        assert_eq!(parsed[0].text, "not ]] > special");
        assert!(parsed[0].cdata);
    }

    #[test]
    fn empty_tag_round_trips() {
        let tags = vec![Tag::new("External").with_text("null")];
        let bytes = render(&tags);
        assert_eq!(parse(&bytes).unwrap(), tags);
    }

    #[test]
    fn mismatched_tags_are_rejected() {
        assert!(parse(b"<a><b></a></b>").is_err());
    }
}
