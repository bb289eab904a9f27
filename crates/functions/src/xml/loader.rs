use super::tree::{NodeData, XmlDocument};
use crate::error::{Error, ErrorCode, Result};
use quick_xml::Reader;
use quick_xml::encoding::{Decoder, EncodingError, detect_encoding};
use quick_xml::events::{BytesStart, Event};
use std::borrow::Cow;
use std::path::Path;
use std::sync::Arc;

/// Parses XML files into immutable trees.
pub trait DocumentLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<XmlDocument>;
}

/// Permissive quick-xml backed loader.
///
/// Comments, processing instructions and the DOCTYPE are skipped (nothing is
/// validated), and adjacent text, CDATA and entity runs are merged into one
/// text node. Text is decoded with the declared or BOM-detected encoding and
/// line ends are normalized as in XML 1.0. Only structurally broken input is
/// rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuickXmlLoader;

impl DocumentLoader for QuickXmlLoader {
    fn load(&self, path: &Path) -> Result<XmlDocument> {
        let bytes = std::fs::read(path).map_err(|e| {
            let msg = format!("can't read XML file '{}': {e}", path.display());
            Error::from_code(ErrorCode::IOFailure, msg)
                .with_source(Some(Arc::new(e) as Arc<dyn std::error::Error + Send + Sync>))
        })?;
        parse_document(&bytes).map_err(|mut err| {
            err.message = format!("{} in '{}'", err.message, path.display());
            err
        })
    }
}

fn malformed(msg: impl Into<String>) -> Error {
    Error::from_code(ErrorCode::MalformedDocument, msg)
}

fn decoding(e: EncodingError) -> Error {
    malformed(format!("undecodable XML content: {e}"))
        .with_source(Some(Arc::new(e) as Arc<dyn std::error::Error + Send + Sync>))
}

fn decode<'b>(decoder: Decoder, bytes: &'b [u8]) -> Result<Cow<'b, str>> {
    decoder.decode(bytes).map_err(decoding)
}

struct TreeBuilder {
    nodes: Vec<NodeData>,
    open: Vec<usize>,
    root: Option<usize>,
    pending_text: String,
}

impl TreeBuilder {
    fn new() -> Self {
        Self {
            nodes: vec![NodeData::document()],
            open: vec![0],
            root: None,
            pending_text: String::new(),
        }
    }

    fn current(&self) -> usize {
        self.open.last().copied().unwrap_or(0)
    }

    fn flush_text(&mut self) -> Result<()> {
        if self.pending_text.is_empty() {
            return Ok(());
        }
        let text = std::mem::take(&mut self.pending_text);
        let parent = self.current();
        if parent == 0 {
            if text.trim().is_empty() {
                return Ok(());
            }
            return Err(malformed("text content outside of the root element"));
        }
        let idx = self.nodes.len();
        self.nodes.push(NodeData::text(text, parent));
        self.nodes[parent].children.push(idx);
        Ok(())
    }

    fn element(&mut self, start: &BytesStart<'_>, decoder: Decoder) -> Result<usize> {
        self.flush_text()?;
        let name = decode(decoder, start.name().as_ref())?.into_owned();
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| {
                malformed(format!("invalid attribute on <{name}>"))
                    .with_source(Some(Arc::new(e) as Arc<dyn std::error::Error + Send + Sync>))
            })?;
            let key = decode(decoder, attr.key.as_ref())?.into_owned();
            let raw = decode(decoder, &attr.value)?;
            // Unknown entities are kept verbatim.
            let value = quick_xml::escape::unescape(&raw)
                .map(Cow::into_owned)
                .unwrap_or_else(|_| raw.to_string());
            attributes.push((key, value));
        }
        let parent = self.current();
        if parent == 0 {
            if self.root.is_some() {
                return Err(malformed(format!("second root element <{name}>")));
            }
            self.root = Some(self.nodes.len());
        }
        let idx = self.nodes.len();
        self.nodes.push(NodeData::element(name, attributes, parent));
        self.nodes[parent].children.push(idx);
        Ok(idx)
    }

    fn close(&mut self) -> Result<()> {
        self.flush_text()?;
        if self.open.len() <= 1 {
            return Err(malformed("closing tag without matching opening tag"));
        }
        self.open.pop();
        Ok(())
    }

    fn finish(mut self) -> Result<XmlDocument> {
        self.flush_text()?;
        if self.open.len() > 1 {
            let idx = self.current();
            let name = self.nodes[idx].name.clone().unwrap_or_default();
            return Err(malformed(format!("unclosed element <{name}>")));
        }
        let root = self.root.ok_or_else(|| malformed("document has no root element"))?;
        Ok(XmlDocument::from_parts(self.nodes, root))
    }
}

fn predefined_entity(name: &str) -> Option<char> {
    match name {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "amp" => Some('&'),
        "apos" => Some('\''),
        "quot" => Some('"'),
        _ => None,
    }
}

/// Transcode input in an encoding the reader cannot scan (UTF-16) to UTF-8.
fn transcode(bytes: &[u8]) -> Result<Option<String>> {
    let Some((encoding, bom_len)) = detect_encoding(bytes) else {
        return Ok(None);
    };
    if encoding.is_ascii_compatible() {
        return Ok(None);
    }
    encoding
        .decode_without_bom_handling_and_without_replacement(&bytes[bom_len..])
        .map(|text| Some(text.into_owned()))
        .ok_or_else(|| malformed(format!("invalid {} content", encoding.name())))
}

/// Parse an in-memory XML document.
pub fn parse_document(bytes: &[u8]) -> Result<XmlDocument> {
    let transcoded = transcode(bytes)?;
    // A transcoded document is UTF-8 whatever its declaration says.
    let mut reader = match &transcoded {
        Some(text) => Reader::from_str(text),
        None => Reader::from_reader(bytes),
    };
    let mut builder = TreeBuilder::new();
    let mut buf = Vec::new();
    loop {
        let event = reader.read_event_into(&mut buf)?;
        let decoder = reader.decoder();
        match event {
            Event::Start(e) => {
                let idx = builder.element(&e, decoder)?;
                builder.open.push(idx);
            }
            Event::Empty(e) => {
                builder.element(&e, decoder)?;
            }
            Event::End(_) => builder.close()?,
            Event::Text(t) => builder
                .pending_text
                .push_str(&t.xml10_content().map_err(decoding)?),
            Event::CData(c) => builder
                .pending_text
                .push_str(&c.xml10_content().map_err(decoding)?),
            Event::GeneralRef(r) => {
                if let Some(ch) = r.resolve_char_ref()? {
                    builder.pending_text.push(ch);
                } else {
                    let name = r.decode().map_err(decoding)?;
                    match predefined_entity(&name) {
                        Some(ch) => builder.pending_text.push(ch),
                        None => {
                            // Undeclared entity; no DTD is consulted, keep it verbatim.
                            builder.pending_text.push('&');
                            builder.pending_text.push_str(&name);
                            builder.pending_text.push(';');
                        }
                    }
                }
            }
            Event::Eof => break,
            // comments, declaration, processing instructions, doctype
            _ => {}
        }
        buf.clear();
    }
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::tree::{NodeKind, XmlNode};
    use rstest::rstest;

    fn parse(xml: &str) -> Result<Arc<XmlDocument>> {
        parse_document(xml.as_bytes()).map(XmlDocument::into_shared)
    }

    #[test]
    fn comments_are_dropped_and_text_is_merged() {
        let doc = parse(
            "<?xml version=\"1.0\"?><!DOCTYPE r SYSTEM \"missing.dtd\">\
             <r>one<!-- gone --> two <![CDATA[<three>]]> &amp; &#65;</r>",
        )
        .unwrap();
        let root = XmlNode::root_element(&doc);
        let children = root.children();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].kind(), NodeKind::Text);
        assert_eq!(root.text_content(), "one two <three> & A");
    }

    #[test]
    fn attributes_are_unescaped() {
        let doc = parse(r#"<r a="x &lt; y" b='plain'/>"#).unwrap();
        let root = XmlNode::root_element(&doc);
        assert_eq!(root.attribute("a"), Some("x < y"));
        assert_eq!(root.attribute("b"), Some("plain"));
    }

    #[test]
    fn undeclared_entities_are_tolerated() {
        let doc = parse("<r>&nbsp;</r>").unwrap();
        assert_eq!(XmlNode::root_element(&doc).text_content(), "&nbsp;");
    }

    #[test]
    fn declared_latin1_is_decoded() {
        let doc = parse_document(
            b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><r n=\"\xE0\">caf\xE9</r>",
        )
        .unwrap()
        .into_shared();
        let root = XmlNode::root_element(&doc);
        assert_eq!(root.text_content(), "caf\u{e9}");
        assert_eq!(root.attribute("n"), Some("\u{e0}"));
    }

    #[test]
    fn utf16_with_bom_is_decoded() {
        let xml = "\u{feff}<?xml version=\"1.0\" encoding=\"UTF-16\"?><r><k>caf\u{e9}</k></r>";
        let bytes: Vec<u8> = xml.encode_utf16().flat_map(u16::to_le_bytes).collect();
        let doc = parse_document(&bytes).unwrap().into_shared();
        let root = XmlNode::root_element(&doc);
        assert_eq!(root.name(), Some("r"));
        assert_eq!(root.text_content(), "caf\u{e9}");
    }

    #[test]
    fn line_ends_are_normalized() {
        let doc = parse("<r>a\r\nb\rc<![CDATA[\r\nd]]></r>").unwrap();
        assert_eq!(XmlNode::root_element(&doc).text_content(), "a\nb\nc\nd");
    }

    #[rstest]
    #[case("<r><a></r>")]
    #[case("<r>")]
    #[case("")]
    #[case("<a/><b/>")]
    #[case("stray<r/>")]
    fn broken_structure_is_malformed(#[case] xml: &str) {
        let err = parse(xml).unwrap_err();
        assert_eq!(err.code, ErrorCode::MalformedDocument, "{xml}");
    }
}
