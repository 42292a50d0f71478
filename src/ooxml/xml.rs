//! Lossless event-list model of one XML part.
//!
//! Parsing keeps every event (declaration, comments, processing
//! instructions, whitespace text) so that writing a part back yields the
//! same markup apart from the text nodes that were replaced.

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use anyhow::{bail, Context};
use encoding_rs::UTF_8;
use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use sha2::{Digest, Sha256};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Clone, Debug, PartialEq)]
pub enum XmlEvent {
    Decl {
        version: String,
        encoding: Option<String>,
        standalone: Option<String>,
    },
    /// Attribute values are kept exactly as written, entity references included.
    Start {
        name: String,
        attrs: Vec<(String, String)>,
    },
    End {
        name: String,
    },
    Empty {
        name: String,
        attrs: Vec<(String, String)>,
    },
    Text {
        text: String,
    },
    CData {
        body: String,
    },
    Comment {
        body: String,
    },
    Pi {
        body: String,
    },
    DocType {
        body: String,
    },
}

impl XmlEvent {
    pub fn attrs(&self) -> Option<&[(String, String)]> {
        match self {
            XmlEvent::Start { attrs, .. } | XmlEvent::Empty { attrs, .. } => Some(attrs),
            _ => None,
        }
    }

    fn attrs_mut(&mut self) -> Option<&mut Vec<(String, String)>> {
        match self {
            XmlEvent::Start { attrs, .. } | XmlEvent::Empty { attrs, .. } => Some(attrs),
            _ => None,
        }
    }

    fn from_reader(event: Event<'_>) -> anyhow::Result<Option<Self>> {
        let converted = match event {
            Event::Eof => return Ok(None),
            Event::Decl(decl) => XmlEvent::Decl {
                version: owned(decl.version().context("xml declaration without version")?),
                encoding: decl.encoding().and_then(|r| r.ok()).map(owned),
                standalone: decl.standalone().and_then(|r| r.ok()).map(owned),
            },
            Event::Start(tag) => XmlEvent::Start {
                name: owned(tag.name()),
                attrs: raw_attrs(&tag)?,
            },
            Event::Empty(tag) => XmlEvent::Empty {
                name: owned(tag.name()),
                attrs: raw_attrs(&tag)?,
            },
            Event::End(tag) => XmlEvent::End {
                name: owned(tag.name()),
            },
            Event::Text(text) => XmlEvent::Text {
                text: text.unescape().context("bad character reference")?.into_owned(),
            },
            Event::CData(data) => XmlEvent::CData {
                body: owned(data.into_inner()),
            },
            Event::Comment(text) => XmlEvent::Comment {
                body: owned(text.into_inner()),
            },
            Event::PI(pi) => XmlEvent::Pi {
                body: format!("{}{}", owned(pi.target()), owned(pi.content())),
            },
            Event::DocType(text) => XmlEvent::DocType {
                body: owned(text.into_inner()),
            },
        };
        Ok(Some(converted))
    }

    fn write_to(&self, out: &mut String) {
        match self {
            XmlEvent::Decl {
                version,
                encoding,
                standalone,
            } => {
                let _ = write!(out, r#"<?xml version="{version}""#);
                if let Some(enc) = encoding {
                    let _ = write!(out, r#" encoding="{enc}""#);
                }
                if let Some(sa) = standalone {
                    let _ = write!(out, r#" standalone="{sa}""#);
                }
                out.push_str("?>");
            }
            XmlEvent::Start { name, attrs } => write_tag(out, name, attrs, ">"),
            XmlEvent::Empty { name, attrs } => write_tag(out, name, attrs, "/>"),
            XmlEvent::End { name } => {
                let _ = write!(out, "</{name}>");
            }
            XmlEvent::Text { text } => out.push_str(&partial_escape(text)),
            XmlEvent::CData { body } => {
                let _ = write!(out, "<![CDATA[{body}]]>");
            }
            XmlEvent::Comment { body } => {
                let _ = write!(out, "<!--{body}-->");
            }
            XmlEvent::Pi { body } => {
                let _ = write!(out, "<?{body}?>");
            }
            XmlEvent::DocType { body } => {
                let _ = write!(out, "<!DOCTYPE{body}>");
            }
        }
    }
}

/// Output for replacement text. A raw CR would be read back as LF, so it is
/// written as a character reference; other C0 controls are not allowed in
/// XML 1.0 and are dropped.
fn write_replaced_text(out: &mut String, text: &str) {
    for ch in partial_escape(text).chars() {
        match ch {
            '\r' => out.push_str("&#xD;"),
            '\t' | '\n' => out.push(ch),
            c if c < ' ' => {}
            c => out.push(c),
        }
    }
}

fn write_tag(out: &mut String, name: &str, attrs: &[(String, String)], close: &str) {
    out.push('<');
    out.push_str(name);
    for (key, value) in attrs {
        let _ = write!(out, r#" {key}="{value}""#);
    }
    out.push_str(close);
}

fn owned(bytes: impl AsRef<[u8]>) -> String {
    String::from_utf8_lossy(bytes.as_ref()).into_owned()
}

fn raw_attrs(tag: &BytesStart<'_>) -> anyhow::Result<Vec<(String, String)>> {
    tag.attributes()
        .map(|attr| {
            let attr = attr.context("malformed attribute")?;
            Ok((owned(attr.key.as_ref()), owned(attr.value.as_ref())))
        })
        .collect()
}

#[derive(Clone, Debug)]
pub struct XmlPart {
    pub path: String,
    pub events: Vec<XmlEvent>,
    /// The entry started with a UTF-8 byte order mark.
    pub bom: bool,
    /// Structure hash taken at parse time.
    pub baseline_hash: String,
    replaced: BTreeSet<usize>,
}

impl XmlPart {
    pub fn text_at(&self, event_index: usize) -> Option<&str> {
        match self.events.get(event_index)? {
            XmlEvent::Text { text } => Some(text),
            _ => None,
        }
    }

    pub fn set_text(&mut self, event_index: usize, value: &str) -> anyhow::Result<()> {
        let Some(XmlEvent::Text { text }) = self.events.get_mut(event_index) else {
            bail!("{}: event {event_index} is not a text node", self.path);
        };
        value.clone_into(text);
        self.replaced.insert(event_index);
        Ok(())
    }

    pub fn set_attr(&mut self, elem_event_index: usize, key: &str, value: &str) {
        let Some(attrs) = self.events.get_mut(elem_event_index).and_then(XmlEvent::attrs_mut) else {
            return;
        };
        match attrs.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => value.clone_into(&mut slot.1),
            None => attrs.push((key.to_owned(), value.to_owned())),
        }
    }

    pub fn remove_attr(&mut self, elem_event_index: usize, key: &str) {
        if let Some(attrs) = self.events.get_mut(elem_event_index).and_then(XmlEvent::attrs_mut) {
            attrs.retain(|(k, _)| k != key);
        }
    }

    pub fn structure_unchanged(&self) -> bool {
        structure_hash(&self.events) == self.baseline_hash
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = String::new();
        for (i, event) in self.events.iter().enumerate() {
            match event {
                XmlEvent::Text { text } if self.replaced.contains(&i) => write_replaced_text(&mut out, text),
                _ => event.write_to(&mut out),
            }
        }
        let mut bytes = Vec::with_capacity(out.len() + UTF8_BOM.len());
        if self.bom {
            bytes.extend_from_slice(UTF8_BOM);
        }
        bytes.extend_from_slice(out.as_bytes());
        bytes
    }
}

/// Parses a part; the input must be UTF-8 with one balanced root element.
pub fn parse_xml_part(path: &str, bytes: &[u8]) -> anyhow::Result<XmlPart> {
    let (body, bom) = match bytes.strip_prefix(UTF8_BOM) {
        Some(rest) => (rest, true),
        None => (bytes, false),
    };
    let source: Cow<'_, str> = UTF_8
        .decode_without_bom_handling_and_without_replacement(body)
        .with_context(|| format!("{path} is not valid UTF-8"))?;

    let mut reader = Reader::from_str(&source);
    let config = reader.config_mut();
    config.trim_text(false);
    config.check_end_names = true;

    let mut events = Vec::new();
    let mut open = 0usize;
    let mut has_root = false;
    loop {
        let raw = reader
            .read_event()
            .with_context(|| format!("{path}: xml error near byte {}", reader.buffer_position()))?;
        let Some(event) = XmlEvent::from_reader(raw)? else {
            break;
        };
        match &event {
            XmlEvent::Start { .. } => {
                open += 1;
                has_root = true;
            }
            XmlEvent::Empty { .. } => has_root = true,
            XmlEvent::End { .. } => {
                open = open.checked_sub(1).context("closing tag without opening tag")?;
            }
            _ => {}
        }
        events.push(event);
    }
    if open > 0 {
        bail!("{path}: {open} element(s) left open at end of input");
    }
    if !has_root {
        bail!("{path}: no root element");
    }

    Ok(XmlPart {
        path: path.to_owned(),
        baseline_hash: structure_hash(&events),
        events,
        bom,
        replaced: BTreeSet::new(),
    })
}

pub fn local_name(name: &str) -> &str {
    match name.rsplit_once(':') {
        Some((_, local)) => local,
        None => name,
    }
}

fn holds_content(name: &str) -> bool {
    matches!(local_name(name), "t" | "v")
}

struct StructureHasher(Sha256);

impl StructureHasher {
    fn record(&mut self, tag: u8, fields: &[&str]) {
        self.0.update([tag]);
        for field in fields {
            self.0.update([0x1f]);
            self.0.update(field.as_bytes());
        }
        self.0.update([0x1e]);
    }

    /// Attribute order is not structural; `xml:space` is ignored entirely.
    fn tag(&mut self, name: &str, attrs: &[(String, String)]) {
        let sorted: BTreeMap<&str, &str> = attrs
            .iter()
            .filter(|(k, _)| k != "xml:space")
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let mut fields = vec![name];
        for (k, v) in sorted {
            fields.push(k);
            fields.push(v);
        }
        self.record(b'<', &fields);
    }
}

/// Hash of a part's markup with the text of `t`/`v` elements left out.
pub fn structure_hash(events: &[XmlEvent]) -> String {
    let mut h = StructureHasher(Sha256::new());
    let mut open: Vec<&str> = Vec::new();
    for event in events {
        match event {
            XmlEvent::Start { name, attrs } => {
                h.tag(name, attrs);
                open.push(name.as_str());
            }
            XmlEvent::Empty { name, attrs } => {
                h.tag(name, attrs);
                h.record(b'>', &[name.as_str()]);
            }
            XmlEvent::End { name } => {
                h.record(b'>', &[name.as_str()]);
                open.pop();
            }
            XmlEvent::Text { text } => {
                if !open.last().is_some_and(|el| holds_content(el)) {
                    h.record(b'T', &[text.as_str()]);
                }
            }
            XmlEvent::Decl {
                version,
                encoding,
                standalone,
            } => h.record(
                b'D',
                &[
                    version.as_str(),
                    encoding.as_deref().unwrap_or(""),
                    standalone.as_deref().unwrap_or(""),
                ],
            ),
            XmlEvent::CData { body } => h.record(b'C', &[body.as_str()]),
            XmlEvent::Comment { body } => h.record(b'!', &[body.as_str()]),
            XmlEvent::Pi { body } => h.record(b'?', &[body.as_str()]),
            XmlEvent::DocType { body } => h.record(b'Y', &[body.as_str()]),
        }
    }
    hex::encode(h.0.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn character_references_in_attributes_survive() {
        let xml = br#"<?xml version="1.0" encoding="UTF-8"?><v:shape xmlns:o="urn:o" o:gfxdata="A&#xD;&#xA;B" alt="a &amp; b"/>"#;
        let part = parse_xml_part("word/document.xml", xml).expect("parse");
        assert_eq!(part.to_bytes(), xml.to_vec());
    }

    #[test]
    fn rewrite_is_textually_stable() {
        let xml = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n<w:document xmlns:w=\"urn:w\"><w:body><w:p><w:r><w:t xml:space=\"preserve\"> a &amp; b &lt;c&gt; </w:t></w:r></w:p><!-- note --><?mso-application progid=\"Word.Document\"?><w:sectPr/></w:body></w:document>";
        let part = parse_xml_part("word/document.xml", xml.as_bytes()).expect("parse");
        assert_eq!(String::from_utf8(part.to_bytes()).expect("utf8"), xml);
    }

    #[test]
    fn bom_survives_round_trip() {
        let mut xml = UTF8_BOM.to_vec();
        xml.extend_from_slice(b"<a><t>x</t></a>");
        let part = parse_xml_part("a.xml", &xml).expect("parse");
        assert!(part.bom);
        assert_eq!(part.to_bytes(), xml);
    }

    #[test]
    fn malformed_xml_is_rejected() {
        assert!(parse_xml_part("bad.xml", b"<a><b></a>").is_err());
        assert!(parse_xml_part("bad.xml", b"<a>").is_err());
        assert!(parse_xml_part("bad.xml", b"").is_err());
        assert!(parse_xml_part("bad.xml", b"<!-- only a comment -->").is_err());
        assert!(parse_xml_part("bad.xml", b"<a>\xFF\xFE</a>").is_err());
    }

    #[test]
    fn structure_hash_ignores_content_text_and_space_attr() {
        let mut part = parse_xml_part("x.xml", b"<a><t>hello</t><b>keep</b></a>").expect("parse");
        part.set_text(2, "  bonjour  ").expect("set");
        part.set_attr(1, "xml:space", "preserve");
        assert!(part.structure_unchanged());
        part.set_text(5, "changed").expect("set");
        assert!(!part.structure_unchanged());
    }

    #[test]
    fn attribute_edits() {
        let mut part = parse_xml_part("x.xml", br#"<a><t xml:space="preserve">x</t></a>"#).expect("parse");
        part.set_attr(1, "xml:space", "default");
        assert_eq!(part.events[1].attrs(), Some(&[("xml:space".to_string(), "default".to_string())][..]));
        part.remove_attr(1, "xml:space");
        assert_eq!(part.to_bytes(), b"<a><t>x</t></a>".to_vec());
        assert!(part.set_text(1, "nope").is_err());
    }

    #[test]
    fn carriage_return_and_controls_in_replaced_text() {
        let mut part = parse_xml_part("x.xml", b"<a><t>x</t></a>").expect("parse");
        part.set_text(2, "a\rb\u{1}c\td").expect("set");
        let bytes = part.to_bytes();
        assert_eq!(bytes, b"<a><t>a&#xD;bc\td</t></a>".to_vec());
        let again = parse_xml_part("x.xml", &bytes).expect("reparse");
        assert_eq!(again.text_at(2), Some("a\rbc\td"));

        // line breaks already in the part are written back as they were
        let crlf = b"<a>\r\n<t>x</t>\r\n<t>y</t></a>";
        let mut part = parse_xml_part("x.xml", crlf).expect("parse");
        part.set_text(3, "z").expect("set");
        assert_eq!(part.to_bytes(), b"<a>\r\n<t>z</t>\r\n<t>y</t></a>".to_vec());
    }

    #[test]
    fn local_name_strips_prefix() {
        assert_eq!(local_name("w:t"), "t");
        assert_eq!(local_name("t"), "t");
    }
}
