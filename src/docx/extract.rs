use std::collections::HashMap;
use std::ops::Range;

use tracing::warn;

use crate::ir::{SegmentContext, TargetKey, TargetKind, TextNodeRef, TextSegment, TextTarget};
use crate::ooxml::tree::{ElementTree, Namespace};
use crate::ooxml::xml::XmlPart;

pub const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

pub fn segment_id(part_path: &str, ordinal: usize) -> String {
    format!("docx-{}-run-{ordinal}", part_path.replace(['/', '.'], "-"))
}

/// Text of one `w:p` and the range of segments taken from it.
#[derive(Clone, Debug, PartialEq)]
pub struct ParagraphSpan {
    pub text: String,
    pub style: Option<String>,
    pub segments: Range<usize>,
}

/// Emits one segment per non-blank `w:t`, in document order.
///
/// Ordinals count every `w:t` in the part, blank ones included, so ids do
/// not shift when a run's content changes between passes. Returns the
/// paragraphs that produced at least one segment.
pub fn extract_runs(
    part: &XmlPart,
    default_context: SegmentContext,
    segments: &mut Vec<TextSegment>,
    targets: &mut HashMap<String, TextTarget>,
) -> Vec<ParagraphSpan> {
    let tree = ElementTree::build(part);
    let w = Namespace::resolve(&tree, part, W_NS, "w");
    let t = w.name("t");
    let tc = w.name("tc");
    let p = w.name("p");

    let mut paragraphs = Vec::new();
    let mut current: Option<(Option<usize>, ParagraphSpan)> = None;
    for (ordinal, id) in tree.all_named(&t).enumerate() {
        let para = tree.nearest_ancestor(id, &p);
        let same_paragraph = matches!(&current, Some((owner, _)) if para.is_some() && *owner == para);
        if !same_paragraph {
            paragraphs.extend(current.take().map(|(_, span)| span).filter(|s| !s.segments.is_empty()));
        }
        let (_, span) = current.get_or_insert_with(|| {
            let at = segments.len();
            let style = para.and_then(|pid| paragraph_style(&tree, part, &w, pid));
            (para, ParagraphSpan { text: String::new(), style, segments: at..at })
        });

        let node = tree.node(id);
        let text = tree.text(part, id);
        span.text.push_str(&text);
        if text.trim().is_empty() {
            continue;
        }
        let &[text_event_index] = node.texts.as_slice() else {
            warn!(part = %part.path, ordinal, "run text split across several nodes; left as is");
            continue;
        };
        let context = if tree.has_ancestor(id, &tc) {
            SegmentContext::TableCell
        } else {
            default_context
        };
        let seg_id = segment_id(&part.path, ordinal);
        targets.insert(
            seg_id.clone(),
            TextTarget {
                segment_id: seg_id.clone(),
                part_path: part.path.clone(),
                kind: TargetKind::Run,
                key: TargetKey::Run { ordinal },
                node: TextNodeRef {
                    elem_event_index: node.start,
                    text_event_index,
                },
                fingerprint: part.baseline_hash.clone(),
            },
        );
        segments.push(TextSegment {
            id: seg_id,
            text,
            xml_path: part.path.clone(),
            context,
            style: span.style.clone(),
        });
        span.segments.end = segments.len();
    }
    paragraphs.extend(current.map(|(_, span)| span).filter(|s| !s.segments.is_empty()));
    paragraphs
}

fn paragraph_style(tree: &ElementTree, part: &XmlPart, w: &Namespace, para: usize) -> Option<String> {
    let ppr = tree.first_child(para, &w.name("pPr"))?;
    let pstyle = tree.first_child(ppr, &w.name("pStyle"))?;
    tree.attr_local(part, pstyle, "val")
}

pub fn locate_run(part: &XmlPart, key: &TargetKey) -> Option<TextNodeRef> {
    let TargetKey::Run { ordinal } = key else {
        return None;
    };
    let tree = ElementTree::build(part);
    let w = Namespace::resolve(&tree, part, W_NS, "w");
    let t = w.name("t");
    let id = tree.all_named(&t).nth(*ordinal)?;
    let node = tree.node(id);
    Some(TextNodeRef {
        elem_event_index: node.start,
        text_event_index: *node.texts.first()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ooxml::xml::parse_xml_part;
    use crate::testutil::docx_document;

    fn extract(xml: &str, ctx: SegmentContext) -> (Vec<TextSegment>, HashMap<String, TextTarget>) {
        let part = parse_xml_part("word/document.xml", xml.as_bytes()).expect("parse");
        let mut segments = Vec::new();
        let mut targets = HashMap::new();
        extract_runs(&part, ctx, &mut segments, &mut targets);
        (segments, targets)
    }

    #[test]
    fn runs_in_document_order_with_table_context() {
        let xml = docx_document(
            r#"<w:p><w:r><w:rPr><w:b/></w:rPr><w:t xml:space="preserve">Hello </w:t></w:r><w:r><w:t>world</w:t></w:r></w:p>
<w:tbl><w:tr><w:tc><w:p><w:r><w:t>Cell</w:t></w:r></w:p></w:tc></w:tr></w:tbl>
<w:p><w:r><w:t>   </w:t></w:r><w:r><w:t>After</w:t></w:r></w:p>"#,
        );
        let (segments, targets) = extract(&xml, SegmentContext::Paragraph);
        let texts: Vec<&str> = segments.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["Hello ", "world", "Cell", "After"]);
        let ctxs: Vec<SegmentContext> = segments.iter().map(|s| s.context).collect();
        assert_eq!(
            ctxs,
            vec![
                SegmentContext::Paragraph,
                SegmentContext::Paragraph,
                SegmentContext::TableCell,
                SegmentContext::Paragraph
            ]
        );
        // the blank run still consumes ordinal 3
        assert_eq!(segments[3].id, "docx-word-document-xml-run-4");
        assert_eq!(targets.len(), 4);
    }

    #[test]
    fn paragraph_spans_carry_full_text_and_style() {
        let xml = docx_document(
            r#"<w:p><w:pPr><w:pStyle w:val="Heading2"/></w:pPr><w:r><w:t>Article</w:t></w:r><w:r><w:t xml:space="preserve"> </w:t></w:r><w:r><w:t>4</w:t></w:r></w:p>
<w:p><w:r><w:t>   </w:t></w:r></w:p>
<w:p><w:r><w:t>Body</w:t></w:r></w:p>"#,
        );
        let part = parse_xml_part("word/document.xml", xml.as_bytes()).expect("parse");
        let mut segments = Vec::new();
        let mut targets = HashMap::new();
        let paragraphs = extract_runs(&part, SegmentContext::Paragraph, &mut segments, &mut targets);
        assert_eq!(
            paragraphs,
            vec![
                ParagraphSpan {
                    text: "Article 4".to_string(),
                    style: Some("Heading2".to_string()),
                    segments: 0..2,
                },
                ParagraphSpan {
                    text: "Body".to_string(),
                    style: None,
                    segments: 2..3,
                },
            ]
        );
        assert_eq!(segments[1].style.as_deref(), Some("Heading2"));
        assert_eq!(segments[2].style, None);
    }

    #[test]
    fn ids_are_deterministic() {
        let xml = docx_document("<w:p><w:r><w:t>A</w:t></w:r><w:r><w:t>B</w:t></w:r></w:p>");
        let (a, _) = extract(&xml, SegmentContext::Paragraph);
        let (b, _) = extract(&xml, SegmentContext::Paragraph);
        assert_eq!(a, b);
    }

    #[test]
    fn ignores_drawing_and_deleted_text() {
        let xml = docx_document(
            r#"<w:p><w:del><w:r><w:delText>gone</w:delText></w:r></w:del><w:r><w:t>kept</w:t></w:r></w:p>"#,
        );
        let (segments, _) = extract(&xml, SegmentContext::Header);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "kept");
        assert_eq!(segments[0].context, SegmentContext::Header);
    }

    #[test]
    fn locate_matches_extraction_handle() {
        let xml = docx_document("<w:p><w:r><w:t>A</w:t></w:r><w:r><w:t>B</w:t></w:r></w:p>");
        let part = parse_xml_part("word/document.xml", xml.as_bytes()).expect("parse");
        let (_, targets) = extract(&xml, SegmentContext::Paragraph);
        for target in targets.values() {
            assert_eq!(locate_run(&part, &target.key), Some(target.node));
        }
        assert_eq!(locate_run(&part, &TargetKey::Run { ordinal: 9 }), None);
    }
}
