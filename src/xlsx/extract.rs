use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::ir::{
    SegmentContext, SkipReason, SkippedCell, TargetKey, TargetKind, TextNodeRef, TextSegment,
    TextTarget,
};
use crate::ooxml::tree::{ElementTree, Namespace};
use crate::ooxml::xml::XmlPart;

use super::shared_strings::{classify_item, locate_shared, SharedStrings, StringItem};
use super::workbook::{SheetInfo, S_NS};

static CELL_REF_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]{1,3}[0-9]+$").expect("cell ref"));

pub fn segment_id(sheet_index: usize, cell_ref: &str) -> String {
    format!("xlsx-s{sheet_index}-{cell_ref}")
}

/// Cell `t` values that can carry text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TextCellType {
    Shared,
    Inline,
    FormulaString,
}

impl TextCellType {
    fn from_attr(value: Option<&str>) -> Option<Self> {
        match value? {
            "s" => Some(Self::Shared),
            "inlineStr" => Some(Self::Inline),
            "str" => Some(Self::FormulaString),
            _ => None,
        }
    }
}

enum CellContent {
    Bound {
        text: String,
        kind: TargetKind,
        part_path: String,
        node: TextNodeRef,
        shared_index: Option<usize>,
    },
    Skip {
        reason: SkipReason,
        text: Option<String>,
    },
}

impl CellContent {
    fn text(&self) -> Option<&str> {
        match self {
            CellContent::Bound { text, .. } => Some(text),
            CellContent::Skip { text, .. } => text.as_deref(),
        }
    }

    fn skip(reason: SkipReason, text: Option<String>) -> Self {
        CellContent::Skip { reason, text }
    }
}

#[derive(Default)]
pub(crate) struct SheetExtraction {
    pub segments: Vec<TextSegment>,
    pub targets: HashMap<String, TextTarget>,
    pub skipped: Vec<SkippedCell>,
    pub detected_text_cells: usize,
}

impl SheetExtraction {
    pub fn extract_sheet(&mut self, sheet: &SheetInfo, part: &XmlPart, sst: Option<(&SharedStrings, &XmlPart)>) {
        let tree = ElementTree::build(part);
        let ns = Namespace::resolve(&tree, part, S_NS, "");
        let c = ns.name("c");
        let f = ns.name("f");
        let mut seen_refs: HashSet<String> = HashSet::new();

        for cell in tree.all_named(&c) {
            let Some(cell_type) = TextCellType::from_attr(tree.attr(part, cell, "t").as_deref()) else {
                continue;
            };
            let content = resolve_content(&tree, part, &ns, cell, cell_type, sst);
            if content.text().is_some_and(|t| !t.trim().is_empty()) {
                self.detected_text_cells += 1;
            }

            let cell_ref = tree.attr(part, cell, "r");
            let Some(cell_ref) = cell_ref.filter(|r| CELL_REF_RE.is_match(r)) else {
                self.record(sheet, tree.attr(part, cell, "r"), SkipReason::MalformedCellReference, &content);
                continue;
            };
            if !seen_refs.insert(cell_ref.clone()) {
                // a second cell with the same address would share the first one's id
                self.record(sheet, Some(cell_ref), SkipReason::MalformedCellReference, &content);
                continue;
            }
            if tree.first_child(cell, &f).is_some() {
                self.record(sheet, Some(cell_ref), SkipReason::FormulaCell, &content);
                continue;
            }
            match content {
                CellContent::Skip { reason, text } => self.skipped.push(SkippedCell {
                    sheet: sheet.name.clone(),
                    cell_ref: Some(cell_ref),
                    reason,
                    text,
                }),
                CellContent::Bound {
                    text,
                    kind,
                    part_path,
                    node,
                    shared_index,
                } => {
                    if text.trim().is_empty() {
                        continue;
                    }
                    let seg_id = segment_id(sheet.index, &cell_ref);
                    let key = match shared_index {
                        Some(index) => TargetKey::SharedString {
                            index,
                            sheet: sheet.name.clone(),
                            cell_ref,
                        },
                        None => TargetKey::Cell {
                            sheet: sheet.name.clone(),
                            cell_ref,
                        },
                    };
                    let fingerprint = match (shared_index, sst) {
                        (Some(_), Some((_, sst_part))) => sst_part.baseline_hash.clone(),
                        _ => part.baseline_hash.clone(),
                    };
                    self.targets.insert(
                        seg_id.clone(),
                        TextTarget {
                            segment_id: seg_id.clone(),
                            part_path: part_path.clone(),
                            kind,
                            key,
                            node,
                            fingerprint,
                        },
                    );
                    self.segments.push(TextSegment {
                        id: seg_id,
                        text,
                        xml_path: part_path,
                        context: SegmentContext::TableCell,
                        style: None,
                    });
                }
            }
        }
    }

    fn record(&mut self, sheet: &SheetInfo, cell_ref: Option<String>, reason: SkipReason, content: &CellContent) {
        self.skipped.push(SkippedCell {
            sheet: sheet.name.clone(),
            cell_ref,
            reason,
            text: content.text().map(str::to_string),
        });
    }
}

fn resolve_content(
    tree: &ElementTree,
    part: &XmlPart,
    ns: &Namespace,
    cell: usize,
    cell_type: TextCellType,
    sst: Option<(&SharedStrings, &XmlPart)>,
) -> CellContent {
    let v = ns.name("v");
    match cell_type {
        TextCellType::Shared => {
            let Some((table, _)) = sst else {
                return CellContent::skip(SkipReason::MissingSharedStrings, None);
            };
            let item = tree
                .first_child(cell, &v)
                .and_then(|vid| tree.text(part, vid).trim().parse::<usize>().ok())
                .and_then(|index| Some((index, table.get(index)?)));
            let Some((index, item)) = item else {
                return CellContent::skip(SkipReason::InvalidSharedStringIndex, None);
            };
            string_item_content(item.clone(), TargetKind::SharedString, &table.path, Some(index))
        }
        TextCellType::Inline => {
            let is = ns.name("is");
            let Some(is_id) = tree.first_child(cell, &is) else {
                return CellContent::skip(SkipReason::MissingTextNode, None);
            };
            let item = classify_item(tree, part, ns, is_id);
            string_item_content(item, TargetKind::InlineString, &part.path, None)
        }
        TextCellType::FormulaString => {
            let Some(vid) = tree.first_child(cell, &v) else {
                return CellContent::skip(SkipReason::MissingTextNode, None);
            };
            let node = tree.node(vid);
            match node.texts.as_slice() {
                &[text_event_index] => CellContent::Bound {
                    text: tree.text(part, vid),
                    kind: TargetKind::FormulaString,
                    part_path: part.path.clone(),
                    node: TextNodeRef {
                        elem_event_index: node.start,
                        text_event_index,
                    },
                    shared_index: None,
                },
                _ => CellContent::skip(SkipReason::MissingTextNode, None),
            }
        }
    }
}

fn string_item_content(item: StringItem, kind: TargetKind, part_path: &str, shared_index: Option<usize>) -> CellContent {
    match item {
        StringItem::Plain { text, node } => CellContent::Bound {
            text,
            kind,
            part_path: part_path.to_string(),
            node,
            shared_index,
        },
        StringItem::Rich { text } => CellContent::skip(SkipReason::RichText, Some(text)),
        StringItem::Missing => CellContent::skip(SkipReason::MissingTextNode, None),
    }
}

/// Re-finds a cell's text node from its structural key.
///
/// Shared-string keys are resolved in the shared-string part, cell keys in
/// the worksheet that owns the cell.
pub fn locate_cell_text(part: &XmlPart, key: &TargetKey) -> Option<TextNodeRef> {
    match key {
        TargetKey::SharedString { index, .. } => locate_shared(part, *index),
        TargetKey::Cell { cell_ref, .. } => {
            let tree = ElementTree::build(part);
            let ns = Namespace::resolve(&tree, part, S_NS, "");
            let c = ns.name("c");
            let cell = tree
                .all_named(&c)
                .find(|&id| tree.attr(part, id, "r").as_deref() == Some(cell_ref.as_str()))?;
            let text_elem = match tree.first_child(cell, &ns.name("is")) {
                Some(is_id) => match classify_item(&tree, part, &ns, is_id) {
                    StringItem::Plain { node, .. } => return Some(node),
                    _ => return None,
                },
                None => tree.first_child(cell, &ns.name("v"))?,
            };
            let node = tree.node(text_elem);
            Some(TextNodeRef {
                elem_event_index: node.start,
                text_event_index: *node.texts.first()?,
            })
        }
        TargetKey::Run { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ooxml::xml::parse_xml_part;
    use crate::testutil::{xlsx_shared_strings, xlsx_sheet};

    fn sheet(index: usize, name: &str) -> SheetInfo {
        SheetInfo {
            index,
            name: name.to_string(),
            path: format!("xl/worksheets/sheet{}.xml", index + 1),
        }
    }

    fn run(rows: &str, sst_items: Option<&[&str]>) -> SheetExtraction {
        let info = sheet(0, "Sheet1");
        let part = parse_xml_part(&info.path, xlsx_sheet(rows).as_bytes()).expect("sheet");
        let sst_part = sst_items.map(|items| {
            parse_xml_part("xl/sharedStrings.xml", xlsx_shared_strings(items).as_bytes()).expect("sst")
        });
        let table = sst_part.as_ref().map(SharedStrings::parse);
        let mut out = SheetExtraction::default();
        out.extract_sheet(&info, &part, table.as_ref().zip(sst_part.as_ref()));
        out
    }

    fn reasons(out: &SheetExtraction) -> Vec<(Option<&str>, SkipReason)> {
        out.skipped
            .iter()
            .map(|s| (s.cell_ref.as_deref(), s.reason))
            .collect()
    }

    #[test]
    fn shared_formula_and_inline_cells() {
        let out = run(
            r#"<row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="str"><f>SUM(A2:A10)</f><v>Total</v></c><c r="C1" t="inlineStr"><is><t xml:space="preserve">  padded  </t></is></c></row>"#,
            Some(&["<t>Total</t>"]),
        );
        let ids: Vec<&str> = out.segments.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["xlsx-s0-A1", "xlsx-s0-C1"]);
        assert_eq!(out.segments[0].xml_path, "xl/sharedStrings.xml");
        assert_eq!(out.segments[1].text, "  padded  ");
        assert!(out.segments.iter().all(|s| s.context == SegmentContext::TableCell));
        assert_eq!(reasons(&out), vec![(Some("B1"), SkipReason::FormulaCell)]);
        assert_eq!(out.skipped[0].text.as_deref(), Some("Total"));
        assert_eq!(out.detected_text_cells, 3);
        assert_eq!(out.targets["xlsx-s0-C1"].kind, TargetKind::InlineString);
    }

    #[test]
    fn every_skip_reason_is_recorded() {
        let out = run(
            r#"<row r="1"><c t="s"><v>0</v></c><c r="b2" t="s"><v>0</v></c><c r="A3" t="s"><v>9</v></c><c r="A4" t="s"><v>1</v></c><c r="A5" t="inlineStr"></c><c r="A6" t="s"><v>2</v></c><c r="A7" t="s"><f>A1</f><v>0</v></c></row>"#,
            Some(&["<t>ok</t>", "<r><t>a</t></r><r><t>b</t></r>", "<t/>"]),
        );
        assert_eq!(
            reasons(&out),
            vec![
                (None, SkipReason::MalformedCellReference),
                (Some("b2"), SkipReason::MalformedCellReference),
                (Some("A3"), SkipReason::InvalidSharedStringIndex),
                (Some("A4"), SkipReason::RichText),
                (Some("A5"), SkipReason::MissingTextNode),
                (Some("A6"), SkipReason::MissingTextNode),
                (Some("A7"), SkipReason::FormulaCell),
            ]
        );
        assert!(out.segments.is_empty());
        // the unaddressed cell, b2 and A7 all resolve to "ok"; A4 is rich text
        assert_eq!(out.detected_text_cells, 4);
    }

    #[test]
    fn shared_cells_without_table_are_recorded() {
        let out = run(r#"<row r="1"><c r="A1" t="s"><v>0</v></c></row>"#, None);
        assert_eq!(reasons(&out), vec![(Some("A1"), SkipReason::MissingSharedStrings)]);
        assert_eq!(out.detected_text_cells, 0);
    }

    #[test]
    fn numeric_and_blank_cells_are_ignored_silently() {
        let out = run(
            r#"<row r="1"><c r="A1"><v>42</v></c><c r="B1" t="b"><v>1</v></c><c r="C1"><f>A1*2</f><v>84</v></c><c r="D1" t="inlineStr"><is><t>   </t></is></c></row>"#,
            None,
        );
        assert!(out.segments.is_empty());
        assert!(out.skipped.is_empty());
        assert_eq!(out.detected_text_cells, 0);
    }

    #[test]
    fn same_address_on_two_sheets_gets_distinct_ids() {
        let mut out = SheetExtraction::default();
        for (i, name) in ["One", "Two"].into_iter().enumerate() {
            let info = sheet(i, name);
            let part = parse_xml_part(
                &info.path,
                xlsx_sheet(r#"<row r="1"><c r="A1" t="inlineStr"><is><t>hi</t></is></c></row>"#).as_bytes(),
            )
            .expect("sheet");
            out.extract_sheet(&info, &part, None);
        }
        let ids: Vec<&str> = out.segments.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["xlsx-s0-A1", "xlsx-s1-A1"]);
    }

    #[test]
    fn repeated_cell_address_is_skipped() {
        let out = run(
            r#"<row r="1"><c r="A1" t="inlineStr"><is><t>first</t></is></c><c r="A1" t="inlineStr"><is><t>second</t></is></c></row>"#,
            None,
        );
        let ids: Vec<&str> = out.segments.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["xlsx-s0-A1"]);
        assert_eq!(out.segments[0].text, "first");
        assert_eq!(out.targets.len(), 1);
        assert_eq!(reasons(&out), vec![(Some("A1"), SkipReason::MalformedCellReference)]);
        assert_eq!(out.skipped[0].text.as_deref(), Some("second"));
        assert_eq!(out.detected_text_cells, 2);
    }

    #[test]
    fn locator_finds_inline_and_cached_values() {
        let xml = xlsx_sheet(
            r#"<row r="1"><c r="A1" t="inlineStr"><is><t>in</t></is></c><c r="B1" t="str"><v>cached</v></c></row>"#,
        );
        let part = parse_xml_part("xl/worksheets/sheet1.xml", xml.as_bytes()).expect("parse");
        let key = |r: &str| TargetKey::Cell {
            sheet: "Sheet1".to_string(),
            cell_ref: r.to_string(),
        };
        let a1 = locate_cell_text(&part, &key("A1")).expect("a1");
        assert_eq!(part.text_at(a1.text_event_index), Some("in"));
        let b1 = locate_cell_text(&part, &key("B1")).expect("b1");
        assert_eq!(part.text_at(b1.text_event_index), Some("cached"));
        assert!(locate_cell_text(&part, &key("Z9")).is_none());
    }
}
