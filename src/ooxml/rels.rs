use std::collections::HashMap;

use tracing::warn;

use super::tree::{ElementTree, QName};
use super::xml::XmlPart;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    pub external: bool,
}

impl Relationship {
    /// Last path segment of the type URI, e.g. `worksheet` or `sharedStrings`.
    pub fn short_type(&self) -> &str {
        self.rel_type.rsplit('/').next().unwrap_or(&self.rel_type)
    }
}

pub fn parse_relationships(part: &XmlPart) -> Vec<Relationship> {
    let tree = ElementTree::build(part);
    let rel = QName::new("", "Relationship");
    tree.all_named(&rel)
        .filter_map(|id| {
            let rid = tree.attr(part, id, "Id")?;
            let target = tree.attr(part, id, "Target")?;
            let rel_type = tree.attr(part, id, "Type").unwrap_or_default();
            let external = tree
                .attr(part, id, "TargetMode")
                .is_some_and(|m| m.eq_ignore_ascii_case("External"));
            Some(Relationship {
                id: rid,
                rel_type,
                target,
                external,
            })
        })
        .collect()
}

/// `xl/workbook.xml` -> `xl/_rels/workbook.xml.rels`.
pub fn rels_path_for(part_path: &str) -> String {
    match part_path.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{part_path}.rels"),
    }
}

/// Resolves a relationship target against the directory of its source part.
///
/// Absolute targets (`/xl/...`) are rooted at the package root. Returns `None`
/// when `..` segments would climb above the root.
pub fn resolve_target(source_part: &str, target: &str) -> Option<String> {
    let target = target.split(['#', '?']).next().unwrap_or(target);
    let mut segments: Vec<&str> = Vec::new();
    let rel = match target.strip_prefix('/') {
        Some(abs) => abs,
        None => {
            if let Some((dir, _)) = source_part.rsplit_once('/') {
                segments.extend(dir.split('/').filter(|s| !s.is_empty()));
            }
            target
        }
    };
    for seg in rel.split(['/', '\\']) {
        match seg {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            s => segments.push(s),
        }
    }
    if segments.is_empty() {
        return None;
    }
    Some(segments.join("/"))
}

/// Internal relationships of one type, keyed by id, targets resolved to package paths.
pub fn relationship_targets(
    rels: &[Relationship],
    source_part: &str,
    type_filter: &str,
) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for rel in rels {
        if rel.external || rel.short_type() != type_filter {
            continue;
        }
        match resolve_target(source_part, &rel.target) {
            Some(path) => {
                out.insert(rel.id.clone(), path);
            }
            None => warn!(
                source = source_part,
                id = %rel.id,
                target = %rel.target,
                "relationship target escapes package root; ignored"
            ),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ooxml::xml::parse_xml_part;

    #[test]
    fn resolves_relative_and_absolute_targets() {
        assert_eq!(
            resolve_target("xl/workbook.xml", "worksheets/sheet1.xml").as_deref(),
            Some("xl/worksheets/sheet1.xml")
        );
        assert_eq!(
            resolve_target("xl/workbook.xml", "/xl/worksheets/sheet2.xml").as_deref(),
            Some("xl/worksheets/sheet2.xml")
        );
        assert_eq!(
            resolve_target("xl/workbook.xml", "./worksheets/../sharedStrings.xml").as_deref(),
            Some("xl/sharedStrings.xml")
        );
        assert_eq!(
            resolve_target("word/document.xml", "../customXml/item1.xml").as_deref(),
            Some("customXml/item1.xml")
        );
    }

    #[test]
    fn refuses_to_escape_the_root() {
        assert_eq!(resolve_target("xl/workbook.xml", "../../etc/passwd"), None);
        assert_eq!(resolve_target("xl/workbook.xml", "/../x.xml"), None);
        assert_eq!(resolve_target("xl/workbook.xml", "/"), None);
    }

    #[test]
    fn rels_path_sits_next_to_source() {
        assert_eq!(rels_path_for("xl/workbook.xml"), "xl/_rels/workbook.xml.rels");
        assert_eq!(rels_path_for("book.xml"), "_rels/book.xml.rels");
    }

    #[test]
    fn filters_by_type_and_skips_external() {
        let xml = br#"<?xml version="1.0"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
  <Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="../../evil.xml"/>
  <Relationship Id="rId4" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="http://example.com/x" TargetMode="External"/>
</Relationships>"#;
        let part = parse_xml_part("xl/_rels/workbook.xml.rels", xml).expect("parse");
        let rels = parse_relationships(&part);
        assert_eq!(rels.len(), 4);
        let map = relationship_targets(&rels, "xl/workbook.xml", "worksheet");
        assert_eq!(map.len(), 1);
        assert_eq!(map["rId1"], "xl/worksheets/sheet1.xml");
    }
}
