use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::ooxml::reader::PartReader;
use crate::ooxml::rels::{parse_relationships, relationship_targets, rels_path_for};
use crate::ooxml::tree::{ElementTree, Namespace};

pub const S_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
pub const WORKBOOK: &str = "xl/workbook.xml";
const DEFAULT_SHARED_STRINGS: &str = "xl/sharedStrings.xml";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SheetInfo {
    pub index: usize,
    pub name: String,
    pub path: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct WorkbookLayout {
    pub sheets: Vec<SheetInfo>,
    pub shared_strings: Option<String>,
}

/// Maps workbook sheets to their part paths through `xl/_rels/workbook.xml.rels`.
pub(crate) fn discover(reader: &PartReader<'_>) -> Result<WorkbookLayout> {
    let workbook = reader.require_part(WORKBOOK)?;
    let rels_part = reader.require_part(&rels_path_for(WORKBOOK))?;
    let rels = parse_relationships(&rels_part);
    let sheet_paths = relationship_targets(&rels, WORKBOOK, "worksheet");

    let tree = ElementTree::build(&workbook);
    let s = Namespace::resolve(&tree, &workbook, S_NS, "");
    let sheet_name = s.name("sheet");
    let mut sheets = Vec::new();
    for id in tree.all_named(&sheet_name) {
        let name = tree.attr(&workbook, id, "name").unwrap_or_default();
        let Some(rel_id) = tree.attr_local(&workbook, id, "id") else {
            warn!(sheet = %name, "sheet without relationship id; skipped");
            continue;
        };
        let Some(path) = sheet_paths.get(&rel_id) else {
            warn!(sheet = %name, rel_id = %rel_id, "sheet relationship not found; skipped");
            continue;
        };
        sheets.push(SheetInfo {
            index: sheets.len(),
            name,
            path: path.clone(),
        });
    }
    if sheets.is_empty() {
        return Err(Error::NoWorksheets);
    }

    let shared_strings = relationship_targets(&rels, WORKBOOK, "sharedStrings")
        .into_values()
        .next()
        .or_else(|| {
            reader
                .package()
                .contains(DEFAULT_SHARED_STRINGS)
                .then(|| DEFAULT_SHARED_STRINGS.to_string())
        });
    debug!(sheets = sheets.len(), shared_strings = ?shared_strings, "workbook layout");
    Ok(WorkbookLayout {
        sheets,
        shared_strings,
    })
}
