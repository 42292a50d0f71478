//! Spreadsheets: workbook layout, shared strings, cell extraction, rebuild.

mod extract;
mod shared_strings;
mod workbook;

use std::collections::{BTreeMap, HashMap};

use tracing::info;

pub use extract::{locate_cell_text, segment_id};
pub use workbook::{SheetInfo, S_NS, WORKBOOK};

use crate::config::TranslationConfig;
use crate::error::Result;
use crate::ir::{DocumentMetadata, SkipReason, SkippedCell, TextSegment};
use crate::ooxml::document::{ParsedDocument, RebuiltDocument};
use crate::ooxml::package::Package;
use crate::ooxml::reader::PartReader;
use crate::DocumentKind;

use extract::SheetExtraction;
use shared_strings::SharedStrings;

pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[derive(Clone, Debug)]
pub struct ParsedXlsx {
    pub document: ParsedDocument,
    pub sheets: Vec<SheetInfo>,
    pub skipped_cells: Vec<SkippedCell>,
    /// Cells holding non-blank text, translatable or not.
    pub detected_text_cells: usize,
}

pub fn parse_xlsx(bytes: &[u8], config: &TranslationConfig) -> Result<ParsedXlsx> {
    let package = Package::open(bytes, DocumentKind::Xlsx.limits(config))?;
    let reader = PartReader::new(&package);
    let layout = workbook::discover(&reader)?;

    let mut parts = HashMap::new();
    let sst_part = match layout.shared_strings.as_deref() {
        Some(path) => reader.load_part(path, false)?,
        None => None,
    };
    let table = sst_part.as_ref().map(SharedStrings::parse);

    let mut extraction = SheetExtraction::default();
    for sheet in &layout.sheets {
        let part = reader.require_part(&sheet.path)?;
        extraction.extract_sheet(sheet, &part, table.as_ref().zip(sst_part.as_ref()));
        parts.insert(sheet.path.clone(), part);
    }
    if let Some(part) = sst_part {
        parts.insert(part.path.clone(), part);
    }

    let metadata = DocumentMetadata::from_segments(&extraction.segments, config.batch_limits());
    info!(
        sheets = layout.sheets.len(),
        segments = metadata.total_segments,
        skipped = extraction.skipped.len(),
        detected = extraction.detected_text_cells,
        "extracted xlsx segments"
    );
    Ok(ParsedXlsx {
        document: ParsedDocument {
            kind: DocumentKind::Xlsx,
            package,
            parts,
            segments: extraction.segments,
            targets: extraction.targets,
            metadata,
        },
        sheets: layout.sheets,
        skipped_cells: extraction.skipped,
        detected_text_cells: extraction.detected_text_cells,
    })
}

impl ParsedXlsx {
    pub fn segments(&self) -> &[TextSegment] {
        &self.document.segments
    }

    pub fn metadata(&self) -> DocumentMetadata {
        self.document.metadata
    }

    pub fn skip_counts(&self) -> BTreeMap<SkipReason, usize> {
        let mut counts = BTreeMap::new();
        for cell in &self.skipped_cells {
            *counts.entry(cell.reason).or_insert(0) += 1;
        }
        counts
    }

    /// Cells sharing one shared-string entry all show whichever translation
    /// is written to that entry.
    pub fn rebuild(&mut self, translations: &HashMap<String, String>) -> Result<RebuiltDocument> {
        self.document.rebuild_with(translations, locate_cell_text)
    }
}
