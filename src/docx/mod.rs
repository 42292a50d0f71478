//! Word documents: part discovery, run extraction, rebuild.

mod extract;
mod sections;

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{info, warn};

pub use extract::{locate_run, segment_id, ParagraphSpan, W_NS};
pub use sections::{detect_sections, LegalSection};

use crate::config::TranslationConfig;
use crate::error::Result;
use crate::ir::{DocumentMetadata, SegmentContext};
use crate::ooxml::document::{ParsedDocument, RebuiltDocument};
use crate::ooxml::package::Package;
use crate::ooxml::reader::PartReader;
use crate::DocumentKind;

pub const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MAIN_DOCUMENT: &str = "word/document.xml";

static HEADER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^word/header\d*\.xml$").expect("header"));
static FOOTER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^word/footer\d*\.xml$").expect("footer"));
const NOTE_PARTS: [&str; 2] = ["word/footnotes.xml", "word/endnotes.xml"];

#[derive(Clone, Debug)]
pub struct ParsedDocx {
    pub document: ParsedDocument,
    /// Optional parts that were present but could not be parsed.
    pub skipped_parts: Vec<String>,
    /// Heading-delimited sections of the main document body.
    pub sections: Vec<LegalSection>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ContextCounts {
    pub paragraph: usize,
    pub table_cell: usize,
    pub header: usize,
    pub footer: usize,
    pub footnote: usize,
}

fn plan_parts(package: &Package, config: &TranslationConfig) -> Vec<(String, SegmentContext)> {
    let mut plan = vec![(MAIN_DOCUMENT.to_string(), SegmentContext::Paragraph)];
    if config.translate_headers {
        for name in package.names() {
            if HEADER_RE.is_match(name) {
                plan.push((name.to_string(), SegmentContext::Header));
            } else if FOOTER_RE.is_match(name) {
                plan.push((name.to_string(), SegmentContext::Footer));
            }
        }
    }
    if config.translate_footnotes {
        for note in NOTE_PARTS {
            if package.contains(note) {
                plan.push((note.to_string(), SegmentContext::Footnote));
            }
        }
    }
    plan
}

pub fn parse_docx(bytes: &[u8], config: &TranslationConfig) -> Result<ParsedDocx> {
    let package = Package::open(bytes, DocumentKind::Docx.limits(config))?;
    let reader = PartReader::new(&package);

    let mut parts = HashMap::new();
    let mut segments = Vec::new();
    let mut targets = HashMap::new();
    let mut skipped_parts = Vec::new();
    let mut sections = Vec::new();
    for (path, context) in plan_parts(&package, config) {
        let required = path == MAIN_DOCUMENT;
        let Some(part) = reader.load_part(&path, required)? else {
            skipped_parts.push(path);
            continue;
        };
        let paragraphs = extract::extract_runs(&part, context, &mut segments, &mut targets);
        if path == MAIN_DOCUMENT {
            sections = detect_sections(&paragraphs);
        }
        parts.insert(path, part);
    }
    if !skipped_parts.is_empty() {
        warn!(parts = ?skipped_parts, "optional parts skipped");
    }

    let metadata = DocumentMetadata::from_segments(&segments, config.batch_limits());
    info!(
        segments = metadata.total_segments,
        characters = metadata.total_characters,
        parts = parts.len(),
        "extracted docx segments"
    );
    Ok(ParsedDocx {
        document: ParsedDocument {
            kind: DocumentKind::Docx,
            package,
            parts,
            segments,
            targets,
            metadata,
        },
        skipped_parts,
        sections,
    })
}

impl ParsedDocx {
    pub fn segments(&self) -> &[crate::ir::TextSegment] {
        &self.document.segments
    }

    pub fn metadata(&self) -> DocumentMetadata {
        self.document.metadata
    }

    pub fn context_counts(&self) -> ContextCounts {
        let mut counts = ContextCounts::default();
        for seg in &self.document.segments {
            match seg.context {
                SegmentContext::Paragraph => counts.paragraph += 1,
                SegmentContext::TableCell => counts.table_cell += 1,
                SegmentContext::Header => counts.header += 1,
                SegmentContext::Footer => counts.footer += 1,
                SegmentContext::Footnote => counts.footnote += 1,
            }
        }
        counts
    }

    pub fn rebuild(&mut self, translations: &HashMap<String, String>) -> Result<RebuiltDocument> {
        self.document.rebuild_with(translations, locate_run)
    }
}
