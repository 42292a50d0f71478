use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SegmentContext {
    Paragraph,
    TableCell,
    Header,
    Footer,
    Footnote,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextSegment {
    pub id: String,
    /// Raw node text. Never trimmed; whitespace is part of the content.
    pub text: String,
    pub xml_path: String,
    pub context: SegmentContext,
    /// Paragraph style id (`w:pStyle`), DOCX only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

impl TextSegment {
    /// Length in UTF-16 code units, the unit batch budgets are counted in.
    pub fn char_len(&self) -> usize {
        self.text.encode_utf16().count()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextNodeRef {
    pub elem_event_index: usize,
    pub text_event_index: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetKind {
    Run,
    SharedString,
    InlineString,
    FormulaString,
}

/// Structural key used to find a target node again when the direct handle
/// no longer belongs to the part being rebuilt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TargetKey {
    Run { ordinal: usize },
    SharedString {
        index: usize,
        sheet: String,
        cell_ref: String,
    },
    /// Cell-local text (inline string or cached formula string).
    Cell { sheet: String, cell_ref: String },
}

#[derive(Clone, Debug)]
pub struct TextTarget {
    pub segment_id: String,
    pub part_path: String,
    pub kind: TargetKind,
    pub key: TargetKey,
    pub node: TextNodeRef,
    /// Structure hash of the owning part when the handle was taken.
    pub fingerprint: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    FormulaCell,
    RichText,
    MissingTextNode,
    InvalidSharedStringIndex,
    MissingSharedStrings,
    MalformedCellReference,
}

impl SkipReason {
    pub fn label(self) -> &'static str {
        match self {
            SkipReason::FormulaCell => "formulas",
            SkipReason::RichText => "rich text",
            SkipReason::MissingTextNode => "missing text node",
            SkipReason::InvalidSharedStringIndex => "invalid shared string index",
            SkipReason::MissingSharedStrings => "missing shared strings",
            SkipReason::MalformedCellReference => "malformed cell reference",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SkippedCell {
    pub sheet: String,
    pub cell_ref: Option<String>,
    pub reason: SkipReason,
    /// Text found in the cell, when any could be read.
    pub text: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub total_segments: usize,
    pub total_characters: usize,
    pub estimated_batches: usize,
}
