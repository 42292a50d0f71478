use std::collections::BTreeMap;

use serde::Serialize;

use crate::docx::{ContextCounts, ParsedDocx};
use crate::ir::{SkipReason, SkippedCell};
use crate::ooxml::document::RebuildReport;
use crate::xlsx::ParsedXlsx;
use crate::DocumentKind;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticSummary {
    pub kind: DocumentKind,
    pub total_segments: usize,
    pub total_characters: usize,
    pub estimated_batches: usize,
    pub actual_batches: usize,
    pub failed_batches: usize,
    pub applied_translations: usize,
    pub missing_targets: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contexts: Option<ContextCounts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detected_text_cells: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped_cells: Vec<SkippedCell>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped_parts: Vec<String>,
}

impl DiagnosticSummary {
    fn empty(kind: DocumentKind) -> Self {
        Self {
            kind,
            total_segments: 0,
            total_characters: 0,
            estimated_batches: 0,
            actual_batches: 0,
            failed_batches: 0,
            applied_translations: 0,
            missing_targets: 0,
            contexts: None,
            section_count: None,
            sheet_count: None,
            detected_text_cells: None,
            skipped_cells: Vec::new(),
            skipped_parts: Vec::new(),
        }
    }

    pub fn from_docx(parsed: &ParsedDocx) -> Self {
        let meta = parsed.metadata();
        Self {
            total_segments: meta.total_segments,
            total_characters: meta.total_characters,
            estimated_batches: meta.estimated_batches,
            contexts: Some(parsed.context_counts()),
            section_count: Some(parsed.sections.len()),
            skipped_parts: parsed.skipped_parts.clone(),
            ..Self::empty(DocumentKind::Docx)
        }
    }

    pub fn from_xlsx(parsed: &ParsedXlsx) -> Self {
        let meta = parsed.metadata();
        Self {
            total_segments: meta.total_segments,
            total_characters: meta.total_characters,
            estimated_batches: meta.estimated_batches,
            sheet_count: Some(parsed.sheets.len()),
            detected_text_cells: Some(parsed.detected_text_cells),
            skipped_cells: parsed.skipped_cells.clone(),
            ..Self::empty(DocumentKind::Xlsx)
        }
    }

    pub fn record_translation(&mut self, actual_batches: usize, failed_batches: usize) {
        self.actual_batches = actual_batches;
        self.failed_batches = failed_batches;
    }

    pub fn record_rebuild(&mut self, report: &RebuildReport) {
        self.applied_translations = report.applied;
        self.missing_targets = report.missing_targets;
    }

    /// e.g. "12 cells skipped: 3 formulas, 9 rich text"; `None` when nothing was skipped.
    pub fn describe_skips(&self) -> Option<String> {
        if self.skipped_cells.is_empty() {
            return None;
        }
        let mut counts: BTreeMap<SkipReason, usize> = BTreeMap::new();
        for cell in &self.skipped_cells {
            *counts.entry(cell.reason).or_insert(0) += 1;
        }
        let total = self.skipped_cells.len();
        let noun = if total == 1 { "cell" } else { "cells" };
        let detail: Vec<String> = counts
            .iter()
            .map(|(reason, n)| format!("{n} {}", reason.label()))
            .collect();
        Some(format!("{total} {noun} skipped: {}", detail.join(", ")))
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
