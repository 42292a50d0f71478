//! Translation-safe text extraction and byte-faithful rebuild for DOCX and XLSX.
//!
//! A document goes through [`pipeline::TranslationJob`]: the archive is
//! guarded and parsed into segments, segments are batched through a caller
//! supplied [`pipeline::TranslationBackend`], and only the touched XML parts
//! are re-serialized into the output package.

pub mod batch;
pub mod config;
pub mod dataurl;
pub mod docx;
pub mod error;
pub mod ir;
pub mod ooxml;
pub mod pipeline;
pub mod progress;
pub mod summary;
pub mod xlsx;

#[cfg(test)]
pub(crate) mod testutil;

use std::io::Cursor;

use serde::{Deserialize, Serialize};
use zip::ZipArchive;

pub use config::{ArchiveLimits, TranslationConfig};
pub use docx::DOCX_MIME;
pub use error::{Error, GuardViolation, Result};
pub use ir::{DocumentMetadata, SegmentContext, SkipReason, SkippedCell, TextSegment};
pub use xlsx::XLSX_MIME;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Docx,
    Xlsx,
}

impl DocumentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentKind::Docx => "docx",
            DocumentKind::Xlsx => "xlsx",
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            DocumentKind::Docx => DOCX_MIME,
            DocumentKind::Xlsx => XLSX_MIME,
        }
    }

    pub fn limits(self, config: &TranslationConfig) -> &ArchiveLimits {
        match self {
            DocumentKind::Docx => &config.docx_limits,
            DocumentKind::Xlsx => &config.xlsx_limits,
        }
    }

    pub fn from_mime(mime: &str) -> Option<Self> {
        let mime = mime.split(';').next().unwrap_or(mime).trim();
        if mime.eq_ignore_ascii_case(DOCX_MIME) {
            Some(DocumentKind::Docx)
        } else if mime.eq_ignore_ascii_case(XLSX_MIME) {
            Some(DocumentKind::Xlsx)
        } else {
            None
        }
    }

    /// Looks at the central directory for the main part of either format.
    ///
    /// Nothing is inflated here; the archive guard still runs when the
    /// document is parsed.
    pub fn detect(bytes: &[u8]) -> Result<Self> {
        let zip = ZipArchive::new(Cursor::new(bytes))?;
        let mut names = zip.file_names();
        let kind = names.find_map(|name| match name {
            docx::MAIN_DOCUMENT => Some(DocumentKind::Docx),
            xlsx::WORKBOOK => Some(DocumentKind::Xlsx),
            _ => None,
        });
        kind.ok_or_else(|| {
            Error::UnsupportedFormat(format!(
                "archive has neither {} nor {}",
                docx::MAIN_DOCUMENT,
                xlsx::WORKBOOK
            ))
        })
    }
}
