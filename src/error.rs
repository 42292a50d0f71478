use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Archive shapes refused before any entry is inflated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GuardViolation {
    #[error("file size ({size_mb:.1}MB) exceeds {max_mb}MB limit")]
    InputTooLarge { size_mb: f64, max_mb: u64 },
    #[error("ZIP archive has too many entries ({count} > {max}); possible zip bomb")]
    TooManyEntries { count: usize, max: usize },
    #[error("decompressed size estimate ({size_mb}MB) exceeds limit ({max_mb}MB)")]
    DecompressedTooLarge { size_mb: u64, max_mb: u64 },
    #[error("compression ratio ({ratio:.0}) exceeds limit ({max}); possible zip bomb")]
    CompressionRatio { ratio: f64, max: f64 },
    #[error("entry {name} inflates past its declared size ({declared} bytes)")]
    EntryOverflow { name: String, declared: u64 },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("archive rejected: {0}")]
    Guard(#[from] GuardViolation),
    #[error("invalid zip container: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("missing required part: {0}")]
    MissingPart(String),
    #[error("malformed XML in required part {path}: {reason}")]
    MalformedPart { path: String, reason: String },
    #[error("no worksheets found in workbook")]
    NoWorksheets,
    #[error("no translatable text found in document")]
    NoTranslatableText,
    #[error("invalid data URL format")]
    InvalidDataUrl,
    #[error("unsupported document type: {0}")]
    UnsupportedFormat(String),
    #[error("non-text structure changed in {0} during rebuild")]
    StructureChanged(String),
    #[error("translation cancelled")]
    Cancelled,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    pub(crate) fn malformed(path: &str, err: &anyhow::Error) -> Self {
        Error::MalformedPart {
            path: path.to_string(),
            reason: format!("{err:#}"),
        }
    }
}
