use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::batch::BatchLimits;

pub const DEFAULT_MAX_BATCH_SIZE: usize = 20;
pub const DEFAULT_MAX_CHARS_PER_BATCH: usize = 12_000;
pub const DEFAULT_MAX_CONCURRENT_BATCHES: usize = 3;

/// Resource ceilings enforced on a container before any part is inflated.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ArchiveLimits {
    pub max_entries: usize,
    pub max_uncompressed_mb: u64,
    pub max_compression_ratio: f64,
    /// Absolute ceiling on the raw input, checked before the zip is opened.
    #[serde(default)]
    pub max_input_mb: Option<u64>,
}

impl ArchiveLimits {
    pub fn docx() -> Self {
        Self {
            max_entries: 500,
            max_uncompressed_mb: 100,
            max_compression_ratio: 100.0,
            max_input_mb: None,
        }
    }

    pub fn xlsx() -> Self {
        Self {
            max_entries: 1500,
            max_uncompressed_mb: 200,
            max_compression_ratio: 150.0,
            max_input_mb: Some(50),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TranslationConfig {
    pub max_batch_size: usize,
    pub max_chars_per_batch: usize,
    pub max_concurrent_batches: usize,
    pub translate_headers: bool,
    pub translate_footnotes: bool,
    pub docx_limits: ArchiveLimits,
    pub xlsx_limits: ArchiveLimits,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            max_chars_per_batch: DEFAULT_MAX_CHARS_PER_BATCH,
            max_concurrent_batches: DEFAULT_MAX_CONCURRENT_BATCHES,
            translate_headers: true,
            translate_footnotes: true,
            docx_limits: ArchiveLimits::docx(),
            xlsx_limits: ArchiveLimits::xlsx(),
        }
    }
}

impl TranslationConfig {
    pub fn from_toml_str(text: &str) -> anyhow::Result<Self> {
        let cfg: TranslationConfig = toml::from_str(text).context("parse config toml")?;
        Ok(cfg)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config: {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("load config: {}", path.display()))
    }

    pub fn batch_limits(&self) -> BatchLimits {
        BatchLimits {
            max_batch_size: self.max_batch_size,
            max_chars_per_batch: self.max_chars_per_batch,
        }
    }

    pub fn concurrency(&self) -> usize {
        self.max_concurrent_batches.max(1)
    }
}
