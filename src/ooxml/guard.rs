use std::io::{Read, Seek};

use zip::ZipArchive;

use crate::config::ArchiveLimits;
use crate::error::{GuardViolation, Result};

const MB: u64 = 1024 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArchiveStats {
    pub entry_count: usize,
    pub total_uncompressed: u64,
    pub input_len: u64,
}

/// Refuses oversized input before the container is even opened.
pub fn check_input_len(input_len: u64, limits: &ArchiveLimits) -> std::result::Result<(), GuardViolation> {
    match limits.max_input_mb {
        Some(max_mb) if input_len > max_mb * MB => Err(GuardViolation::InputTooLarge {
            size_mb: input_len as f64 / MB as f64,
            max_mb,
        }),
        _ => Ok(()),
    }
}

pub fn collect_stats<R: Read + Seek>(archive: &mut ZipArchive<R>, input_len: u64) -> Result<ArchiveStats> {
    let mut total_uncompressed = 0u64;
    for i in 0..archive.len() {
        let entry = archive.by_index_raw(i)?;
        total_uncompressed = total_uncompressed.saturating_add(entry.size());
    }
    Ok(ArchiveStats {
        entry_count: archive.len(),
        total_uncompressed,
        input_len,
    })
}

pub fn check_stats(stats: &ArchiveStats, limits: &ArchiveLimits) -> std::result::Result<(), GuardViolation> {
    if stats.entry_count > limits.max_entries {
        return Err(GuardViolation::TooManyEntries {
            count: stats.entry_count,
            max: limits.max_entries,
        });
    }
    if stats.total_uncompressed > limits.max_uncompressed_mb.saturating_mul(MB) {
        return Err(GuardViolation::DecompressedTooLarge {
            size_mb: stats.total_uncompressed / MB,
            max_mb: limits.max_uncompressed_mb,
        });
    }
    if stats.input_len > 0 && stats.total_uncompressed > 0 {
        let ratio = stats.total_uncompressed as f64 / stats.input_len as f64;
        if ratio > limits.max_compression_ratio {
            return Err(GuardViolation::CompressionRatio {
                ratio,
                max: limits.max_compression_ratio,
            });
        }
    }
    Ok(())
}

/// Runs every archive check; nothing is decompressed until this passes.
pub fn inspect<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    input_len: u64,
    limits: &ArchiveLimits,
) -> Result<ArchiveStats> {
    let stats = collect_stats(archive, input_len)?;
    check_stats(&stats, limits)?;
    Ok(stats)
}
