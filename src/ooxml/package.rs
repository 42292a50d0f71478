use std::collections::HashMap;
use std::io::{Cursor, Read, Write};

use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::guard::{check_input_len, inspect, ArchiveStats};
use crate::config::ArchiveLimits;
use crate::error::{GuardViolation, Result};

/// In-memory copy of a zip container; entries keep their original order.
#[derive(Clone, Debug)]
pub struct Package {
    pub entries: Vec<PackageEntry>,
    pub stats: ArchiveStats,
}

#[derive(Clone, Debug)]
pub struct PackageEntry {
    pub name: String,
    pub data: Vec<u8>,
    pub compression: CompressionMethod,
    pub last_modified: zip::DateTime,
    pub unix_mode: Option<u32>,
    pub is_dir: bool,
}

impl Package {
    pub fn open(bytes: &[u8], limits: &ArchiveLimits) -> Result<Self> {
        let input_len = bytes.len() as u64;
        check_input_len(input_len, limits)?;
        let mut zip = ZipArchive::new(Cursor::new(bytes))?;
        let stats = inspect(&mut zip, input_len, limits)?;
        debug!(
            entries = stats.entry_count,
            uncompressed = stats.total_uncompressed,
            "archive passed guard"
        );

        let mut entries = Vec::with_capacity(zip.len());
        for i in 0..zip.len() {
            let file = zip.by_index(i)?;
            let declared = file.size();
            let name = file.name().to_string();
            let compression = file.compression();
            let last_modified = file.last_modified().unwrap_or_default();
            let unix_mode = file.unix_mode();
            let is_dir = file.is_dir();

            let mut data = Vec::with_capacity(declared.min(16 * 1024 * 1024) as usize);
            file.take(declared.saturating_add(1)).read_to_end(&mut data)?;
            if data.len() as u64 > declared {
                return Err(GuardViolation::EntryOverflow { name, declared }.into());
            }
            entries.push(PackageEntry {
                name,
                data,
                compression,
                last_modified,
                unix_mode,
                is_dir,
            });
        }
        Ok(Self { entries, stats })
    }

    pub fn entry(&self, name: &str) -> Option<&PackageEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entry(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn write_with_replacements(&self, replacements: &HashMap<String, Vec<u8>>) -> Result<Vec<u8>> {
        let mut zout = ZipWriter::new(Cursor::new(Vec::new()));
        for ent in &self.entries {
            let data = replacements.get(&ent.name).unwrap_or(&ent.data);
            let mut opts = SimpleFileOptions::default()
                .compression_method(ent.compression)
                .last_modified_time(ent.last_modified);
            if let Some(mode) = ent.unix_mode {
                opts = opts.unix_permissions(mode);
            }
            if ent.is_dir || ent.name.ends_with('/') {
                zout.add_directory(ent.name.as_str(), opts)?;
            } else {
                zout.start_file(ent.name.as_str(), opts)?;
                zout.write_all(data)?;
            }
        }
        Ok(zout.finish()?.into_inner())
    }
}
