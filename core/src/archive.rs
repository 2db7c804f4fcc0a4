use std::collections::HashSet;
use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::ProcessingError;
use crate::format::{extension_of, stem_of};

/// Hands out unique file names within one batch.
///
/// A repeated name gets a numeric suffix before its extension:
/// `photo.png`, `photo_2.png`, `photo_3.png`, ...
#[derive(Debug, Default)]
pub struct NameRegistry {
    taken: HashSet<String>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn claim(&mut self, name: &str) -> String {
        if self.taken.insert(name.to_string()) {
            return name.to_string();
        }

        let stem = stem_of(name);
        let suffix = extension_of(name).map(|ext| format!(".{ext}")).unwrap_or_default();
        let mut n = 2;
        loop {
            let candidate = format!("{stem}_{n}{suffix}");
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Give back a name whose entry was never written.
    pub fn release(&mut self, name: &str) {
        self.taken.remove(name);
    }
}

/// Deflate-compressed ZIP assembled in memory.
pub struct ArchiveBuilder {
    writer: ZipWriter<Cursor<Vec<u8>>>,
    names: NameRegistry,
    entries: usize,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self {
            writer: ZipWriter::new(Cursor::new(Vec::new())),
            names: NameRegistry::new(),
            entries: 0,
        }
    }

    /// Append an entry and return the name it was stored under.
    ///
    /// On error nothing is left behind: a partially written entry is removed
    /// and its name is free again.
    pub fn add(&mut self, name: &str, bytes: &[u8]) -> Result<String, ProcessingError> {
        let stored = self.names.claim(name);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        if let Err(e) = self.write_entry(&stored, bytes, options) {
            self.names.release(&stored);
            return Err(e);
        }
        self.entries += 1;

        Ok(stored)
    }

    fn write_entry(
        &mut self,
        name: &str,
        bytes: &[u8],
        options: SimpleFileOptions,
    ) -> Result<(), ProcessingError> {
        self.writer.start_file(name, options)?;
        if let Err(e) = self.writer.write_all(bytes) {
            if let Err(abort) = self.writer.abort_file() {
                log::warn!("Failed to drop partial archive entry {}: {}", name, abort);
            }
            return Err(ProcessingError::Archive(e.into()));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    pub fn finish(self) -> Result<Vec<u8>, ProcessingError> {
        let cursor = self.writer.finish()?;
        Ok(cursor.into_inner())
    }
}

impl Default for ArchiveBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Build an archive from `(name, bytes)` pairs in order.
pub fn build(entries: &[(String, Vec<u8>)]) -> Result<Vec<u8>, ProcessingError> {
    let mut archive = ArchiveBuilder::new();
    for (name, bytes) in entries {
        archive.add(name, bytes)?;
    }
    archive.finish()
}
