//! Page-image archive: named PNG entries packed into one zip blob.

use crate::error::DocShiftError;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Accumulates named binary entries and serialises them as a zip archive.
pub struct PageArchive {
    writer: ZipWriter<Cursor<Vec<u8>>>,
    entries: usize,
}

impl PageArchive {
    pub fn new() -> Self {
        Self {
            writer: ZipWriter::new(Cursor::new(Vec::new())),
            entries: 0,
        }
    }

    /// Append one entry. PNG data is already compressed, so entries are stored.
    pub fn add(&mut self, name: &str, data: &[u8]) -> Result<(), DocShiftError> {
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        self.writer
            .start_file(name, options)
            .map_err(|e| DocShiftError::ArchiveFailed(format!("{name}: {e}")))?;
        self.writer
            .write_all(data)
            .map_err(|e| DocShiftError::ArchiveFailed(format!("{name}: {e}")))?;
        self.entries += 1;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    pub fn finish(self) -> Result<Vec<u8>, DocShiftError> {
        let cursor = self
            .writer
            .finish()
            .map_err(|e| DocShiftError::ArchiveFailed(e.to_string()))?;
        Ok(cursor.into_inner())
    }
}

impl Default for PageArchive {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn entries_round_out_in_order() {
        let mut archive = PageArchive::new();
        archive.add("sayfa_1.png", b"one").unwrap();
        archive.add("sayfa_2.png", b"two").unwrap();
        assert_eq!(archive.len(), 2);
        let blob = archive.finish().unwrap();
        assert!(blob.starts_with(b"PK"));

        let mut zip = zip::ZipArchive::new(Cursor::new(blob)).expect("valid zip");
        assert_eq!(zip.len(), 2);
        let mut second = String::new();
        zip.by_index(1).unwrap().read_to_string(&mut second).unwrap();
        assert_eq!(second, "two");
        assert_eq!(zip.by_index(0).unwrap().name(), "sayfa_1.png");
    }

    #[test]
    fn empty_archive_is_still_valid() {
        let blob = PageArchive::default().finish().unwrap();
        let zip = zip::ZipArchive::new(Cursor::new(blob)).expect("valid zip");
        assert_eq!(zip.len(), 0);
    }
}
