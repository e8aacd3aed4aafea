//! Artifact export: output naming and the sinks artifacts are handed to.

use crate::config::{ConversionMode, OutputFormat};
use crate::error::DocShiftError;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// Name of the artifact produced from `source`.
///
/// * to-PDF: the extension is replaced with `.pdf`, or `.pdf` is appended
///   when the name has none (`report.docx` → `report.pdf`).
/// * from-PDF: a trailing `.pdf` (any case) is removed and the format's
///   extension appended (`scan.pdf` → `scan.html`).
pub fn output_file_name(source: &str, mode: ConversionMode, format: OutputFormat) -> String {
    match mode {
        ConversionMode::ToPdf => match source.rfind('.') {
            Some(dot) if dot > 0 => format!("{}.pdf", &source[..dot]),
            _ => format!("{source}.pdf"),
        },
        ConversionMode::FromPdf => {
            let cut = source.len().saturating_sub(4);
            let stem = match source.get(cut..) {
                Some(tail) if tail.eq_ignore_ascii_case(".pdf") => &source[..cut],
                _ => source,
            };
            format!("{}{}", stem, format.extension())
        }
    }
}

/// Destination for finished artifacts.
///
/// Called once per artifact, right after it is produced, on the blocking
/// pool, so implementations may do synchronous I/O. They must tolerate
/// calls from concurrently running files.
pub trait ArtifactSink: Send + Sync {
    fn export(&self, name: &str, bytes: &[u8]) -> Result<(), DocShiftError>;
}

/// Writes artifacts into a directory.
///
/// Each file is written to a temp file in the same directory and renamed
/// into place, so a reader never sees a partial artifact.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    /// Create the sink, creating `dir` if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, DocShiftError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| DocShiftError::OutputWriteFailed {
            path: dir.clone(),
            source: e,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ArtifactSink for DirectorySink {
    fn export(&self, name: &str, bytes: &[u8]) -> Result<(), DocShiftError> {
        let path = self.dir.join(name);
        let write_err = |source: std::io::Error| DocShiftError::OutputWriteFailed {
            path: path.clone(),
            source,
        };

        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir).map_err(write_err)?;
        tmp.write_all(bytes).map_err(write_err)?;
        tmp.persist(&path).map_err(|e| write_err(e.error))?;
        debug!("Wrote {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }
}

/// Keeps artifacts in memory, in export order.
#[derive(Debug, Default)]
pub struct MemorySink {
    artifacts: Mutex<Vec<(String, Vec<u8>)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn names(&self) -> Vec<String> {
        self.lock().iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.lock()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, b)| b.clone())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn into_inner(self) -> Vec<(String, Vec<u8>)> {
        self.artifacts
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(String, Vec<u8>)>> {
        self.artifacts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ArtifactSink for MemorySink {
    fn export(&self, name: &str, bytes: &[u8]) -> Result<(), DocShiftError> {
        self.lock().push((name.to_string(), bytes.to_vec()));
        Ok(())
    }
}
