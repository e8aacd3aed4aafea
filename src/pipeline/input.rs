//! Intake: turn user-named paths into validated [`PendingFile`]s.
//!
//! Each path goes through metadata → validation → payload read → preview.
//! Validation only looks at size and extension-derived mime type, so an
//! oversized or unsupported file is rejected before its payload is read.
//! Rejections never stop intake; they are collected into one notice.

use crate::config::{ConversionConfig, ConversionMode};
use crate::error::DocShiftError;
use crate::file::PendingFile;
use crate::validate::{mime_for_path, validate, FileFacts};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Rejected files listed by name before the notice is truncated.
const NOTICE_LIMIT: usize = 3;

/// A file that did not make it into the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    pub name: String,
    pub reason: String,
}

/// Outcome of one intake pass.
#[derive(Debug, Default)]
pub struct Intake {
    /// Accepted files, in the order their paths were given.
    pub accepted: Vec<PendingFile>,
    pub rejected: Vec<Rejection>,
}

impl Intake {
    /// Single notice summarising every rejection, or `None` if there was none.
    ///
    /// At most three files are listed as `name: reason`; when more were
    /// rejected the list ends with `...`.
    pub fn rejection_notice(&self) -> Option<String> {
        if self.rejected.is_empty() {
            return None;
        }
        let mut lines: Vec<String> = self
            .rejected
            .iter()
            .take(NOTICE_LIMIT)
            .map(|r| format!("{}: {}", r.name, r.reason))
            .collect();
        if self.rejected.len() > NOTICE_LIMIT {
            lines.push("...".to_string());
        }
        Some(format!(
            "Some files could not be added:\n{}",
            lines.join("\n")
        ))
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Read, validate and load every path for `mode`.
pub async fn load_files(
    paths: &[PathBuf],
    mode: ConversionMode,
    config: &ConversionConfig,
) -> Intake {
    let mut intake = Intake::default();

    for path in paths {
        let name = display_name(path);
        match load_one(path, &name, mode, config).await {
            Ok(file) => {
                debug!("Accepted '{}' ({} bytes, {})", name, file.size_bytes(), file.mime_type());
                intake.accepted.push(file);
            }
            Err(reason) => {
                warn!("Rejected '{}': {}", name, reason);
                intake.rejected.push(Rejection { name, reason });
            }
        }
    }

    info!(
        "Intake for {}: {} accepted, {} rejected",
        mode,
        intake.accepted.len(),
        intake.rejected.len()
    );
    intake
}

async fn load_one(
    path: &Path,
    name: &str,
    mode: ConversionMode,
    config: &ConversionConfig,
) -> Result<PendingFile, String> {
    let unreadable = |source: std::io::Error| {
        DocShiftError::FileUnreadable {
            path: path.to_path_buf(),
            source,
        }
        .to_string()
    };

    let meta = tokio::fs::metadata(path).await.map_err(unreadable)?;
    if !meta.is_file() {
        return Err("not a regular file".to_string());
    }

    let mime = mime_for_path(path);
    let facts = FileFacts {
        size_bytes: meta.len(),
        mime_type: mime.to_string(),
    };
    let verdict = validate(&facts, mode, config.max_file_size);
    if !verdict.valid {
        return Err(verdict.reason.unwrap_or_else(|| "rejected".to_string()));
    }

    let bytes = tokio::fs::read(path).await.map_err(unreadable)?;
    Ok(PendingFile::new(name, mime, bytes))
}
