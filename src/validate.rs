//! File validation: size limit and per-mode type allow-lists.
//!
//! Validation is pure: it looks only at a file's declared size and mime
//! type, never at its contents, and it never fails a job. Rejected files are
//! filtered out at intake and the rest proceed.

use crate::config::{ConversionMode, MAX_FILE_SIZE};
use crate::file::{PendingFile, MIME_DOC, MIME_DOCX};
use serde::Serialize;
use std::path::Path;

const TO_PDF_TYPES: &[&str] = &[
    "text/plain",
    "text/html",
    "image/png",
    "image/jpeg",
    "image/jpg",
    MIME_DOCX,
    MIME_DOC,
];

const FROM_PDF_TYPES: &[&str] = &["application/pdf"];

/// Outcome of validating one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub reason: Option<String>,
}

impl ValidationResult {
    fn accept() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    fn reject(reason: String) -> Self {
        Self {
            valid: false,
            reason: Some(reason),
        }
    }
}

/// The facts validation needs about a file.
pub trait Validatable {
    fn size_bytes(&self) -> u64;
    fn mime_type(&self) -> &str;
}

impl Validatable for PendingFile {
    fn size_bytes(&self) -> u64 {
        PendingFile::size_bytes(self)
    }

    fn mime_type(&self) -> &str {
        PendingFile::mime_type(self)
    }
}

/// Size and type of a file that has not been read yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFacts {
    pub size_bytes: u64,
    pub mime_type: String,
}

impl Validatable for FileFacts {
    fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    fn mime_type(&self) -> &str {
        &self.mime_type
    }
}

/// Mime types accepted for `mode`.
pub fn allowed_types(mode: ConversionMode) -> &'static [&'static str] {
    match mode {
        ConversionMode::ToPdf => TO_PDF_TYPES,
        ConversionMode::FromPdf => FROM_PDF_TYPES,
    }
}

/// File-selection gate for `mode`, as a comma-separated extension list.
pub fn accepted_extensions(mode: ConversionMode) -> &'static str {
    match mode {
        ConversionMode::ToPdf => ".doc,.docx,.xls,.xlsx,.txt,.html,.png,.jpg,.jpeg",
        ConversionMode::FromPdf => ".pdf",
    }
}

/// Validate `file` for `mode` against `max_size` bytes.
///
/// The size check runs first, so an oversized file is reported as oversized
/// whatever its type. An empty mime type is never accepted.
pub fn validate(file: &impl Validatable, mode: ConversionMode, max_size: u64) -> ValidationResult {
    if file.size_bytes() > max_size {
        let max_mb = max_size as f64 / (1024.0 * 1024.0);
        return ValidationResult::reject(format!("File size must be under {max_mb:.1}MB"));
    }

    let mime = file.mime_type();
    if mime.is_empty() || !allowed_types(mode).contains(&mime) {
        let shown = if mime.is_empty() { "unknown" } else { mime };
        return ValidationResult::reject(format!("Unsupported file type: {shown}"));
    }

    ValidationResult::accept()
}

/// [`validate`] with the default 10 MiB limit.
pub fn validate_default(file: &impl Validatable, mode: ConversionMode) -> ValidationResult {
    validate(file, mode, MAX_FILE_SIZE)
}

/// Mime type for a path, derived from its extension.
///
/// Unknown or missing extensions map to the empty string, which validation
/// always rejects.
pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "txt" => "text/plain",
        "html" | "htm" => "text/html",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "doc" => MIME_DOC,
        "docx" => MIME_DOCX,
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        _ => "",
    }
}

/// Human-readable file size: `0 Bytes`, `512 Bytes`, `1.5 KB`, `10 MB`.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[unit])
}
