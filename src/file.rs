//! The pending-file model.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Mime type of legacy Word documents.
pub const MIME_DOC: &str = "application/msword";
/// Mime type of OOXML Word documents.
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// One selected file awaiting conversion.
///
/// The payload is read once at intake and shared behind an `Arc`, so
/// snapshotting a queue of pending files never copies file contents.
#[derive(Clone)]
pub struct PendingFile {
    name: String,
    mime_type: String,
    size_bytes: u64,
    bytes: Arc<[u8]>,
    preview: Preview,
}

impl PendingFile {
    /// Build a pending file from an in-memory payload.
    ///
    /// The preview is derived here, once; it is never re-derived later.
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        let mime_type = mime_type.into();
        let preview = Preview::derive(&mime_type, &bytes);
        Self {
            name: name.into(),
            size_bytes: bytes.len() as u64,
            mime_type,
            bytes: Arc::from(bytes),
            preview,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Shared handle to the payload, for moving into blocking tasks.
    pub fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    pub fn preview(&self) -> &Preview {
        &self.preview
    }

    /// Closed classification of the mime type.
    pub fn kind(&self) -> InputKind {
        InputKind::from_mime(&self.mime_type)
    }
}

impl fmt::Debug for PendingFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingFile")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("size_bytes", &self.size_bytes)
            .finish()
    }
}

/// Display-only content derived from a file at intake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "content", rename_all = "snake_case")]
pub enum Preview {
    /// `data:` URL of an image payload.
    DataUrl(String),
    /// Payload decoded as (lossy) UTF-8 text.
    Text(String),
}

impl Preview {
    fn derive(mime_type: &str, bytes: &[u8]) -> Self {
        if mime_type.starts_with("image/") {
            Preview::DataUrl(format!("data:{};base64,{}", mime_type, STANDARD.encode(bytes)))
        } else {
            Preview::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Preview::DataUrl(s) | Preview::Text(s) => s,
        }
    }
}

/// Input types the transcoder distinguishes.
///
/// Every to-PDF dispatch matches on this enum exhaustively; types without a
/// handler land in an explicit arm instead of falling through a string match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputKind {
    PlainText,
    Html,
    Png,
    Jpeg,
    /// Legacy or OOXML Word document. Accepted at selection, not convertible.
    WordDocument,
    Pdf,
    /// Anything else, including an empty mime type.
    Other(String),
}

impl InputKind {
    pub fn from_mime(mime: &str) -> Self {
        match mime {
            "text/plain" => InputKind::PlainText,
            "text/html" => InputKind::Html,
            "image/png" => InputKind::Png,
            "image/jpeg" | "image/jpg" => InputKind::Jpeg,
            MIME_DOC | MIME_DOCX => InputKind::WordDocument,
            "application/pdf" => InputKind::Pdf,
            other => InputKind::Other(other.to_string()),
        }
    }
}
