//! Input document model.

use std::path::Path;

/// An opaque document to submit for OCR (typically a PDF).
///
/// The page count is not known up front; it becomes authoritative only
/// when the service's first `info` event arrives.
#[derive(Debug, Clone)]
pub struct Document {
    /// Display name, sent as the upload filename.
    pub name: String,
    pub bytes: Vec<u8>,
}

impl Document {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Read a document from disk, using the file name for display.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.pdf".to_string());
        Ok(Self { name, bytes })
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}
