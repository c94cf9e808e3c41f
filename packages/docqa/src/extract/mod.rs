//! Text extraction from uploaded files.
//!
//! Dispatches on the file extension:
//!
//! - `pdf` - structured parse via `lopdf`, then byte-pattern fallbacks
//! - `docx` / `doc` - `<w:t>` run scraping, then plain-line filtering
//! - `txt` - content returned unchanged
//!
//! Structured failures degrade to placeholder text wherever possible; only
//! wholly unreadable input is an error.

mod docx;
mod fonts;
mod pdf;
mod text;

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{DocQaError, Result};

/// A file as handed over by the upload surface.
#[derive(Clone)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Lower-cased extension without the dot, if any.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

impl fmt::Debug for UploadedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedFile")
            .field("name", &self.name)
            .field("size", &self.bytes.len())
            .finish()
    }
}

/// Supported input formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Docx,
    Text,
}

impl FileKind {
    /// Resolve a file kind from an extension (without the dot).
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_lowercase().as_str() {
            "pdf" => Some(FileKind::Pdf),
            "docx" | "doc" => Some(FileKind::Docx),
            "txt" => Some(FileKind::Text),
            _ => None,
        }
    }
}

/// How the document text was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractionMethod {
    PdfStructured,
    PdfFallbackPattern,
    DocxXml,
    DocxPlaintext,
    Plaintext,
    /// Nothing recoverable; the text explains why.
    Placeholder,
}

/// Output of a single extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    pub text: String,
    pub method: ExtractionMethod,
}

impl Extracted {
    pub(crate) fn new(text: impl Into<String>, method: ExtractionMethod) -> Self {
        Self {
            text: text.into(),
            method,
        }
    }
}

/// Converts uploaded files into plain, lightly structured text.
#[derive(Debug, Clone)]
pub struct TextExtractor {
    line_break_threshold: f32,
}

impl Default for TextExtractor {
    fn default() -> Self {
        Self {
            line_break_threshold: pdf::DEFAULT_LINE_BREAK_THRESHOLD,
        }
    }
}

impl TextExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Vertical distance between PDF text runs that starts a new line.
    pub fn with_line_break_threshold(mut self, threshold: f32) -> Self {
        self.line_break_threshold = threshold;
        self
    }

    /// Extract text from an uploaded file.
    pub fn extract(&self, file: &UploadedFile) -> Result<Extracted> {
        let extension = file.extension().unwrap_or_default();
        let kind = FileKind::from_extension(&extension)
            .ok_or(DocQaError::UnsupportedFileType { extension })?;

        debug!(file_name = %file.name, kind = ?kind, size = file.bytes.len(), "Extracting text");

        let extracted = match kind {
            FileKind::Pdf => pdf::extract(&file.name, &file.bytes, self.line_break_threshold),
            FileKind::Docx => docx::extract(&file.name, &file.bytes),
            FileKind::Text => text::extract(&file.bytes),
        };

        info!(
            file_name = %file.name,
            method = ?extracted.method,
            chars = extracted.text.chars().count(),
            "Text extracted"
        );
        Ok(extracted)
    }
}

/// Title line prepended to synthesized output.
pub(crate) fn title_header(file_name: &str) -> String {
    format!("# {}\n\n", file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_by_extension() {
        assert_eq!(FileKind::from_extension("PDF"), Some(FileKind::Pdf));
        assert_eq!(FileKind::from_extension("doc"), Some(FileKind::Docx));
        assert_eq!(FileKind::from_extension("docx"), Some(FileKind::Docx));
        assert_eq!(FileKind::from_extension("txt"), Some(FileKind::Text));
        assert_eq!(FileKind::from_extension("xlsx"), None);
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let file = UploadedFile::new("sheet.xlsx", b"data".to_vec());
        let err = TextExtractor::new().extract(&file).unwrap_err();
        assert!(matches!(err, DocQaError::UnsupportedFileType { extension } if extension == "xlsx"));
    }

    #[test]
    fn test_missing_extension_rejected() {
        let file = UploadedFile::new("README", b"data".to_vec());
        assert!(matches!(
            TextExtractor::new().extract(&file),
            Err(DocQaError::UnsupportedFileType { .. })
        ));
    }

    #[test]
    fn test_text_passthrough() {
        let file = UploadedFile::new("notes.TXT", "line one\r\nline two\n".as_bytes().to_vec());
        let extracted = TextExtractor::new().extract(&file).unwrap();
        assert_eq!(extracted.text, "line one\r\nline two\n");
        assert_eq!(extracted.method, ExtractionMethod::Plaintext);
    }

    #[test]
    fn test_debug_hides_bytes() {
        let file = UploadedFile::new("a.txt", vec![b'x'; 4]);
        assert_eq!(format!("{:?}", file), "UploadedFile { name: \"a.txt\", size: 4 }");
    }
}
