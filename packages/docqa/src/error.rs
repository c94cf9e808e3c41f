//! Typed errors for the document Q&A library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling.

use thiserror::Error;

/// Errors that can occur while loading documents or answering questions.
#[derive(Debug, Error)]
pub enum DocQaError {
    /// File extension is not one the extractor handles
    #[error("unsupported file type: .{extension}")]
    UnsupportedFileType { extension: String },

    /// Upload exceeds the configured size limit
    #[error("file too large: {size} bytes (maximum {max} bytes)")]
    FileTooLarge { size: u64, max: u64 },

    /// Input could not be read at all
    #[error("extraction failed: {reason}")]
    ExtractionFailed { reason: String },

    /// Completion API call failed (network, non-2xx, malformed response)
    #[error("{0}")]
    RemoteCallFailed(String),

    /// Required configuration is missing or invalid
    #[error("configuration error: {0}")]
    ConfigurationMissing(String),

    /// A question was asked before any document was loaded
    #[error("no document loaded")]
    NoDocumentLoaded,

    /// The question was empty
    #[error("empty query")]
    EmptyQuery,

    /// A newer upload or query started before this one finished
    #[error("superseded by a newer request")]
    Superseded,

    /// Operation was cancelled
    #[error("operation cancelled")]
    Cancelled,
}

impl From<openai_client::OpenAIError> for DocQaError {
    fn from(err: openai_client::OpenAIError) -> Self {
        DocQaError::RemoteCallFailed(err.to_string())
    }
}

/// Result type alias for document Q&A operations.
pub type Result<T> = std::result::Result<T, DocQaError>;
