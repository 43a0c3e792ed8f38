//! Centralized error types for mboxdelta.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mboxdelta library.
#[derive(Error, Debug)]
pub enum IndexerError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A drop-folder file name is not a valid encoded archive URL.
    #[error("Cannot decode file name '{name}': {reason}")]
    FilenameDecode { name: String, reason: String },

    /// A multipart subtype outside alternative/mixed/related/signed.
    #[error("Unsupported multipart subtype: multipart/{0}")]
    UnsupportedMultipartSubtype(String),

    /// A content-tree node the extractor cannot interpret.
    #[error("Unsupported body type: {0}")]
    UnsupportedBodyType(String),

    /// Text extraction of a single attachment failed.
    #[error("Cannot extract text from attachment '{filename}': {reason}")]
    AttachmentExtraction { filename: String, reason: String },

    /// Transfer-encoding or charset decoding failed.
    #[error("Decoding error: {0}")]
    Decode(String),

    /// The raw message could not be parsed into a content tree.
    #[error("Message could not be parsed: {0}")]
    UnparseableMessage(String),

    /// The indexing service rejected the document or could not be reached.
    #[error("Delivery of '{id}' failed: {reason}")]
    Delivery { id: String, reason: String },

    /// The mail could not be serialized to the wire format.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid run configuration (fatal to the run).
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Convenience alias for `Result<T, IndexerError>`.
pub type Result<T> = std::result::Result<T, IndexerError>;

impl IndexerError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a `FilenameDecode` variant.
    pub fn filename(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::FilenameDecode {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Allow `?` on `std::io::Error` when no path context is available
/// (rare, prefer `IndexerError::io`).
impl From<std::io::Error> for IndexerError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}
