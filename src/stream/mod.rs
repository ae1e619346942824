//! Incremental JSON parsing for multi-gigabyte machine-readable files
//!
//! The stream parser never materializes a file's root document. A byte-level
//! scanner walks the top-level object, skipping or capturing values as
//! directed, and yields each element of the target array as an owned,
//! independent record. Memory use is constant in the number of items.
//!
//! A `ParseError` carries the absolute byte offset of the failure so a
//! malformed multi-GB file can be reported precisely; the orchestrator skips
//! the offending file but never aborts the run.

mod in_network;
mod scanner;
mod toc;

pub use in_network::{extract_provider_references, InNetworkStream};
pub use scanner::DocumentScanner;
pub use toc::{detect, DetectedStream, TocStream};

use serde::de::DeserializeOwned;

/// Error type for streaming parse operations.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// IO failure of the underlying byte stream
    #[error("IO error at byte {offset}: {source}")]
    Io {
        offset: u64,
        #[source]
        source: std::io::Error,
    },

    /// The stream ended inside a value
    #[error("unexpected end of stream at byte {offset}")]
    UnexpectedEof { offset: u64 },

    /// Structurally invalid JSON
    #[error("unexpected byte {byte:?} at offset {offset}")]
    UnexpectedToken { byte: char, offset: u64 },

    /// A complete element failed to deserialize
    #[error("malformed element at byte {offset}: {source}")]
    Element {
        offset: u64,
        #[source]
        source: serde_json::Error,
    },

    /// The document matched none of the supported shapes
    #[error("unsupported document shape: {0}")]
    UnsupportedShape(String),
}

impl ParseError {
    pub(crate) fn unexpected(byte: u8, offset: u64) -> Self {
        ParseError::UnexpectedToken {
            byte: byte as char,
            offset,
        }
    }

    /// Byte offset the failure was observed at, when the stream got that far.
    pub fn offset(&self) -> Option<u64> {
        match self {
            ParseError::Io { offset, .. }
            | ParseError::UnexpectedEof { offset }
            | ParseError::UnexpectedToken { offset, .. }
            | ParseError::Element { offset, .. } => Some(*offset),
            ParseError::UnsupportedShape(_) => None,
        }
    }
}

pub(crate) fn parse_slice<T: DeserializeOwned>(bytes: &[u8], offset: u64) -> Result<T, ParseError> {
    serde_json::from_slice(bytes).map_err(|source| ParseError::Element { offset, source })
}
