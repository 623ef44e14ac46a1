//! ZIP archive errors.

use super::extract_error::ExtractError;

/// Errors from reading a ZIP (JAR) archive.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ZipError {
    #[error("end-of-central-directory record not found")]
    MissingEndOfCentralDirectory,

    #[error("bad central directory entry at offset {offset}")]
    BadCentralDirectory { offset: usize },

    #[error("bad local file header for entry {name}")]
    BadLocalHeader { name: String },

    #[error("entry {name} uses unsupported compression method {method}")]
    UnsupportedMethod { name: String, method: u16 },

    #[error("failed to inflate entry {name}: {message}")]
    Inflate { name: String, message: String },

    #[error(transparent)]
    Truncated(#[from] ExtractError),
}
