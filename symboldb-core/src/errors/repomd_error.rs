//! Repository metadata parse errors.

use super::checksum_error::ChecksumError;

/// Errors from parsing repomd.xml or primary.xml.
#[derive(Debug, thiserror::Error)]
pub enum RepomdError {
    #[error("XML error at byte {position}: {message}")]
    Xml { position: u64, message: String },

    #[error("invalid root element {found:?}, expected {expected:?}")]
    InvalidRoot { expected: &'static str, found: String },

    #[error("missing {name:?} element")]
    MissingElement { name: &'static str },

    #[error("missing {name:?} attribute on {element:?} element")]
    MissingAttribute {
        element: &'static str,
        name: &'static str,
    },

    #[error("malformed {name:?} element: {value:?}")]
    MalformedElement { name: &'static str, value: String },

    #[error("invalid package type {found:?}")]
    InvalidPackageType { found: String },

    #[error(transparent)]
    Checksum(#[from] ChecksumError),
}
