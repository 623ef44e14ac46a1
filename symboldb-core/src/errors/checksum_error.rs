//! Checksum errors.

use crate::checksum::HashKind;

/// Errors from parsing or validating digests.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChecksumError {
    #[error("unsupported digest algorithm: {name}")]
    UnsupportedAlgorithm { name: String },

    #[error("malformed hexadecimal digest: {digest}")]
    MalformedDigest { digest: String },

    #[error("{kind} digest has wrong length {actual}")]
    WrongDigestLength { kind: HashKind, actual: usize },
}
