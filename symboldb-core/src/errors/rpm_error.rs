//! RPM package parse errors.

use super::cpio_error::CpioError;
use super::extract_error::ExtractError;

/// Errors that can occur while parsing an RPM package.
#[derive(Debug, thiserror::Error)]
pub enum RpmError {
    #[error("not an RPM file (bad lead magic)")]
    BadLeadMagic,

    #[error("bad RPM header magic in {section} section")]
    BadHeaderMagic { section: &'static str },

    #[error("header entry {tag} has unexpected type {found}")]
    TypeMismatch { tag: u32, found: u32 },

    #[error("header entry {tag} has malformed data: {message}")]
    MalformedEntry { tag: u32, message: String },

    #[error("required header tag {name} is missing")]
    MissingTag { name: &'static str },

    #[error("file table columns have inconsistent lengths")]
    InconsistentFileTable,

    #[error("unsupported payload compressor {name:?}")]
    UnsupportedCompressor { name: String },

    #[error("unsupported payload format {name:?}")]
    UnsupportedPayloadFormat { name: String },

    #[error("{path}: digest mismatch for {file} (actual {actual}, expected {expected})")]
    DigestMismatch {
        path: String,
        file: String,
        actual: String,
        expected: String,
    },

    #[error("payload entry {name} does not appear in the RPM file table")]
    UnknownPayloadEntry { name: String },

    #[error("failed to decompress payload: {message}")]
    Payload { message: String },

    #[error(transparent)]
    Cpio(#[from] CpioError),

    #[error(transparent)]
    Truncated(#[from] ExtractError),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
