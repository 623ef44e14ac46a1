//! File cache errors.

use crate::checksum::HashKind;

/// Errors from the content-addressed file cache.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("checksum mismatch storing {kind} digest into the cache")]
    ChecksumMismatch { kind: HashKind },

    #[error("length mismatch storing data into the cache (actual {actual}, expected {expected})")]
    LengthMismatch { actual: u64, expected: u64 },

    #[error("cache I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
