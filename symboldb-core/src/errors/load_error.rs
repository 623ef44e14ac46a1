//! Load pipeline errors.

use super::cache_error::CacheError;
use super::download_error::DownloadError;
use super::repomd_error::RepomdError;
use super::rpm_error::RpmError;
use super::storage_error::StorageError;

/// Errors from the RPM load and repository sync pipelines.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    Rpm(#[from] RpmError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Repomd(#[from] RepomdError),

    #[error(transparent)]
    Elf(#[from] super::elf_error::ElfError),

    #[error("package digest mismatch for {path} (actual {actual}, expected {expected})")]
    PackageDigestMismatch {
        path: String,
        actual: String,
        expected: String,
    },

    #[error("invalid exclude pattern {pattern:?}: {message}")]
    InvalidExcludePattern { pattern: String, message: String },

    #[error("{count} of {total} repository downloads failed")]
    DownloadErrors { count: usize, total: usize },
}
