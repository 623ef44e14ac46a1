//! Download errors.

/// Errors from fetching repository data over HTTP.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("failed to fetch {url}: {message}")]
    Http { url: String, message: String },

    #[error("{url} returned HTTP status {status}")]
    Status { url: String, status: u16 },

    #[error("network access disabled and {url} is not cached")]
    NotCached { url: String },

    #[error(transparent)]
    Storage(#[from] super::storage_error::StorageError),
}
