//! Storage errors.

/// Errors from the SQLite persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("sqlite error: {message}")]
    SqliteError { message: String },

    #[error("migration to version {version} failed: {message}")]
    MigrationFailed { version: u32, message: String },

    #[error("database returned invalid id {id}")]
    InvalidId { id: i64 },

    #[error("package set {name:?} already exists")]
    PackageSetExists { name: String },

    #[error("package set {name:?} does not exist")]
    PackageSetMissing { name: String },
}
