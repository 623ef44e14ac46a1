//! Content-addressed cache for downloaded RPM files.
//!
//! Files are stored under the lower-case hexadecimal rendering of their
//! digest. SHA-1 and SHA-256 names differ in length, so the two digest
//! families coexist in one directory.

use std::fs;
use std::path::{Path, PathBuf};

use symboldb_core::checksum::{hash_bytes, Checksum};
use symboldb_core::errors::CacheError;

pub struct FileCache {
    path: PathBuf,
}

impl FileCache {
    /// Open the cache directory, creating it if necessary.
    pub fn open(path: &Path) -> Result<Self, CacheError> {
        fs::create_dir_all(path).map_err(|source| CacheError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(FileCache {
            path: path.to_path_buf(),
        })
    }

    fn entry_path(&self, digest: &[u8]) -> PathBuf {
        self.path.join(hex::encode(digest))
    }

    /// Path of the cached file for this checksum, if present with the
    /// expected length.
    pub fn lookup_path(&self, checksum: &Checksum) -> Option<PathBuf> {
        let path = self.entry_path(&checksum.value);
        let metadata = fs::metadata(&path).ok()?;
        if let Some(expected) = checksum.length {
            if metadata.len() != expected {
                return None;
            }
        }
        Some(path)
    }

    /// Verify the data against the checksum and store it. Returns the
    /// path of the cache entry.
    pub fn add(&self, checksum: &Checksum, data: &[u8]) -> Result<PathBuf, CacheError> {
        if let Some(expected) = checksum.length {
            if data.len() as u64 != expected {
                return Err(CacheError::LengthMismatch {
                    actual: data.len() as u64,
                    expected,
                });
            }
        }
        if hash_bytes(checksum.kind, data) != checksum.value {
            return Err(CacheError::ChecksumMismatch {
                kind: checksum.kind,
            });
        }
        let target = self.entry_path(&checksum.value);
        if target.exists() {
            return Ok(target);
        }
        // Write to a temporary name first so a concurrent reader never
        // sees a partial entry.
        let temporary = self.path.join(format!(".tmp-{}", hex::encode(&checksum.value)));
        fs::write(&temporary, data).map_err(|source| CacheError::Io {
            path: temporary.display().to_string(),
            source,
        })?;
        fs::rename(&temporary, &target).map_err(|source| CacheError::Io {
            path: target.display().to_string(),
            source,
        })?;
        Ok(target)
    }

    /// All digests currently present, sorted.
    pub fn digests(&self) -> Result<Vec<Vec<u8>>, CacheError> {
        let mut result = Vec::new();
        let entries = fs::read_dir(&self.path).map_err(|source| CacheError::Io {
            path: self.path.display().to_string(),
            source,
        })?;
        for entry in entries {
            let entry = entry.map_err(|source| CacheError::Io {
                path: self.path.display().to_string(),
                source,
            })?;
            if let Some(name) = entry.file_name().to_str() {
                if let Ok(digest) = hex::decode(name) {
                    result.push(digest);
                }
            }
        }
        result.sort();
        Ok(result)
    }

    /// Remove one entry. Returns true if it existed.
    pub fn remove(&self, digest: &[u8]) -> Result<bool, CacheError> {
        let path = self.entry_path(digest);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(CacheError::Io {
                path: path.display().to_string(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use symboldb_core::checksum::HashKind;
    use tempfile::TempDir;

    #[test]
    fn add_then_lookup() {
        let dir = TempDir::new().unwrap();
        let cache = FileCache::open(dir.path()).unwrap();
        let checksum = Checksum::of(HashKind::Sha256, b"cached rpm data");
        assert!(cache.lookup_path(&checksum).is_none());
        let path = cache.add(&checksum, b"cached rpm data").unwrap();
        assert_eq!(cache.lookup_path(&checksum).as_deref(), Some(path.as_path()));
        assert_eq!(fs::read(&path).unwrap(), b"cached rpm data");
    }

    #[test]
    fn checksum_mismatch_is_rejected() {
        let dir = TempDir::new().unwrap();
        let cache = FileCache::open(dir.path()).unwrap();
        let mut checksum = Checksum::of(HashKind::Sha256, b"original");
        checksum.length = None;
        assert!(matches!(
            cache.add(&checksum, b"tampered"),
            Err(CacheError::ChecksumMismatch { .. })
        ));
        let checksum = Checksum::of(HashKind::Sha256, b"12345");
        assert!(matches!(
            cache.add(&checksum, b"1234"),
            Err(CacheError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn digest_enumeration_and_removal() {
        let dir = TempDir::new().unwrap();
        let cache = FileCache::open(dir.path()).unwrap();
        let a = Checksum::of(HashKind::Sha256, b"a");
        let b = Checksum::of(HashKind::Sha1, b"b");
        cache.add(&a, b"a").unwrap();
        cache.add(&b, b"b").unwrap();
        let mut expected = vec![a.value.clone(), b.value.clone()];
        expected.sort();
        assert_eq!(cache.digests().unwrap(), expected);
        assert!(cache.remove(&a.value).unwrap());
        assert!(!cache.remove(&a.value).unwrap());
        assert_eq!(cache.digests().unwrap(), vec![b.value]);
    }
}
