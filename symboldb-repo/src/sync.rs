//! Repository synchronization: fetch repomd and primary metadata, download
//! missing packages into the cache, load them, and refresh the target
//! package set.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::path::PathBuf;

use rand::seq::SliceRandom;
use regex::Regex;
use symboldb_core::checksum::Checksum;
use symboldb_core::config::{CacheMode, DownloadOptions};
use symboldb_core::errors::{LoadError, RepomdError, StorageError};
use symboldb_core::types::{PackageId, PackageSetId};
use symboldb_formats::repomd::{repomd_url, url_combine_yum, PrimaryReader, Repomd};
use symboldb_formats::rpm::Evr;
use symboldb_storage::closure::{update_elf_closure, IgnoreConflicts};
use symboldb_storage::queries::{expire as expire_q, sets, url_cache};
use symboldb_storage::DatabaseManager;

use crate::cache::FileCache;
use crate::download::Downloader;
use crate::load;

/// URL cache entries older than this are dropped by `expire`.
const URL_CACHE_MAX_AGE_SECS: i64 = 3 * 24 * 3600;

/// Knobs for repository synchronization.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Cache mode for repomd.xml, which changes between fetches.
    pub download: DownloadOptions,
    /// Cache mode for hash-addressed files such as primary.xml.
    pub download_always_cache: DownloadOptions,
    pub rpm_cache_dir: PathBuf,
    pub exclude_name: Option<Regex>,
    pub randomize: bool,
    pub ignore_download_errors: bool,
}

/// Picks the largest version for each package name/architecture pair.
pub struct PackageSetConsolidator<T> {
    entries: BTreeMap<(String, String), (Evr, T)>,
}

impl<T> Default for PackageSetConsolidator<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PackageSetConsolidator<T> {
    pub fn new() -> Self {
        PackageSetConsolidator {
            entries: BTreeMap::new(),
        }
    }

    pub fn add(&mut self, name: &str, arch: &str, evr: Evr, value: T) {
        let key = (name.to_string(), arch.to_string());
        match self.entries.get_mut(&key) {
            Some((existing, slot)) => {
                if evr > *existing {
                    *existing = evr;
                    *slot = value;
                }
            }
            None => {
                self.entries.insert(key, (evr, value));
            }
        }
    }

    pub fn values(self) -> Vec<T> {
        self.entries.into_values().map(|(_, value)| value).collect()
    }
}

/// One package to download, as advertised by primary.xml.
#[derive(Debug, Clone)]
struct RpmUrl {
    name: String,
    href: String,
    checksum: Checksum,
}

/// Fetch and parse repomd.xml. Returns the document and the normalized
/// base URL of the repository.
pub fn acquire_repomd(
    downloader: &Downloader,
    db: &DatabaseManager,
    options: DownloadOptions,
    base: &str,
) -> Result<(Repomd, String), LoadError> {
    let data = downloader.download(options, db, &repomd_url(base))?;
    let repomd = Repomd::parse(&data)?;
    let mut base_url = base.to_string();
    if !base_url.ends_with('/') {
        base_url.push('/');
    }
    Ok((repomd, base_url))
}

/// Download the primary.xml payload named by the repomd document and
/// decompress it if necessary. The URL embeds a content hash, so any
/// cached copy is trusted.
pub fn fetch_primary(
    downloader: &Downloader,
    db: &DatabaseManager,
    options: DownloadOptions,
    repomd: &Repomd,
    base_url: &str,
) -> Result<Vec<u8>, LoadError> {
    let entry = repomd
        .entries
        .iter()
        .find(|entry| entry.entry_type == "primary")
        .ok_or(RepomdError::MissingElement { name: "primary" })?;
    let url = url_combine_yum(base_url, &entry.href);
    let data = downloader.download(options, db, &url)?;
    if entry.compressed || entry.href.ends_with(".gz") {
        let mut decoder = flate2::read::GzDecoder::new(data.as_slice());
        let mut out = Vec::new();
        decoder
            .read_to_end(&mut out)
            .map_err(|e| RepomdError::Xml {
                position: 0,
                message: format!("failed to decompress {url}: {e}"),
            })?;
        return Ok(out);
    }
    Ok(data)
}

/// Synchronize one or more repositories. With `load`, every package ends
/// up in the database; with `set_name` as well, the named package set is
/// updated to the repository contents and its ELF closure refreshed.
///
/// Returns the ids of all packages in the download set.
pub fn download_repo(
    db: &DatabaseManager,
    downloader: &Downloader,
    options: &SyncOptions,
    urls: &[String],
    load_packages: bool,
    set_name: Option<&str>,
) -> Result<Vec<PackageId>, LoadError> {
    let set = match (load_packages, set_name) {
        (true, Some(name)) => {
            let set = db
                .with_reader(|conn| sets::lookup_package_set(conn, name))?
                .ok_or_else(|| StorageError::PackageSetMissing {
                    name: name.to_string(),
                })?;
            Some(set)
        }
        _ => None,
    };

    let mut consolidator = PackageSetConsolidator::new();
    for url in urls {
        tracing::info!(url, "processing repository");
        let (repomd, base_url) = acquire_repomd(downloader, db, options.download, url)?;
        let primary = fetch_primary(
            downloader,
            db,
            options.download_always_cache,
            &repomd,
            &base_url,
        )?;
        let mut reader = PrimaryReader::new(&primary, &base_url);
        while let Some(package) = reader.next_package()? {
            consolidator.add(
                &package.name,
                &package.arch,
                Evr::new(package.epoch, &package.version, &package.release),
                RpmUrl {
                    name: package.name.clone(),
                    href: package.href.clone(),
                    checksum: package.checksum.clone(),
                },
            );
        }
    }

    let mut pending = consolidator.values();
    let total = pending.len();
    tracing::info!(packages = total, "download set assembled");

    if let Some(exclude) = &options.exclude_name {
        let before = pending.len();
        pending.retain(|rurl| !exclude.is_match(&rurl.name));
        tracing::info!(excluded = before - pending.len(), "package name filter applied");
    }

    // Skip everything the database already has, by digest.
    let mut pids: BTreeSet<PackageId> = BTreeSet::new();
    {
        let mut keep = Vec::with_capacity(pending.len());
        for rurl in pending {
            let existing = db.with_reader(|conn| {
                symboldb_storage::queries::packages::package_by_digest(conn, &rurl.checksum.value)
            })?;
            match existing {
                Some(pid) => {
                    tracing::debug!(href = %rurl.href, "skipping already-interned package");
                    pids.insert(pid);
                }
                None => keep.push(rurl),
            }
        }
        pending = keep;
        tracing::info!(remaining = pending.len(), "after database comparison");
    }

    // Up to three passes over the remaining downloads; transient errors
    // get retried, persistent ones survive into `pending`.
    let cache = FileCache::open(&options.rpm_cache_dir)?;
    let start_count = pending.len();
    let mut downloaded = 0usize;
    for _iteration in 0..3 {
        if pending.is_empty() {
            break;
        }
        if options.randomize {
            pending.shuffle(&mut rand::thread_rng());
        }
        let mut failed = Vec::new();
        for rurl in pending {
            match fetch_one(db, downloader, &cache, &rurl, load_packages, &mut downloaded) {
                Ok(Some(pid)) => {
                    pids.insert(pid);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(href = %rurl.href, error = %e, "download failed");
                    failed.push(rurl);
                }
            }
        }
        pending = failed;
    }
    tracing::info!(downloaded, total = start_count, "download pass finished");

    if !pending.is_empty() {
        for rurl in &pending {
            tracing::error!(href = %rurl.href, "package failed to download");
        }
        let ignorable = options.ignore_download_errors && set.is_some() && !pids.is_empty();
        if !ignorable {
            return Err(LoadError::DownloadErrors {
                count: pending.len(),
                total,
            });
        }
        tracing::warn!("download errors ignored, continuing");
    }

    let members: Vec<PackageId> = pids.iter().copied().collect();
    if let Some(set) = set {
        update_set_and_closure(db, set, &members)?;
    }
    Ok(members)
}

fn fetch_one(
    db: &DatabaseManager,
    downloader: &Downloader,
    cache: &FileCache,
    rurl: &RpmUrl,
    load_packages: bool,
    downloaded: &mut usize,
) -> Result<Option<PackageId>, LoadError> {
    let rpm_path = match cache.lookup_path(&rurl.checksum) {
        Some(path) => path,
        None => {
            match rurl.checksum.length {
                Some(length) => {
                    tracing::info!(href = %rurl.href, bytes = length, "downloading package")
                }
                None => tracing::info!(href = %rurl.href, "downloading package"),
            }
            let data = downloader.download(
                DownloadOptions {
                    cache_mode: CacheMode::NoCache,
                },
                db,
                &rurl.href,
            )?;
            *downloaded += 1;
            cache.add(&rurl.checksum, &data)?
        }
    };
    if !load_packages {
        return Ok(None);
    }
    let (pid, _info) =
        load::load_rpm_file(db, &rpm_path, Some(&rurl.checksum), Some(&rurl.href))?;
    Ok(Some(pid))
}

/// Replace the set members and, when the membership changed, recompute
/// the ELF closure. One transaction covers both.
pub fn update_set_and_closure(
    db: &DatabaseManager,
    set: PackageSetId,
    members: &[PackageId],
) -> Result<(), LoadError> {
    db.with_transaction(|conn| -> Result<(), StorageError> {
        if sets::replace_package_set(conn, set, members)? {
            update_elf_closure(conn, set, &mut IgnoreConflicts)?;
        }
        Ok(())
    })?;
    Ok(())
}

/// RPM cache entries whose digests no package set references any more.
pub fn stale_cached_rpms(
    db: &DatabaseManager,
    cache: &FileCache,
) -> Result<Vec<Vec<u8>>, LoadError> {
    let cached = cache.digests()?;
    let referenced = db.with_reader(|conn| expire_q::referenced_package_digests(conn))?;
    Ok(cached
        .into_iter()
        .filter(|digest| referenced.binary_search(digest).is_err())
        .collect())
}

/// Expire unreferenced data: URL cache entries, packages outside every
/// package set, orphaned file contents and class descriptors, and cached
/// RPM files nothing references.
pub fn expire(db: &DatabaseManager, cache: &FileCache) -> Result<(), LoadError> {
    db.with_transaction(|conn| -> Result<(), StorageError> {
        tracing::info!("expiring URL cache");
        url_cache::expire(conn, URL_CACHE_MAX_AGE_SECS)?;
        tracing::info!("expiring unreferenced packages");
        expire_q::expire_packages(conn)?;
        tracing::info!("expiring file contents");
        expire_q::expire_file_contents(conn)?;
        tracing::info!("expiring java classes");
        expire_q::expire_java_classes(conn)?;
        Ok(())
    })?;

    tracing::info!("expiring unused cached RPMs");
    for digest in stale_cached_rpms(db, cache)? {
        cache.remove(&digest)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consolidator_keeps_newest_version() {
        let mut consolidator = PackageSetConsolidator::new();
        consolidator.add("bash", "x86_64", Evr::new(None, "5.0", "1"), 1);
        consolidator.add("bash", "x86_64", Evr::new(None, "5.2", "1"), 2);
        consolidator.add("bash", "x86_64", Evr::new(None, "5.1", "9"), 3);
        consolidator.add("bash", "i686", Evr::new(None, "4.0", "1"), 4);
        consolidator.add("zsh", "x86_64", Evr::new(None, "5.9", "1"), 5);
        let mut values = consolidator.values();
        values.sort();
        assert_eq!(values, vec![2, 4, 5]);
    }

    #[test]
    fn consolidator_epoch_dominates() {
        let mut consolidator = PackageSetConsolidator::new();
        consolidator.add("pkg", "noarch", Evr::new(None, "9.9", "9"), "old");
        consolidator.add("pkg", "noarch", Evr::new(Some(1), "1.0", "1"), "epoch");
        assert_eq!(consolidator.values(), vec!["epoch"]);
    }
}
