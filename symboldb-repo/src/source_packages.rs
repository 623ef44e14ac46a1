//! Source package listing across repositories.

use std::collections::BTreeSet;

use rayon::prelude::*;
use symboldb_core::config::DownloadOptions;
use symboldb_core::errors::LoadError;
use symboldb_formats::repomd::{source_package_name, PrimaryReader};
use symboldb_storage::DatabaseManager;

use crate::download::Downloader;
use crate::sync;

/// The sorted, deduplicated source package names of every repository.
/// Repositories are fetched in parallel; a repository that fails takes
/// the whole listing down unless others can stand in for it, matching
/// the all-or-nothing expectations of compose tooling.
pub fn source_packages(
    db: &DatabaseManager,
    downloader: &Downloader,
    download: DownloadOptions,
    download_always_cache: DownloadOptions,
    urls: &[String],
) -> Result<Vec<String>, LoadError> {
    let results: Vec<Result<BTreeSet<String>, LoadError>> = urls
        .par_iter()
        .map(|url| {
            let (repomd, base_url) = sync::acquire_repomd(downloader, db, download, url)?;
            let primary =
                sync::fetch_primary(downloader, db, download_always_cache, &repomd, &base_url)?;
            let mut reader = PrimaryReader::new(&primary, &base_url);
            let mut names = BTreeSet::new();
            while let Some(package) = reader.next_package()? {
                match source_package_name(&package.source_rpm) {
                    Some(name) => {
                        names.insert(name.to_string());
                    }
                    None => {
                        return Err(LoadError::Repomd(
                            symboldb_core::errors::RepomdError::MalformedElement {
                                name: "sourcerpm",
                                value: package.source_rpm.clone(),
                            },
                        ))
                    }
                }
            }
            Ok(names)
        })
        .collect();

    let mut merged = BTreeSet::new();
    for result in results {
        merged.append(&mut result?);
    }
    Ok(merged.into_iter().collect())
}
