//! Command-line definition and dispatch.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use regex::Regex;

use symboldb_core::config::{self, CacheMode, DownloadOptions};
use symboldb_core::errors::StorageError;
use symboldb_core::types::{PackageId, PackageSetId};
use symboldb_formats::repomd::url_combine_yum;
use symboldb_formats::rpm::Evr;
use symboldb_repo::cache::FileCache;
use symboldb_repo::download::Downloader;
use symboldb_repo::load::load_rpm_file;
use symboldb_repo::source_packages::source_packages;
use symboldb_repo::sync::{
    self, acquire_repomd, fetch_primary, PackageSetConsolidator, SyncOptions,
};
use symboldb_storage::queries::sets;
use symboldb_storage::DatabaseManager;

#[derive(Parser)]
#[command(
    name = "symboldb",
    version,
    about = "Index RPM repositories into a queryable symbol database"
)]
pub struct Cli {
    /// Path to the SQLite database.
    #[arg(long, global = true, default_value = "symboldb.db")]
    pub db: PathBuf,

    /// Path to the download cache (default: ~/.cache/symboldb).
    #[arg(long, short = 'C', global = true)]
    pub cache: Option<String>,

    /// Disable most network access.
    #[arg(long, short = 'N', global = true)]
    pub no_net: bool,

    /// Less output.
    #[arg(long, short, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// More verbose output.
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Exclude packages whose name matches this regular expression.
    /// May be given several times.
    #[arg(long = "exclude-name", global = true)]
    pub exclude_name: Vec<String>,

    /// Perform downloads in random order.
    #[arg(long, global = true)]
    pub randomize: bool,

    /// Process repositories with download errors.
    #[arg(long, global = true)]
    pub ignore_download_errors: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create or migrate the database schema.
    CreateSchema,
    /// Load RPM files into the database.
    LoadRpm {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Create a package set from RPM files.
    CreateSet { name: String, files: Vec<PathBuf> },
    /// Replace the contents of a package set with RPM files.
    UpdateSet { name: String, files: Vec<PathBuf> },
    /// Synchronize a package set from repository URLs.
    UpdateSetFromRepo {
        name: String,
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Download repositories and load every package, without a set.
    LoadRepo {
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Download repository packages into the cache, without loading.
    DownloadRepo {
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Download a URL and write it to standard output.
    Download { url: String },
    /// Show the parsed repomd.xml of a repository.
    ShowRepomd { url: String },
    /// Write the uncompressed primary.xml of a repository to standard
    /// output.
    ShowPrimary { url: String },
    /// List the source package names of one or more repositories.
    ShowSourcePackages {
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// List cached RPM digests no package set references.
    ShowStaleCachedRpms,
    /// Report sonames with several providers within a package set.
    ShowSonameConflicts { set: String },
    /// Delete unreferenced packages, contents, and cache entries.
    Expire,
    /// Execute SQL statements from files against the database.
    RunSql {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

impl Cli {
    fn download_options(&self) -> DownloadOptions {
        DownloadOptions {
            cache_mode: if self.no_net {
                CacheMode::OnlyCache
            } else {
                CacheMode::CheckCache
            },
        }
    }

    fn download_always_cache(&self) -> DownloadOptions {
        DownloadOptions {
            cache_mode: if self.no_net {
                CacheMode::OnlyCache
            } else {
                CacheMode::AlwaysCache
            },
        }
    }

    /// All --exclude-name expressions combined into one pattern.
    fn exclude_name(&self) -> Result<Option<Regex>> {
        if self.exclude_name.is_empty() {
            return Ok(None);
        }
        let combined = self
            .exclude_name
            .iter()
            .map(|pattern| format!("(?:{pattern})"))
            .collect::<Vec<_>>()
            .join("|");
        let regex = Regex::new(&combined)
            .with_context(|| format!("invalid --exclude-name pattern {combined:?}"))?;
        Ok(Some(regex))
    }

    fn rpm_cache_dir(&self) -> PathBuf {
        config::rpm_cache_directory(self.cache.as_deref())
    }

    fn sync_options(&self) -> Result<SyncOptions> {
        Ok(SyncOptions {
            download: self.download_options(),
            download_always_cache: self.download_always_cache(),
            rpm_cache_dir: self.rpm_cache_dir(),
            exclude_name: self.exclude_name()?,
            randomize: self.randomize,
            ignore_download_errors: self.ignore_download_errors,
        })
    }
}

pub fn run(cli: Cli) -> Result<()> {
    let db = DatabaseManager::open(&cli.db)
        .with_context(|| format!("cannot open database {}", cli.db.display()))?;
    let downloader = Downloader::new();

    match &cli.command {
        // Opening the database already creates and migrates the schema.
        Command::CreateSchema => Ok(()),
        Command::LoadRpm { files } => {
            load_rpm_files(&db, files)?;
            Ok(())
        }
        Command::CreateSet { name, files } => {
            let set = db.with_transaction(|conn| sets::create_package_set(conn, name))?;
            let members = load_rpm_files(&db, files)?;
            sync::update_set_and_closure(&db, set, &members)?;
            Ok(())
        }
        Command::UpdateSet { name, files } => {
            let set = lookup_set(&db, name)?;
            let members = load_rpm_files(&db, files)?;
            sync::update_set_and_closure(&db, set, &members)?;
            Ok(())
        }
        Command::UpdateSetFromRepo { name, urls } => {
            lookup_set(&db, name)?;
            sync::download_repo(&db, &downloader, &cli.sync_options()?, urls, true, Some(name))?;
            Ok(())
        }
        Command::LoadRepo { urls } => {
            sync::download_repo(&db, &downloader, &cli.sync_options()?, urls, true, None)?;
            Ok(())
        }
        Command::DownloadRepo { urls } => {
            sync::download_repo(&db, &downloader, &cli.sync_options()?, urls, false, None)?;
            Ok(())
        }
        Command::Download { url } => {
            let data = downloader.download(cli.download_options(), &db, url)?;
            std::io::stdout().write_all(&data)?;
            Ok(())
        }
        Command::ShowRepomd { url } => show_repomd(&cli, &db, &downloader, url),
        Command::ShowPrimary { url } => {
            let (repomd, base_url) =
                acquire_repomd(&downloader, &db, cli.download_options(), url)?;
            let primary =
                fetch_primary(&downloader, &db, cli.download_always_cache(), &repomd, &base_url)?;
            std::io::stdout().write_all(&primary)?;
            Ok(())
        }
        Command::ShowSourcePackages { urls } => {
            let names = source_packages(
                &db,
                &downloader,
                cli.download_options(),
                cli.download_always_cache(),
                urls,
            )?;
            let mut out = std::io::stdout().lock();
            for name in names {
                writeln!(out, "{name}")?;
            }
            Ok(())
        }
        Command::ShowStaleCachedRpms => {
            let cache = FileCache::open(&cli.rpm_cache_dir())?;
            let mut out = std::io::stdout().lock();
            for digest in sync::stale_cached_rpms(&db, &cache)? {
                writeln!(out, "{}", hex::encode(digest))?;
            }
            Ok(())
        }
        Command::ShowSonameConflicts { set } => show_soname_conflicts(&db, set),
        Command::Expire => {
            let cache = FileCache::open(&cli.rpm_cache_dir())?;
            sync::expire(&db, &cache)?;
            Ok(())
        }
        Command::RunSql { files } => run_sql(&db, files),
    }
}

fn lookup_set(db: &DatabaseManager, name: &str) -> Result<PackageSetId> {
    let set = db.with_reader(|conn| sets::lookup_package_set(conn, name))?;
    set.ok_or_else(|| anyhow::Error::from(StorageError::PackageSetMissing { name: name.to_string() }))
}

/// Load each RPM and consolidate to the newest version per name and
/// architecture, mirroring what a repository sync would pick.
fn load_rpm_files(db: &DatabaseManager, files: &[PathBuf]) -> Result<Vec<PackageId>> {
    let mut consolidator = PackageSetConsolidator::new();
    for path in files {
        let (pkg, info) = load_rpm_file(db, path, None, None)
            .with_context(|| format!("failed to load {}", path.display()))?;
        consolidator.add(
            &info.name,
            &info.arch,
            Evr::new(info.epoch, &info.version, &info.release),
            pkg,
        );
    }
    Ok(consolidator.values())
}

fn show_repomd(cli: &Cli, db: &DatabaseManager, downloader: &Downloader, url: &str) -> Result<()> {
    let (repomd, base_url) = acquire_repomd(downloader, db, cli.download_options(), url)?;
    let mut out = std::io::stdout().lock();
    writeln!(out, "revision: {}", repomd.revision)?;
    for entry in &repomd.entries {
        writeln!(
            out,
            "entry: {} {}",
            entry.entry_type,
            url_combine_yum(&base_url, &entry.href)
        )?;
    }
    Ok(())
}

fn show_soname_conflicts(db: &DatabaseManager, set_name: &str) -> Result<()> {
    let set = lookup_set(db, set_name)?;
    let conflicts = db.with_reader(|conn| sets::soname_conflicts(conn, set))?;
    if conflicts.is_empty() {
        println!("no soname conflicts in package set {set_name}");
        return Ok(());
    }
    let mut out = std::io::stdout().lock();
    let mut by_arch: BTreeMap<&str, Vec<_>> = BTreeMap::new();
    for conflict in &conflicts {
        by_arch.entry(&conflict.arch).or_default().push(conflict);
    }
    for (arch, conflicts) in by_arch {
        writeln!(out, "architecture: {arch}")?;
        for conflict in conflicts {
            writeln!(out, "  soname: {}", conflict.soname)?;
            for (file, package) in &conflict.providers {
                writeln!(out, "    {file} ({package})")?;
            }
        }
    }
    Ok(())
}

fn run_sql(db: &DatabaseManager, files: &[PathBuf]) -> Result<()> {
    for path in files {
        let sql = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        tracing::info!(path = %path.display(), "executing SQL");
        db.with_writer(|conn| -> Result<(), StorageError> {
            conn.execute_batch(&sql)
                .map_err(|e| StorageError::SqliteError {
                    message: e.to_string(),
                })
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_parses() {
        let cli = Cli::try_parse_from([
            "symboldb",
            "--db",
            "/tmp/symbols.db",
            "--exclude-name",
            "^kernel",
            "--exclude-name",
            "-debuginfo$",
            "update-set-from-repo",
            "fedora-18",
            "http://mirror.example.com/fedora/18",
        ])
        .unwrap();
        assert_eq!(cli.db, PathBuf::from("/tmp/symbols.db"));
        match &cli.command {
            Command::UpdateSetFromRepo { name, urls } => {
                assert_eq!(name, "fedora-18");
                assert_eq!(urls.len(), 1);
            }
            _ => panic!("wrong command"),
        }
        let exclude = cli.exclude_name().unwrap().unwrap();
        assert!(exclude.is_match("kernel-core"));
        assert!(exclude.is_match("bash-debuginfo"));
        assert!(!exclude.is_match("bash"));
    }

    #[test]
    fn exclude_name_rejects_bad_patterns() {
        let cli = Cli::try_parse_from([
            "symboldb",
            "--exclude-name",
            "(unclosed",
            "create-schema",
        ])
        .unwrap();
        assert!(cli.exclude_name().is_err());
    }

    #[test]
    fn url_commands_require_arguments() {
        assert!(Cli::try_parse_from(["symboldb", "load-rpm"]).is_err());
        assert!(Cli::try_parse_from(["symboldb", "show-source-packages"]).is_err());
        assert!(Cli::try_parse_from(["symboldb", "download"]).is_err());
    }

    #[test]
    fn no_net_selects_cache_only_modes() {
        let cli = Cli::try_parse_from(["symboldb", "--no-net", "create-schema"]).unwrap();
        assert_eq!(cli.download_options().cache_mode, CacheMode::OnlyCache);
        assert_eq!(cli.download_always_cache().cache_mode, CacheMode::OnlyCache);
        let cli = Cli::try_parse_from(["symboldb", "create-schema"]).unwrap();
        assert_eq!(cli.download_options().cache_mode, CacheMode::CheckCache);
        assert_eq!(cli.download_always_cache().cache_mode, CacheMode::AlwaysCache);
    }
}
