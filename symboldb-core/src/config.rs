//! Runtime configuration: cache locations and download behavior.

use std::path::PathBuf;

/// How the download layer may use cached data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    /// Do not consult the cache at all.
    NoCache,
    /// Use the cache if the remote length and modification time still match.
    #[default]
    CheckCache,
    /// Use any cached copy without revalidation. Appropriate when the URL
    /// embeds a content hash.
    AlwaysCache,
    /// Never touch the network.
    OnlyCache,
}

/// Options consumed by the download layer.
#[derive(Debug, Clone, Copy, Default)]
pub struct DownloadOptions {
    pub cache_mode: CacheMode,
}

/// Resolve the cache directory: an explicit override, else
/// `$XDG_CACHE_HOME/symboldb`, else `~/.cache/symboldb`.
pub fn cache_directory(override_path: Option<&str>) -> PathBuf {
    if let Some(path) = override_path {
        return PathBuf::from(path);
    }
    if let Some(xdg) = std::env::var_os("XDG_CACHE_HOME") {
        if !xdg.is_empty() {
            return PathBuf::from(xdg).join("symboldb");
        }
    }
    let home = std::env::var_os("HOME").unwrap_or_else(|| ".".into());
    PathBuf::from(home).join(".cache").join("symboldb")
}

/// Subdirectory of the cache holding downloaded RPM files, keyed by digest.
pub fn rpm_cache_directory(override_path: Option<&str>) -> PathBuf {
    cache_directory(override_path).join("rpms")
}
