//! HTTP download layer with url_cache revalidation.
//!
//! A HEAD request establishes length and modification time; when both
//! match the cached copy, the body is served from the database without
//! touching the network again.

use std::time::Duration;

use symboldb_core::config::{CacheMode, DownloadOptions};
use symboldb_core::errors::DownloadError;
use symboldb_storage::queries::url_cache;
use symboldb_storage::DatabaseManager;

pub struct Downloader {
    client: reqwest::blocking::Client,
}

struct Response {
    data: Vec<u8>,
    http_time: i64,
}

impl Default for Downloader {
    fn default() -> Self {
        Self::new()
    }
}

impl Downloader {
    pub fn new() -> Self {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("symboldb/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(300))
            .build()
            .expect("client configuration is static");
        Downloader { client }
    }

    /// Fetch a URL according to the cache mode.
    pub fn download(
        &self,
        options: DownloadOptions,
        db: &DatabaseManager,
        url: &str,
    ) -> Result<Vec<u8>, DownloadError> {
        match options.cache_mode {
            CacheMode::OnlyCache => {
                let cached = db.with_reader(|conn| url_cache::fetch(conn, url))?;
                cached.ok_or_else(|| DownloadError::NotCached {
                    url: url.to_string(),
                })
            }
            CacheMode::AlwaysCache => {
                if let Some(data) = db.with_reader(|conn| url_cache::fetch(conn, url))? {
                    tracing::debug!(url, "serving from url cache");
                    return Ok(data);
                }
                self.fetch_and_store(db, url)
            }
            CacheMode::CheckCache => {
                if let Ok((Some(length), time)) = self.head(url) {
                    let cached = db
                        .with_reader(|conn| url_cache::fetch_validated(conn, url, length, time))?;
                    if let Some(data) = cached {
                        tracing::debug!(url, "url cache still current");
                        return Ok(data);
                    }
                }
                self.fetch_and_store(db, url)
            }
            CacheMode::NoCache => Ok(self.get(url)?.data),
        }
    }

    fn fetch_and_store(
        &self,
        db: &DatabaseManager,
        url: &str,
    ) -> Result<Vec<u8>, DownloadError> {
        let response = self.get(url)?;
        db.with_writer(|conn| url_cache::update(conn, url, &response.data, response.http_time))?;
        Ok(response.data)
    }

    fn head(&self, url: &str) -> Result<(Option<u64>, i64), DownloadError> {
        let response = self
            .client
            .head(url)
            .send()
            .map_err(|e| DownloadError::Http {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        if !response.status().is_success() {
            return Err(DownloadError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok((response.content_length(), last_modified(&response)))
    }

    fn get(&self, url: &str) -> Result<Response, DownloadError> {
        tracing::info!(url, "downloading");
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| DownloadError::Http {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        if !response.status().is_success() {
            return Err(DownloadError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        let http_time = last_modified(&response);
        let data = response
            .bytes()
            .map_err(|e| DownloadError::Http {
                url: url.to_string(),
                message: e.to_string(),
            })?
            .to_vec();
        Ok(Response { data, http_time })
    }
}

/// Last-Modified header as a unix timestamp; 0 when absent or unparsable.
fn last_modified(response: &reqwest::blocking::Response) -> i64 {
    response
        .headers()
        .get(reqwest::header::LAST_MODIFIED)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| chrono::DateTime::parse_from_rfc2822(value).ok())
        .map(|time| time.timestamp())
        .unwrap_or(0)
}
