//! Cached download data, revalidated by length and modification time.

use rusqlite::{params, Connection, OptionalExtension};
use symboldb_core::errors::StorageError;

use crate::sqlite_err;

/// Fetch the cached data if it matches the expected length and a non-zero
/// modification time.
pub fn fetch_validated(
    conn: &Connection,
    url: &str,
    expected_length: u64,
    expected_time: i64,
) -> Result<Option<Vec<u8>>, StorageError> {
    if expected_time == 0 {
        return Ok(None);
    }
    conn.query_row(
        "SELECT data FROM url_cache
         WHERE url = ?1 AND http_time = ?2 AND length(data) = ?3",
        params![url, expected_time, expected_length as i64],
        |row| row.get(0),
    )
    .optional()
    .map_err(sqlite_err)
}

/// Fetch the cached data regardless of age.
pub fn fetch(conn: &Connection, url: &str) -> Result<Option<Vec<u8>>, StorageError> {
    conn.query_row(
        "SELECT data FROM url_cache WHERE url = ?1",
        params![url],
        |row| row.get(0),
    )
    .optional()
    .map_err(sqlite_err)
}

/// Store or refresh the cached data for a URL.
pub fn update(
    conn: &Connection,
    url: &str,
    data: &[u8],
    http_time: i64,
) -> Result<(), StorageError> {
    conn.execute(
        "INSERT INTO url_cache (url, http_time, data, last_change)
         VALUES (?1, ?2, ?3, unixepoch())
         ON CONFLICT(url) DO UPDATE
             SET http_time = excluded.http_time,
                 data = excluded.data,
                 last_change = excluded.last_change",
        params![url, http_time, data],
    )
    .map_err(sqlite_err)?;
    Ok(())
}

/// Drop entries that have not been refreshed within `max_age_secs`.
pub fn expire(conn: &Connection, max_age_secs: i64) -> Result<usize, StorageError> {
    conn.execute(
        "DELETE FROM url_cache WHERE last_change < unixepoch() - ?1",
        params![max_age_secs],
    )
    .map_err(sqlite_err)
}
