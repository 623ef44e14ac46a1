//! Garbage collection of unreferenced data.
//!
//! Deletion order matters: packages first (cascading their files), then
//! orphaned contents, then class descriptors with no surviving contents.

use rusqlite::Connection;
use symboldb_core::errors::StorageError;

use crate::sqlite_err;

/// Delete packages that are not a member of any package set.
pub fn expire_packages(conn: &Connection) -> Result<usize, StorageError> {
    conn.execute(
        "DELETE FROM package
         WHERE package_id NOT IN (SELECT package_id FROM package_set_member)",
        [],
    )
    .map_err(sqlite_err)
}

/// Delete contents rows no file refers to.
pub fn expire_file_contents(conn: &Connection) -> Result<usize, StorageError> {
    conn.execute(
        "DELETE FROM file_contents
         WHERE contents_id NOT IN (SELECT contents_id FROM file)",
        [],
    )
    .map_err(sqlite_err)
}

/// Delete class descriptors whose contents have all been expired.
pub fn expire_java_classes(conn: &Connection) -> Result<usize, StorageError> {
    conn.execute(
        "DELETE FROM java_class
         WHERE class_id NOT IN (SELECT class_id FROM java_class_contents)",
        [],
    )
    .map_err(sqlite_err)
}

/// Outer digests of every package referenced by a package set. Used to
/// find stale entries in the on-disk RPM cache.
pub fn referenced_package_digests(conn: &Connection) -> Result<Vec<Vec<u8>>, StorageError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT DISTINCT pd.digest
             FROM package_digest pd
             JOIN package_set_member psm ON psm.package_id = pd.package_id",
        )
        .map_err(sqlite_err)?;
    let rows = stmt
        .query_map([], |row| row.get::<_, Vec<u8>>(0))
        .map_err(sqlite_err)?;
    let mut result = Vec::new();
    for row in rows {
        result.push(row.map_err(sqlite_err)?);
    }
    result.sort();
    Ok(result)
}
