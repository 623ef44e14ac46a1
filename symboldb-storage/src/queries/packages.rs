//! package table family: interning, digests, dependencies, scripts.

use rusqlite::{params, Connection, OptionalExtension};
use symboldb_core::errors::StorageError;
use symboldb_core::types::PackageId;

use crate::sqlite_err;

/// Package fields as stored in the `package` table.
#[derive(Debug, Clone)]
pub struct NewPackage<'a> {
    pub name: &'a str,
    pub epoch: Option<u32>,
    pub version: &'a str,
    pub release: &'a str,
    pub arch: &'a str,
    /// "binary" or "source".
    pub kind: &'a str,
    pub source_rpm: Option<&'a str>,
    /// Header SHA-1, 40 hex characters. The deduplication key.
    pub hash: &'a str,
    pub build_host: &'a str,
    pub build_time: i64,
    pub summary: &'a str,
    pub description: &'a str,
    pub license: &'a str,
    pub group: &'a str,
    pub normalized: bool,
}

/// Insert the package unless a row with the same header hash exists.
/// Returns the id and whether the row was freshly added.
pub fn intern_package(
    conn: &Connection,
    pkg: &NewPackage<'_>,
) -> Result<(PackageId, bool), StorageError> {
    let existing: Option<i64> = conn
        .query_row(
            "SELECT package_id FROM package WHERE hash = ?1",
            params![pkg.hash],
            |row| row.get(0),
        )
        .optional()
        .map_err(sqlite_err)?;
    if let Some(id) = existing {
        return Ok((PackageId::new(id), false));
    }
    conn.execute(
        "INSERT INTO package (name, epoch, version, release, arch, kind, source_rpm,
                              hash, build_host, build_time, summary, description,
                              license, rpm_group, normalized)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            pkg.name,
            pkg.epoch,
            pkg.version,
            pkg.release,
            pkg.arch,
            pkg.kind,
            pkg.source_rpm,
            pkg.hash,
            pkg.build_host,
            pkg.build_time,
            pkg.summary,
            pkg.description,
            pkg.license,
            pkg.group,
            pkg.normalized as i64,
        ],
    )
    .map_err(sqlite_err)?;
    Ok((PackageId::new(conn.last_insert_rowid()), true))
}

/// Record an outer digest of an RPM representation of the package.
pub fn add_package_digest(
    conn: &Connection,
    pkg: PackageId,
    digest: &[u8],
    length: u64,
) -> Result<(), StorageError> {
    conn.execute(
        "INSERT OR IGNORE INTO package_digest (digest, package_id, length)
         VALUES (?1, ?2, ?3)",
        params![digest, pkg.value(), length as i64],
    )
    .map_err(sqlite_err)?;
    Ok(())
}

/// Record a location the package can be downloaded from.
pub fn add_package_url(conn: &Connection, pkg: PackageId, url: &str) -> Result<(), StorageError> {
    conn.execute(
        "INSERT OR IGNORE INTO package_url (package_id, url) VALUES (?1, ?2)",
        params![pkg.value(), url],
    )
    .map_err(sqlite_err)?;
    Ok(())
}

/// Look up a package by an outer SHA-1 or SHA-256 digest.
pub fn package_by_digest(
    conn: &Connection,
    digest: &[u8],
) -> Result<Option<PackageId>, StorageError> {
    conn.query_row(
        "SELECT package_id FROM package_digest WHERE digest = ?1",
        params![digest],
        |row| row.get::<_, i64>(0),
    )
    .optional()
    .map_err(sqlite_err)
    .map(|id| id.map(PackageId::new))
}

pub fn add_dependency(
    conn: &Connection,
    pkg: PackageId,
    kind: &str,
    name: &str,
    flags: u32,
    version: &str,
) -> Result<(), StorageError> {
    conn.execute(
        "INSERT INTO package_dependency (package_id, kind, name, flags, version)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![pkg.value(), kind, name, flags, version],
    )
    .map_err(sqlite_err)?;
    Ok(())
}

pub fn add_script(
    conn: &Connection,
    pkg: PackageId,
    kind: &str,
    script: Option<&str>,
    program: Option<&str>,
) -> Result<(), StorageError> {
    conn.execute(
        "INSERT INTO package_script (package_id, kind, script, program)
         VALUES (?1, ?2, ?3, ?4)",
        params![pkg.value(), kind, script, program],
    )
    .map_err(sqlite_err)?;
    Ok(())
}

/// Record a trigger script. `idx` is the ordinal of the trigger within the
/// package.
pub fn add_trigger(
    conn: &Connection,
    pkg: PackageId,
    idx: i64,
    script: &str,
    program: &str,
) -> Result<(), StorageError> {
    conn.execute(
        "INSERT INTO package_trigger (package_id, idx, script, program)
         VALUES (?1, ?2, ?3, ?4)",
        params![pkg.value(), idx, script, program],
    )
    .map_err(sqlite_err)?;
    Ok(())
}

pub fn add_trigger_condition(
    conn: &Connection,
    pkg: PackageId,
    idx: i64,
    name: &str,
    version: &str,
    flags: u32,
) -> Result<(), StorageError> {
    conn.execute(
        "INSERT INTO package_trigger_condition (package_id, idx, name, version, flags)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![pkg.value(), idx, name, version, flags],
    )
    .map_err(sqlite_err)?;
    Ok(())
}
