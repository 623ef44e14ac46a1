//! Package sets and the soname conflict report.

use std::collections::BTreeMap;

use rusqlite::{params, Connection, OptionalExtension};
use symboldb_core::errors::StorageError;
use symboldb_core::types::{PackageId, PackageSetId};

use crate::sqlite_err;

/// Create a new, empty package set. Fails if the name is taken.
pub fn create_package_set(
    conn: &Connection,
    name: &str,
) -> Result<PackageSetId, StorageError> {
    if lookup_package_set(conn, name)?.is_some() {
        return Err(StorageError::PackageSetExists {
            name: name.to_string(),
        });
    }
    conn.execute(
        "INSERT INTO package_set (name) VALUES (?1)",
        params![name],
    )
    .map_err(sqlite_err)?;
    Ok(PackageSetId::new(conn.last_insert_rowid()))
}

pub fn lookup_package_set(
    conn: &Connection,
    name: &str,
) -> Result<Option<PackageSetId>, StorageError> {
    conn.query_row(
        "SELECT set_id FROM package_set WHERE name = ?1",
        params![name],
        |row| row.get::<_, i64>(0),
    )
    .optional()
    .map_err(sqlite_err)
    .map(|id| id.map(PackageSetId::new))
}

/// Current members of the set.
pub fn package_set_members(
    conn: &Connection,
    set: PackageSetId,
) -> Result<Vec<PackageId>, StorageError> {
    let mut stmt = conn
        .prepare_cached("SELECT package_id FROM package_set_member WHERE set_id = ?1")
        .map_err(sqlite_err)?;
    let rows = stmt
        .query_map(params![set.value()], |row| row.get::<_, i64>(0))
        .map_err(sqlite_err)?;
    let mut result = Vec::new();
    for row in rows {
        result.push(PackageId::new(row.map_err(sqlite_err)?));
    }
    Ok(result)
}

/// Replace the members of the set. Returns true when the membership
/// actually changed.
pub fn replace_package_set(
    conn: &Connection,
    set: PackageSetId,
    members: &[PackageId],
) -> Result<bool, StorageError> {
    let mut current = package_set_members(conn, set)?;
    current.sort();
    let mut wanted: Vec<PackageId> = members.to_vec();
    wanted.sort();
    wanted.dedup();
    if current == wanted {
        return Ok(false);
    }
    conn.execute(
        "DELETE FROM package_set_member WHERE set_id = ?1",
        params![set.value()],
    )
    .map_err(sqlite_err)?;
    let mut stmt = conn
        .prepare_cached("INSERT INTO package_set_member (set_id, package_id) VALUES (?1, ?2)")
        .map_err(sqlite_err)?;
    for member in &wanted {
        stmt.execute(params![set.value(), member.value()])
            .map_err(sqlite_err)?;
    }
    Ok(true)
}

/// One soname provided by several distinct files within a package set.
#[derive(Debug, Clone)]
pub struct SonameConflict {
    pub arch: String,
    pub soname: String,
    /// (file name, package name) of each provider.
    pub providers: Vec<(String, String)>,
}

/// Report sonames with more than one provider among the set's DSOs.
pub fn soname_conflicts(
    conn: &Connection,
    set: PackageSetId,
) -> Result<Vec<SonameConflict>, StorageError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT COALESCE(ef.arch, ''), COALESCE(ef.soname, ''), f.name, p.name
             FROM package_set_member psm
             JOIN package p ON p.package_id = psm.package_id
             JOIN file f ON f.package_id = p.package_id
             JOIN elf_file ef ON ef.contents_id = f.contents_id
             WHERE psm.set_id = ?1 AND ef.e_type = 3
             ORDER BY ef.arch, ef.soname, f.name",
        )
        .map_err(sqlite_err)?;
    let rows = stmt
        .query_map(params![set.value()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })
        .map_err(sqlite_err)?;

    let mut grouped: BTreeMap<(String, String), Vec<(String, String)>> = BTreeMap::new();
    for row in rows {
        let (arch, soname, file_name, package_name) = row.map_err(sqlite_err)?;
        grouped
            .entry((arch, soname))
            .or_default()
            .push((file_name, package_name));
    }
    Ok(grouped
        .into_iter()
        .filter(|(_, providers)| providers.len() > 1)
        .map(|((arch, soname), providers)| SonameConflict {
            arch,
            soname,
            providers,
        })
        .collect())
}
