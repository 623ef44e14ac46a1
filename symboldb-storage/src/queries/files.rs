//! file, file_contents, file_attribute, directory, and symlink tables.

use rusqlite::{params, Connection, OptionalExtension};
use symboldb_core::errors::StorageError;
use symboldb_core::types::{AttributeId, ContentsId, FileId, PackageId};

use crate::sqlite_err;

/// File metadata as recorded in the RPM header.
#[derive(Debug, Clone)]
pub struct NewFile<'a> {
    pub name: &'a str,
    pub user: &'a str,
    pub group: &'a str,
    pub mode: u32,
    pub mtime: i64,
    pub inode: i64,
    pub flags: u32,
    pub normalized: bool,
}

/// Outcome of `add_file`.
#[derive(Debug, Clone, Copy)]
pub struct AddedFile {
    pub file_id: FileId,
    pub contents_id: ContentsId,
    pub attribute_id: AttributeId,
    /// True when the contents row was freshly inserted, i.e. the contents
    /// have not been analyzed yet.
    pub added: bool,
    /// Length of the preview already stored for these contents.
    pub contents_length: i64,
}

/// Intern the file contents row, deduplicated on digest plus inode
/// metadata. Returns (id, freshly-added, stored preview length).
pub fn intern_file_contents(
    conn: &Connection,
    file: &NewFile<'_>,
    digest: &[u8],
    length: i64,
    preview: &[u8],
) -> Result<(ContentsId, bool, i64), StorageError> {
    let existing: Option<(i64, i64)> = conn
        .query_row(
            "SELECT contents_id, length(preview) FROM file_contents
             WHERE digest = ?1 AND mode = ?2 AND user_name = ?3 AND group_name = ?4",
            params![digest, file.mode, file.user, file.group],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()
        .map_err(sqlite_err)?;
    if let Some((id, preview_len)) = existing {
        return Ok((ContentsId::new(id), false, preview_len));
    }
    conn.execute(
        "INSERT INTO file_contents (digest, length, mode, user_name, group_name, preview)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![digest, length, file.mode, file.user, file.group, preview],
    )
    .map_err(sqlite_err)?;
    Ok((
        ContentsId::new(conn.last_insert_rowid()),
        true,
        preview.len() as i64,
    ))
}

/// Intern the attribute tuple for a file.
pub fn intern_file_attribute(
    conn: &Connection,
    file: &NewFile<'_>,
) -> Result<AttributeId, StorageError> {
    let existing: Option<i64> = conn
        .query_row(
            "SELECT attribute_id FROM file_attribute
             WHERE mode = ?1 AND user_name = ?2 AND group_name = ?3 AND flags = ?4",
            params![file.mode, file.user, file.group, file.flags],
            |row| row.get(0),
        )
        .optional()
        .map_err(sqlite_err)?;
    if let Some(id) = existing {
        return Ok(AttributeId::new(id));
    }
    conn.execute(
        "INSERT INTO file_attribute (mode, user_name, group_name, flags)
         VALUES (?1, ?2, ?3, ?4)",
        params![file.mode, file.user, file.group, file.flags],
    )
    .map_err(sqlite_err)?;
    Ok(AttributeId::new(conn.last_insert_rowid()))
}

/// Insert a file row, interning contents and attributes on the way.
pub fn add_file(
    conn: &Connection,
    pkg: PackageId,
    file: &NewFile<'_>,
    digest: &[u8],
    length: i64,
    preview: &[u8],
) -> Result<AddedFile, StorageError> {
    let (contents_id, added, contents_length) =
        intern_file_contents(conn, file, digest, length, preview)?;
    let attribute_id = intern_file_attribute(conn, file)?;
    let file_id = insert_file_row(conn, pkg, file, contents_id, attribute_id)?;
    Ok(AddedFile {
        file_id,
        contents_id,
        attribute_id,
        added,
        contents_length,
    })
}

/// Insert an additional name for already-interned contents (hardlinks).
pub fn add_file_name(
    conn: &Connection,
    pkg: PackageId,
    file: &NewFile<'_>,
    contents_id: ContentsId,
) -> Result<FileId, StorageError> {
    let attribute_id = intern_file_attribute(conn, file)?;
    insert_file_row(conn, pkg, file, contents_id, attribute_id)
}

fn insert_file_row(
    conn: &Connection,
    pkg: PackageId,
    file: &NewFile<'_>,
    contents_id: ContentsId,
    attribute_id: AttributeId,
) -> Result<FileId, StorageError> {
    conn.execute(
        "INSERT INTO file (package_id, contents_id, attribute_id, name, mtime, inode, normalized)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            pkg.value(),
            contents_id.value(),
            attribute_id.value(),
            file.name,
            file.mtime,
            file.inode,
            file.normalized as i64,
        ],
    )
    .map_err(sqlite_err)?;
    Ok(FileId::new(conn.last_insert_rowid()))
}

/// Replace a truncated preview with a longer one. Called when identical
/// contents reappear under a name whose contents must be kept in full.
pub fn update_contents_preview(
    conn: &Connection,
    contents_id: ContentsId,
    preview: &[u8],
) -> Result<(), StorageError> {
    conn.execute(
        "UPDATE file_contents SET preview = ?1 WHERE contents_id = ?2",
        params![preview, contents_id.value()],
    )
    .map_err(sqlite_err)?;
    Ok(())
}

pub fn add_directory(
    conn: &Connection,
    pkg: PackageId,
    file: &NewFile<'_>,
) -> Result<(), StorageError> {
    conn.execute(
        "INSERT INTO directory (package_id, name, mtime, mode, user_name, group_name)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            pkg.value(),
            file.name,
            file.mtime,
            file.mode,
            file.user,
            file.group
        ],
    )
    .map_err(sqlite_err)?;
    Ok(())
}

pub fn add_symlink(
    conn: &Connection,
    pkg: PackageId,
    file: &NewFile<'_>,
    target: &str,
) -> Result<(), StorageError> {
    conn.execute(
        "INSERT INTO symlink (package_id, name, target, mtime, user_name, group_name)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            pkg.value(),
            file.name,
            target,
            file.mtime,
            file.user,
            file.group
        ],
    )
    .map_err(sqlite_err)?;
    Ok(())
}

/// A file location: the outer digest of an RPM carrying it, plus the path
/// inside the package. The digest locates the RPM in the file cache.
#[derive(Debug, Clone)]
pub struct FileLocation {
    pub rpm_digest: Vec<u8>,
    pub file_name: String,
}

/// Find every packaged file whose contents match the digest.
pub fn files_with_digest(
    conn: &Connection,
    digest: &[u8],
) -> Result<Vec<FileLocation>, StorageError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT pd.digest, f.name
             FROM file_contents fc
             JOIN file f ON f.contents_id = fc.contents_id
             JOIN package_digest pd ON pd.package_id = f.package_id
             WHERE fc.digest = ?1
             ORDER BY f.name",
        )
        .map_err(sqlite_err)?;
    let rows = stmt
        .query_map(params![digest], |row| {
            Ok(FileLocation {
                rpm_digest: row.get(0)?,
                file_name: row.get(1)?,
            })
        })
        .map_err(sqlite_err)?;
    let mut result = Vec::new();
    for row in rows {
        result.push(row.map_err(sqlite_err)?);
    }
    Ok(result)
}
