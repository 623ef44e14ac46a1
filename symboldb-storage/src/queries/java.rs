//! Java class, Maven URL, and XML error tables.

use rusqlite::{params, Connection, OptionalExtension};
use symboldb_core::errors::StorageError;
use symboldb_core::types::ContentsId;

use crate::sqlite_err;

/// A parsed class descriptor ready for interning.
#[derive(Debug, Clone)]
pub struct NewJavaClass<'a> {
    pub access_flags: u16,
    pub name: &'a str,
    pub super_class: Option<&'a str>,
    pub interfaces: &'a [String],
    pub class_references: &'a [String],
}

/// Intern the class descriptor and associate it with the file contents.
/// Identical classes appearing in several jars share one descriptor row.
pub fn add_java_class(
    conn: &Connection,
    contents: ContentsId,
    class: &NewJavaClass<'_>,
) -> Result<i64, StorageError> {
    let existing: Option<i64> = conn
        .query_row(
            "SELECT class_id FROM java_class
             WHERE name = ?1 AND super_class IS ?2 AND access_flags = ?3",
            params![class.name, class.super_class, class.access_flags],
            |row| row.get(0),
        )
        .optional()
        .map_err(sqlite_err)?;
    let class_id = match existing {
        Some(id) => id,
        None => {
            conn.execute(
                "INSERT INTO java_class (access_flags, name, super_class)
                 VALUES (?1, ?2, ?3)",
                params![class.access_flags, class.name, class.super_class],
            )
            .map_err(sqlite_err)?;
            let class_id = conn.last_insert_rowid();
            for interface in class.interfaces {
                conn.execute(
                    "INSERT OR IGNORE INTO java_interface (class_id, name) VALUES (?1, ?2)",
                    params![class_id, interface],
                )
                .map_err(sqlite_err)?;
            }
            for reference in class.class_references {
                conn.execute(
                    "INSERT OR IGNORE INTO java_class_reference (class_id, name)
                     VALUES (?1, ?2)",
                    params![class_id, reference],
                )
                .map_err(sqlite_err)?;
            }
            class_id
        }
    };
    conn.execute(
        "INSERT OR IGNORE INTO java_class_contents (class_id, contents_id)
         VALUES (?1, ?2)",
        params![class_id, contents.value()],
    )
    .map_err(sqlite_err)?;
    Ok(class_id)
}

/// Record a class or jar parse problem. `path` is the entry name inside
/// the archive, empty for a bare class file.
pub fn add_java_error(
    conn: &Connection,
    contents: ContentsId,
    message: &str,
    path: &str,
) -> Result<(), StorageError> {
    conn.execute(
        "INSERT INTO java_error (contents_id, message, path) VALUES (?1, ?2, ?3)",
        params![contents.value(), message, path],
    )
    .map_err(sqlite_err)?;
    Ok(())
}

pub fn add_maven_url(
    conn: &Connection,
    contents: ContentsId,
    url: &str,
    kind: &str,
) -> Result<(), StorageError> {
    conn.execute(
        "INSERT OR IGNORE INTO maven_url (contents_id, url, kind) VALUES (?1, ?2, ?3)",
        params![contents.value(), url, kind],
    )
    .map_err(sqlite_err)?;
    Ok(())
}

pub fn add_xml_error(
    conn: &Connection,
    contents: ContentsId,
    message: &str,
    line: i64,
) -> Result<(), StorageError> {
    conn.execute(
        "INSERT INTO xml_error (contents_id, message, line) VALUES (?1, ?2, ?3)",
        params![contents.value(), message, line],
    )
    .map_err(sqlite_err)?;
    Ok(())
}
