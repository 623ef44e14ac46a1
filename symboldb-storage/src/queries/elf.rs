//! ELF table family.

use rusqlite::{params, Connection};
use symboldb_core::errors::StorageError;
use symboldb_core::types::ContentsId;

use crate::sqlite_err;

/// Header facts stored in `elf_file`.
#[derive(Debug, Clone)]
pub struct NewElfImage<'a> {
    pub ei_class: u8,
    pub ei_data: u8,
    pub e_type: u16,
    pub e_machine: u16,
    pub arch: Option<&'a str>,
    pub soname: Option<&'a str>,
    pub build_id: Option<&'a [u8]>,
}

/// One program header row.
#[derive(Debug, Clone)]
pub struct NewProgramHeader {
    pub p_type: u32,
    pub file_offset: i64,
    pub virt_addr: i64,
    pub phys_addr: i64,
    pub file_size: i64,
    pub memory_size: i64,
    pub align: i64,
    pub readable: bool,
    pub writable: bool,
    pub executable: bool,
}

/// A defined dynamic symbol row.
#[derive(Debug, Clone)]
pub struct NewElfDefinition<'a> {
    pub name: &'a str,
    pub version: Option<&'a str>,
    pub primary_version: bool,
    pub value: i64,
    pub section: i64,
    pub binding: u8,
    pub sym_type: u8,
    pub visibility: &'a str,
}

/// A referenced dynamic symbol row.
#[derive(Debug, Clone)]
pub struct NewElfReference<'a> {
    pub name: &'a str,
    pub version: Option<&'a str>,
    pub binding: u8,
    pub sym_type: u8,
    pub visibility: &'a str,
}

pub fn add_elf_image(
    conn: &Connection,
    contents: ContentsId,
    image: &NewElfImage<'_>,
) -> Result<(), StorageError> {
    conn.execute(
        "INSERT OR REPLACE INTO elf_file
             (contents_id, ei_class, ei_data, e_type, e_machine, arch, soname, build_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            contents.value(),
            image.ei_class,
            image.ei_data,
            image.e_type,
            image.e_machine,
            image.arch,
            image.soname,
            image.build_id,
        ],
    )
    .map_err(sqlite_err)?;
    Ok(())
}

pub fn add_program_header(
    conn: &Connection,
    contents: ContentsId,
    header: &NewProgramHeader,
) -> Result<(), StorageError> {
    conn.execute(
        "INSERT INTO elf_program_header
             (contents_id, type, file_offset, virt_addr, phys_addr, file_size,
              memory_size, align, readable, writable, executable)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            contents.value(),
            header.p_type,
            header.file_offset,
            header.virt_addr,
            header.phys_addr,
            header.file_size,
            header.memory_size,
            header.align,
            header.readable as i64,
            header.writable as i64,
            header.executable as i64,
        ],
    )
    .map_err(sqlite_err)?;
    Ok(())
}

pub fn add_definition(
    conn: &Connection,
    contents: ContentsId,
    def: &NewElfDefinition<'_>,
) -> Result<(), StorageError> {
    conn.execute(
        "INSERT INTO elf_definition
             (contents_id, name, version, primary_version, symbol_value, section,
              binding, sym_type, visibility)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            contents.value(),
            def.name,
            def.version,
            def.primary_version as i64,
            def.value,
            def.section,
            def.binding,
            def.sym_type,
            def.visibility,
        ],
    )
    .map_err(sqlite_err)?;
    Ok(())
}

pub fn add_reference(
    conn: &Connection,
    contents: ContentsId,
    reference: &NewElfReference<'_>,
) -> Result<(), StorageError> {
    conn.execute(
        "INSERT INTO elf_reference
             (contents_id, name, version, binding, sym_type, visibility)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            contents.value(),
            reference.name,
            reference.version,
            reference.binding,
            reference.sym_type,
            reference.visibility,
        ],
    )
    .map_err(sqlite_err)?;
    Ok(())
}

pub fn add_needed(
    conn: &Connection,
    contents: ContentsId,
    name: &str,
) -> Result<(), StorageError> {
    conn.execute(
        "INSERT OR IGNORE INTO elf_needed (contents_id, name) VALUES (?1, ?2)",
        params![contents.value(), name],
    )
    .map_err(sqlite_err)?;
    Ok(())
}

pub fn add_rpath(conn: &Connection, contents: ContentsId, path: &str) -> Result<(), StorageError> {
    conn.execute(
        "INSERT INTO elf_rpath (contents_id, path) VALUES (?1, ?2)",
        params![contents.value(), path],
    )
    .map_err(sqlite_err)?;
    Ok(())
}

pub fn add_runpath(
    conn: &Connection,
    contents: ContentsId,
    path: &str,
) -> Result<(), StorageError> {
    conn.execute(
        "INSERT INTO elf_runpath (contents_id, path) VALUES (?1, ?2)",
        params![contents.value(), path],
    )
    .map_err(sqlite_err)?;
    Ok(())
}

pub fn add_dynamic(
    conn: &Connection,
    contents: ContentsId,
    tag: u64,
    value: u64,
) -> Result<(), StorageError> {
    conn.execute(
        "INSERT INTO elf_dynamic (contents_id, tag, value) VALUES (?1, ?2, ?3)",
        params![contents.value(), tag as i64, value as i64],
    )
    .map_err(sqlite_err)?;
    Ok(())
}

/// Record an ELF parse problem without failing the package load.
pub fn add_elf_error(
    conn: &Connection,
    contents: ContentsId,
    message: &str,
) -> Result<(), StorageError> {
    conn.execute(
        "INSERT INTO elf_error (contents_id, message) VALUES (?1, ?2)",
        params![contents.value(), message],
    )
    .map_err(sqlite_err)?;
    Ok(())
}
