//! The RPM load pipeline: parse a package, intern it, and index every
//! recognized file format found in the payload.

use std::path::Path;

use rusqlite::Connection;
use symboldb_core::checksum::{hash_bytes, Checksum, HashKind, HashSink};
use symboldb_core::errors::{LoadError, RpmError};
use symboldb_core::types::{ContentsId, PackageId};
use symboldb_formats::detect;
use symboldb_formats::elf::{visibility_name, DynamicEntry, ElfImage, ElfSymbol};
use symboldb_formats::java::{maven, ClassFile};
use symboldb_formats::rpm::{FileEntry, FileInfo, PackageInfo, PackageKind, RpmParser};
use symboldb_formats::zip;
use symboldb_storage::queries::{elf as elf_q, files, java as java_q, packages};
use symboldb_storage::DatabaseManager;

const FILE_CONTENTS_PREVIEW_SIZE: usize = 64;

/// Load an RPM file into the database. Loading an already-present package
/// only refreshes its digests and URL.
pub fn load_rpm_file(
    db: &DatabaseManager,
    path: &Path,
    expected: Option<&Checksum>,
    url: Option<&str>,
) -> Result<(PackageId, PackageInfo), LoadError> {
    let data = std::fs::read(path).map_err(|source| RpmError::Io {
        path: path.display().to_string(),
        source,
    })?;
    load_rpm_bytes(db, &data, &path.display().to_string(), expected, url)
}

/// Load an in-memory RPM image into the database.
pub fn load_rpm_bytes(
    db: &DatabaseManager,
    data: &[u8],
    origin: &str,
    expected: Option<&Checksum>,
    url: Option<&str>,
) -> Result<(PackageId, PackageInfo), LoadError> {
    let mut parser = RpmParser::from_bytes(data, origin)?;
    let info = parser.package().clone();

    // Outer digests of the representation being loaded.
    let mut sha256 = HashSink::new(HashKind::Sha256);
    let mut sha1 = HashSink::new(HashKind::Sha1);
    sha256.write(data);
    sha1.write(data);
    let sha256 = sha256.finish();
    let sha1 = sha1.finish();
    if let Some(expected) = expected {
        let actual = match expected.kind {
            HashKind::Sha256 => &sha256,
            HashKind::Sha1 => &sha1,
        };
        if actual.value != expected.value {
            return Err(LoadError::PackageDigestMismatch {
                path: origin.to_string(),
                actual: actual.to_hex(),
                expected: expected.to_hex(),
            });
        }
    }

    // One transaction per RPM: unreferenced packages are invisible to
    // analyzers, so partial loads never leak.
    let pkg = db.with_transaction(|conn| -> Result<PackageId, LoadError> {
        let (pkg, added) = packages::intern_package(
            conn,
            &packages::NewPackage {
                name: &info.name,
                epoch: info.epoch,
                version: &info.version,
                release: &info.release,
                arch: &info.arch,
                kind: info.kind.as_str(),
                source_rpm: info.source_rpm.as_deref(),
                hash: &info.hash,
                build_host: &info.build_host,
                build_time: info.build_time,
                summary: &info.summary,
                description: &info.description,
                license: &info.license,
                group: &info.group,
                normalized: info.normalized,
            },
        )?;

        if added {
            tracing::info!(nevra = %info.nevra(), origin, "loading package");
            load_header_tables(conn, pkg, &parser)?;
            let unpack = info.kind == PackageKind::Binary;
            while let Some(entry) = parser.read_file()? {
                add_entry(conn, pkg, origin, &entry, unpack)?;
            }
        } else {
            tracing::info!(nevra = %info.nevra(), origin, "skipping already-loaded package");
        }

        packages::add_package_digest(conn, pkg, &sha256.value, data.len() as u64)?;
        packages::add_package_digest(conn, pkg, &sha1.value, data.len() as u64)?;
        if let Some(url) = url {
            packages::add_package_url(conn, pkg, url)?;
        }
        Ok(pkg)
    })?;

    Ok((pkg, info))
}

fn load_header_tables(
    conn: &Connection,
    pkg: PackageId,
    parser: &RpmParser,
) -> Result<(), LoadError> {
    for dep in parser.dependencies() {
        packages::add_dependency(
            conn,
            pkg,
            dep.kind.as_str(),
            &dep.name,
            dep.flags,
            &dep.version,
        )?;
    }
    for script in parser.scripts() {
        packages::add_script(
            conn,
            pkg,
            script.kind.as_str(),
            script.script.as_deref(),
            script.program.as_deref(),
        )?;
    }
    for (idx, trigger) in parser.triggers().iter().enumerate() {
        packages::add_trigger(conn, pkg, idx as i64, &trigger.script, &trigger.program)?;
        for condition in &trigger.conditions {
            packages::add_trigger_condition(
                conn,
                pkg,
                idx as i64,
                &condition.name,
                &condition.version,
                condition.flags,
            )?;
        }
    }
    Ok(())
}

/// Full contents are preserved for configuration and service registration
/// files; everything else keeps a short preview.
fn keep_full_contents(path: &str) -> bool {
    path.starts_with("/etc/")
        || path.starts_with("/usr/lib/binfmt.d/")
        || path.starts_with("/usr/lib/sysctl.d/")
        || path.starts_with("/usr/lib/tmpfiles.d/")
        || path.starts_with("/usr/lib/udev/rules.d/")
        || path.starts_with("/usr/share/dbus-1/services/")
        || path.starts_with("/usr/share/dbus-1/system-services/")
        || path.starts_with("/usr/share/polkit-1/actions/")
        || path.starts_with("/usr/share/polkit-1/rules.d/")
        || path.ends_with(".conf")
        || path.ends_with(".desktop")
        || path.ends_with(".pkla")
        || path.ends_with(".policy")
        || path.ends_with(".protocol")
        || path.ends_with(".service")
        || path.ends_with(".spec")
}

fn preview_of(entry: &FileEntry) -> Vec<u8> {
    if entry.infos.iter().any(|info| keep_full_contents(&info.name)) {
        entry.contents.clone()
    } else {
        let len = entry.contents.len().min(FILE_CONTENTS_PREVIEW_SIZE);
        entry.contents[..len].to_vec()
    }
}

fn new_file(info: &FileInfo) -> files::NewFile<'_> {
    files::NewFile {
        name: &info.name,
        user: &info.user,
        group: &info.group,
        mode: info.mode,
        mtime: info.mtime as i64,
        inode: info.ino as i64,
        flags: info.flags,
        normalized: info.normalized,
    }
}

fn add_entry(
    conn: &Connection,
    pkg: PackageId,
    rpm_path: &str,
    entry: &FileEntry,
    unpack: bool,
) -> Result<(), LoadError> {
    let info = &entry.infos[0];
    if entry.infos.len() == 1 {
        if info.is_directory() {
            files::add_directory(conn, pkg, &new_file(info))?;
            return Ok(());
        }
        if info.is_symlink() {
            let target = if info.link_to.is_empty() {
                String::from_utf8_lossy(&entry.contents).into_owned()
            } else {
                info.link_to.clone()
            };
            files::add_symlink(conn, pkg, &new_file(info), &target)?;
            return Ok(());
        }
    }

    // Verify the payload data against the header digest before storing.
    let digest = hash_bytes(HashKind::Sha256, &entry.contents);
    if let Some(expected) = &info.digest {
        let actual = match expected.kind {
            HashKind::Sha256 => digest.clone(),
            other => hash_bytes(other, &entry.contents),
        };
        if actual != expected.value {
            return Err(RpmError::DigestMismatch {
                path: rpm_path.to_string(),
                file: info.name.clone(),
                actual: hex::encode(actual),
                expected: expected.to_hex(),
            }
            .into());
        }
    }

    let preview = preview_of(entry);
    let added = files::add_file(
        conn,
        pkg,
        &new_file(info),
        &digest,
        entry.contents.len() as i64,
        &preview,
    )?;
    for extra in &entry.infos[1..] {
        files::add_file_name(conn, pkg, &new_file(extra), added.contents_id)?;
    }

    if added.added && unpack {
        load_formats(conn, added.contents_id, info, &entry.contents)?;
    }
    // If the stored preview is shorter than this one, upgrade it.
    if added.contents_length < preview.len() as i64 {
        files::update_contents_preview(conn, added.contents_id, &preview)?;
    }
    Ok(())
}

/// Route the contents to the format loaders: ELF, then XML, then Python,
/// then bare class files. The ZIP scan runs independently of the other
/// classifications, as jars can also match earlier checks.
fn load_formats(
    conn: &Connection,
    contents: ContentsId,
    info: &FileInfo,
    data: &[u8],
) -> Result<(), LoadError> {
    if detect::is_elf(data) {
        load_elf(conn, contents, data)?;
    } else if detect::looks_like_xml(data) {
        load_xml(conn, contents, data)?;
    } else if detect::is_python(data) || detect::is_python_path(&info.name) {
        // Python import analysis is outside this indexer's scope.
        tracing::debug!(path = %info.name, "skipping python source");
    } else if ClassFile::has_signature(data) {
        load_class(conn, contents, data, "")?;
    }
    if zip::has_signature(data) {
        load_jar(conn, contents, data)?;
    }
    Ok(())
}

fn load_class(
    conn: &Connection,
    contents: ContentsId,
    data: &[u8],
    path: &str,
) -> Result<(), LoadError> {
    let descriptor = ClassFile::parse(data).and_then(|class| {
        Ok((
            class.access_flags(),
            class.this_class()?,
            class.super_class()?,
            class.interfaces()?,
            class.class_references()?,
        ))
    });
    match descriptor {
        Ok((access_flags, name, super_class, interfaces, references)) => {
            java_q::add_java_class(
                conn,
                contents,
                &java_q::NewJavaClass {
                    access_flags,
                    name: &name,
                    super_class: super_class.as_deref(),
                    interfaces: &interfaces,
                    class_references: &references,
                },
            )?;
        }
        Err(e) => java_q::add_java_error(conn, contents, &e.to_string(), path)?,
    }
    Ok(())
}

fn load_jar(conn: &Connection, contents: ContentsId, data: &[u8]) -> Result<(), LoadError> {
    let archive = match zip::ZipArchive::parse(data) {
        Ok(archive) => archive,
        Err(e) => {
            // Corrupted archives are recorded, not fatal.
            java_q::add_java_error(conn, contents, &e.to_string(), "")?;
            return Ok(());
        }
    };
    for entry in archive.entries().to_vec() {
        let entry_data = match archive.read(&entry) {
            Ok(entry_data) => entry_data,
            Err(e) => {
                java_q::add_java_error(conn, contents, &e.to_string(), &entry.name)?;
                continue;
            }
        };
        if ClassFile::has_signature(&entry_data) {
            load_class(conn, contents, &entry_data, &entry.name)?;
        }
    }
    Ok(())
}

fn load_xml(conn: &Connection, contents: ContentsId, data: &[u8]) -> Result<(), LoadError> {
    let (urls, problem) = maven::extract(data);
    if let Some(problem) = problem {
        java_q::add_xml_error(conn, contents, &problem.message, problem.position as i64)?;
    }
    for url in urls {
        java_q::add_maven_url(conn, contents, &url.url, url.kind.as_str())?;
    }
    Ok(())
}

fn load_elf(conn: &Connection, contents: ContentsId, data: &[u8]) -> Result<(), LoadError> {
    let image = match ElfImage::parse(data) {
        Ok(image) => image,
        Err(e) => {
            elf_q::add_elf_error(conn, contents, &e.to_string())?;
            return Ok(());
        }
    };
    match load_elf_tables(conn, contents, &image) {
        Ok(soname) => {
            let build_id = match image.build_id() {
                Ok(build_id) => build_id,
                Err(_) => None,
            };
            elf_q::add_elf_image(
                conn,
                contents,
                &elf_q::NewElfImage {
                    ei_class: image.ei_class(),
                    ei_data: image.ei_data(),
                    e_type: image.e_type(),
                    e_machine: image.e_machine(),
                    arch: image.arch(),
                    soname: soname.as_deref(),
                    build_id: build_id.as_deref(),
                },
            )?;
            Ok(())
        }
        // A malformed table is recorded; a storage failure propagates.
        Err(LoadError::Elf(e)) => {
            elf_q::add_elf_error(conn, contents, &e.to_string())?;
            Ok(())
        }
        Err(other) => Err(other),
    }
}

/// Load symbols, dynamic entries, and program headers. Returns the soname.
fn load_elf_tables(
    conn: &Connection,
    contents: ContentsId,
    image: &ElfImage<'_>,
) -> Result<Option<String>, LoadError> {
    for symbol in image.dynamic_symbols()? {
        match symbol {
            ElfSymbol::Definition(def) => {
                if def.symbol_name.is_empty() {
                    continue;
                }
                elf_q::add_definition(
                    conn,
                    contents,
                    &elf_q::NewElfDefinition {
                        name: &def.symbol_name,
                        version: def.vda_name.as_deref(),
                        primary_version: def.default_version,
                        value: def.value as i64,
                        section: def.section as i64,
                        binding: def.binding,
                        sym_type: def.sym_type,
                        visibility: visibility_name(def.visibility),
                    },
                )?;
            }
            ElfSymbol::Reference(reference) => {
                if reference.symbol_name.is_empty() {
                    continue;
                }
                elf_q::add_reference(
                    conn,
                    contents,
                    &elf_q::NewElfReference {
                        name: &reference.symbol_name,
                        version: reference.vna_name.as_deref(),
                        binding: reference.binding,
                        sym_type: reference.sym_type,
                        visibility: visibility_name(reference.visibility),
                    },
                )?;
            }
        }
    }

    let mut soname: Option<String> = None;
    for entry in image.dynamic_entries()? {
        match entry {
            DynamicEntry::Needed(name) => elf_q::add_needed(conn, contents, &name)?,
            DynamicEntry::Soname(name) => match &soname {
                // The dynamic linker honors the first soname only.
                Some(existing) if *existing != name => {
                    elf_q::add_elf_error(
                        conn,
                        contents,
                        &format!("duplicate soname ignored: {name}, previous soname: {existing}"),
                    )?;
                }
                Some(_) => {}
                None => soname = Some(name),
            },
            DynamicEntry::Rpath(path) => elf_q::add_rpath(conn, contents, &path)?,
            DynamicEntry::Runpath(path) => elf_q::add_runpath(conn, contents, &path)?,
            DynamicEntry::Other { tag, value } => {
                if tag != 0 || value != 0 {
                    elf_q::add_dynamic(conn, contents, tag, value)?;
                }
            }
        }
    }

    for header in image.program_headers()? {
        elf_q::add_program_header(
            conn,
            contents,
            &elf_q::NewProgramHeader {
                p_type: header.p_type,
                file_offset: header.file_offset as i64,
                virt_addr: header.virt_addr as i64,
                phys_addr: header.phys_addr as i64,
                file_size: header.file_size as i64,
                memory_size: header.memory_size as i64,
                align: header.align as i64,
                readable: header.readable(),
                writable: header.writable(),
                executable: header.executable(),
            },
        )?;
    }
    Ok(soname)
}
