//! End-to-end ELF closure tests over a synthetic package set.

use symboldb_core::types::{FileId, PackageId, PackageSetId};
use symboldb_storage::closure::{update_elf_closure, ClosureConflicts, IgnoreConflicts};
use symboldb_storage::queries::{elf, files, packages, sets};
use symboldb_storage::DatabaseManager;
use tempfile::TempDir;

struct Fixture {
    db: DatabaseManager,
    set: PackageSetId,
    next_digest: u8,
}

impl Fixture {
    fn new(dir: &TempDir) -> Self {
        let db = DatabaseManager::open(&dir.path().join("symbols.db")).unwrap();
        let set = db
            .with_transaction(|conn| sets::create_package_set(conn, "test-set"))
            .unwrap();
        Fixture {
            db,
            set,
            next_digest: 0,
        }
    }

    fn add_package(&self, name: &str) -> PackageId {
        self.db
            .with_transaction(|conn| -> Result<PackageId, symboldb_core::errors::StorageError> {
                let (pkg, _) = packages::intern_package(
                    conn,
                    &packages::NewPackage {
                        name,
                        epoch: None,
                        version: "1.0",
                        release: "1",
                        arch: "x86_64",
                        kind: "binary",
                        source_rpm: Some("src"),
                        hash: &format!("hash-{name}"),
                        build_host: "builder",
                        build_time: 0,
                        summary: "",
                        description: "",
                        license: "",
                        group: "",
                        normalized: false,
                    },
                )
                .unwrap();
                let mut members = sets::package_set_members(conn, self.set)?;
                members.push(pkg);
                sets::replace_package_set(conn, self.set, &members)?;
                Ok(pkg)
            })
            .unwrap()
    }

    /// Add a DSO file providing `soname` and needing `needed`.
    fn add_dso(
        &mut self,
        pkg: PackageId,
        path: &'static str,
        soname: Option<&'static str>,
        needed: &[&str],
    ) -> FileId {
        self.next_digest += 1;
        let digest = [self.next_digest; 32];
        self.db
            .with_transaction(|conn| -> Result<FileId, symboldb_core::errors::StorageError> {
                let added = files::add_file(
                    conn,
                    pkg,
                    &files::NewFile {
                        name: path,
                        user: "root",
                        group: "root",
                        mode: 0o100755,
                        mtime: 0,
                        inode: self.next_digest as i64,
                        flags: 0,
                        normalized: false,
                    },
                    &digest,
                    64,
                    b"\x7fELF",
                )?;
                elf::add_elf_image(
                    conn,
                    added.contents_id,
                    &elf::NewElfImage {
                        ei_class: 2,
                        ei_data: 1,
                        e_type: 3,
                        e_machine: 62,
                        arch: Some("x86_64"),
                        soname,
                        build_id: None,
                    },
                )?;
                for name in needed {
                    elf::add_needed(conn, added.contents_id, name)?;
                }
                Ok(added.file_id)
            })
            .unwrap()
    }

    fn closure_rows(&self) -> Vec<(i64, i64)> {
        self.db
            .with_reader(|conn| -> Result<Vec<(i64, i64)>, symboldb_core::errors::StorageError> {
                let mut stmt = conn
                    .prepare("SELECT file_id, needed FROM elf_closure WHERE set_id = ?1 ORDER BY file_id, needed")
                    .map_err(|e| symboldb_core::errors::StorageError::SqliteError {
                        message: e.to_string(),
                    })?;
                let rows = stmt
                    .query_map([self.set.value()], |row| Ok((row.get(0)?, row.get(1)?)))
                    .map_err(|e| symboldb_core::errors::StorageError::SqliteError {
                        message: e.to_string(),
                    })?;
                let mut result = Vec::new();
                for row in rows {
                    result.push(row.map_err(|e| {
                        symboldb_core::errors::StorageError::SqliteError {
                            message: e.to_string(),
                        }
                    })?);
                }
                Ok(result)
            })
            .unwrap()
    }
}

#[derive(Default)]
struct Recorder {
    missing: Vec<String>,
    conflicts: Vec<String>,
}

impl ClosureConflicts for Recorder {
    fn missing(&mut self, _file: FileId, soname: &str) {
        self.missing.push(soname.to_string());
    }

    fn conflict(&mut self, _file: FileId, soname: &str, _choices: &[FileId]) {
        self.conflicts.push(soname.to_string());
    }
}

#[test]
fn transitive_closure_reaches_fixpoint() {
    let dir = TempDir::new().unwrap();
    let mut fx = Fixture::new(&dir);
    let glibc = fx.add_package("glibc");
    let ssl = fx.add_package("openssl-libs");
    let app = fx.add_package("app");

    let libc = fx.add_dso(glibc, "/lib64/libc.so.6", Some("libc.so.6"), &[]);
    let libcrypto = fx.add_dso(
        ssl,
        "/usr/lib64/libcrypto.so.10",
        Some("libcrypto.so.10"),
        &["libc.so.6"],
    );
    let libssl = fx.add_dso(
        ssl,
        "/usr/lib64/libssl.so.10",
        Some("libssl.so.10"),
        &["libcrypto.so.10", "libc.so.6"],
    );
    let binary = fx.add_dso(app, "/usr/bin/app", None, &["libssl.so.10"]);

    fx.db
        .with_transaction(|conn| update_elf_closure(conn, fx.set, &mut IgnoreConflicts))
        .unwrap();

    let rows = fx.closure_rows();
    // app needs libssl directly, libcrypto and libc transitively.
    assert!(rows.contains(&(binary.value(), libssl.value())));
    assert!(rows.contains(&(binary.value(), libcrypto.value())));
    assert!(rows.contains(&(binary.value(), libc.value())));
    assert!(rows.contains(&(libssl.value(), libcrypto.value())));
    assert!(rows.contains(&(libssl.value(), libc.value())));
    assert!(rows.contains(&(libcrypto.value(), libc.value())));
    assert_eq!(rows.len(), 6);
}

#[test]
fn conflicting_providers_prefer_library_directories() {
    let dir = TempDir::new().unwrap();
    let mut fx = Fixture::new(&dir);
    let system = fx.add_package("zlib");
    let bundled = fx.add_package("bundled-app");
    let consumer = fx.add_package("consumer");

    let system_z = fx.add_dso(system, "/usr/lib64/libz.so.1", Some("libz.so.1"), &[]);
    let _bundled_z = fx.add_dso(
        bundled,
        "/opt/bundle/lib/libz.so.1",
        Some("libz.so.1"),
        &[],
    );
    let needing = fx.add_dso(consumer, "/usr/bin/consumer", None, &["libz.so.1"]);

    let mut recorder = Recorder::default();
    fx.db
        .with_transaction(|conn| update_elf_closure(conn, fx.set, &mut recorder))
        .unwrap();

    assert_eq!(recorder.conflicts, vec!["libz.so.1"]);
    let rows = fx.closure_rows();
    assert!(rows.contains(&(needing.value(), system_z.value())));
}

#[test]
fn missing_sonames_are_reported_not_fatal() {
    let dir = TempDir::new().unwrap();
    let mut fx = Fixture::new(&dir);
    let app = fx.add_package("app");
    fx.add_dso(app, "/usr/bin/app", None, &["libmissing.so.9"]);

    let mut recorder = Recorder::default();
    fx.db
        .with_transaction(|conn| update_elf_closure(conn, fx.set, &mut recorder))
        .unwrap();
    assert_eq!(recorder.missing, vec!["libmissing.so.9"]);
    assert!(fx.closure_rows().is_empty());
}

#[test]
fn closure_refresh_replaces_previous_rows() {
    let dir = TempDir::new().unwrap();
    let mut fx = Fixture::new(&dir);
    let glibc = fx.add_package("glibc");
    let app = fx.add_package("app");
    let libc = fx.add_dso(glibc, "/lib64/libc.so.6", Some("libc.so.6"), &[]);
    let binary = fx.add_dso(app, "/usr/bin/app", None, &["libc.so.6"]);

    fx.db
        .with_transaction(|conn| update_elf_closure(conn, fx.set, &mut IgnoreConflicts))
        .unwrap();
    assert_eq!(fx.closure_rows(), vec![(binary.value(), libc.value())]);

    // Shrink the set to glibc only; the app dependency must disappear.
    fx.db
        .with_transaction(|conn| {
            sets::replace_package_set(conn, fx.set, &[glibc])?;
            update_elf_closure(conn, fx.set, &mut IgnoreConflicts)
        })
        .unwrap();
    assert!(fx.closure_rows().is_empty());
}
