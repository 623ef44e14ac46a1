//! End-to-end load pipeline tests: a synthetic RPM goes in, indexed rows
//! come out.

use symboldb_core::errors::StorageError;
use symboldb_formats::testing::{build_class_file, build_elf64, build_rpm, build_zip, ElfSpec, FileSpec};
use symboldb_repo::load::load_rpm_bytes;
use symboldb_storage::DatabaseManager;
use tempfile::TempDir;

fn count(db: &DatabaseManager, sql: &str) -> i64 {
    db.with_reader(|conn| -> Result<i64, StorageError> {
        conn.query_row(sql, [], |row| row.get(0))
            .map_err(|e| StorageError::SqliteError {
                message: e.to_string(),
            })
    })
    .unwrap()
}

fn query_strings(db: &DatabaseManager, sql: &str) -> Vec<String> {
    db.with_reader(|conn| -> Result<Vec<String>, StorageError> {
        let mut stmt = conn.prepare(sql).map_err(|e| StorageError::SqliteError {
            message: e.to_string(),
        })?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| StorageError::SqliteError {
                message: e.to_string(),
            })?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row.map_err(|e| StorageError::SqliteError {
                message: e.to_string(),
            })?);
        }
        Ok(result)
    })
    .unwrap()
}

fn fixture_rpm() -> Vec<u8> {
    let dso = build_elf64(&ElfSpec {
        soname: Some("libdemo.so.1"),
        needed: vec!["libc.so.6"],
        definitions: vec![("demo_init", 0x1000)],
        references: vec!["malloc"],
        build_id: Some(b"\xAA\xBB\xCC\xDD\xAA\xBB\xCC\xDD"),
        ..ElfSpec::default()
    });
    let class = build_class_file(
        "com/example/Widget",
        "java/lang/Object",
        &["java/io/Closeable"],
        &[],
    );
    let jar = build_zip(&[
        ("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\n"),
        ("com/example/Widget.class", &class),
    ]);
    let pom = br#"<project><scm><url>http://example.com/scm</url></scm></project>"#;

    build_rpm(
        "demo",
        "x86_64",
        Some("demo-1.0-1.src.rpm"),
        &[
            FileSpec::directory("/usr/", "lib64"),
            FileSpec::regular("/usr/lib64/", "libdemo.so.1.0.0", dso),
            FileSpec::symlink("/usr/lib64/", "libdemo.so.1", "libdemo.so.1.0.0"),
            FileSpec::regular("/usr/share/java/", "widget.jar", jar),
            FileSpec::regular("/usr/share/java/", "Widget.class", class),
            FileSpec::regular("/usr/share/maven-poms/", "widget.pom", pom.to_vec()),
            FileSpec::regular("/etc/", "demo.conf", &b"verbose = true\n"[..]),
        ],
    )
}

#[test]
fn load_indexes_every_format() {
    let dir = TempDir::new().unwrap();
    let db = DatabaseManager::open(&dir.path().join("symbols.db")).unwrap();

    let rpm = fixture_rpm();
    let (pkg, info) = load_rpm_bytes(&db, &rpm, "demo-1.0-1.x86_64.rpm", None, None).unwrap();
    assert_eq!(info.name, "demo");
    assert!(pkg.value() > 0);

    // Package header tables.
    assert_eq!(count(&db, "SELECT COUNT(*) FROM package"), 1);
    assert_eq!(count(&db, "SELECT COUNT(*) FROM package_digest"), 2);
    assert_eq!(count(&db, "SELECT COUNT(*) FROM package_dependency"), 2);
    assert_eq!(count(&db, "SELECT COUNT(*) FROM directory"), 1);
    assert_eq!(count(&db, "SELECT COUNT(*) FROM symlink"), 1);
    assert_eq!(count(&db, "SELECT COUNT(*) FROM file"), 5);

    // ELF extraction.
    assert_eq!(count(&db, "SELECT COUNT(*) FROM elf_file"), 1);
    assert_eq!(
        query_strings(&db, "SELECT soname FROM elf_file"),
        vec!["libdemo.so.1"]
    );
    assert_eq!(
        query_strings(&db, "SELECT name FROM elf_needed"),
        vec!["libc.so.6"]
    );
    assert_eq!(
        query_strings(&db, "SELECT name FROM elf_definition"),
        vec!["demo_init"]
    );
    assert_eq!(
        query_strings(&db, "SELECT name FROM elf_reference"),
        vec!["malloc"]
    );
    assert_eq!(count(&db, "SELECT COUNT(*) FROM elf_error"), 0);

    // Java extraction: the descriptor is interned once although the class
    // appears both bare and inside the jar (identical contents dedupe at
    // the class level, distinct contents at the contents level).
    assert_eq!(count(&db, "SELECT COUNT(*) FROM java_class"), 1);
    assert_eq!(
        query_strings(&db, "SELECT name FROM java_class"),
        vec!["com/example/Widget"]
    );
    assert_eq!(
        query_strings(&db, "SELECT super_class FROM java_class"),
        vec!["java/lang/Object"]
    );
    assert_eq!(
        query_strings(&db, "SELECT name FROM java_interface"),
        vec!["java/io/Closeable"]
    );
    assert_eq!(count(&db, "SELECT COUNT(*) FROM java_class_contents"), 2);
    assert_eq!(count(&db, "SELECT COUNT(*) FROM java_error"), 0);

    // Maven URLs from the POM.
    assert_eq!(
        query_strings(&db, "SELECT url FROM maven_url"),
        vec!["http://example.com/scm"]
    );

    // Config files keep their full contents.
    let preview: Vec<u8> = db
        .with_reader(|conn| -> Result<Vec<u8>, StorageError> {
            conn.query_row(
                "SELECT fc.preview FROM file_contents fc
                 JOIN file f ON f.contents_id = fc.contents_id
                 WHERE f.name = '/etc/demo.conf'",
                [],
                |row| row.get(0),
            )
            .map_err(|e| StorageError::SqliteError {
                message: e.to_string(),
            })
        })
        .unwrap();
    assert_eq!(preview, b"verbose = true\n");
}

#[test]
fn reloading_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let db = DatabaseManager::open(&dir.path().join("symbols.db")).unwrap();
    let rpm = fixture_rpm();
    let (first, _) = load_rpm_bytes(&db, &rpm, "demo.rpm", None, None).unwrap();
    let (second, _) =
        load_rpm_bytes(&db, &rpm, "demo.rpm", None, Some("http://mirror/demo.rpm")).unwrap();
    assert_eq!(first, second);
    assert_eq!(count(&db, "SELECT COUNT(*) FROM package"), 1);
    assert_eq!(count(&db, "SELECT COUNT(*) FROM file"), 5);
    assert_eq!(
        query_strings(&db, "SELECT url FROM package_url"),
        vec!["http://mirror/demo.rpm"]
    );
}

#[test]
fn expected_digest_mismatch_fails_the_load() {
    use symboldb_core::checksum::{Checksum, HashKind};
    let dir = TempDir::new().unwrap();
    let db = DatabaseManager::open(&dir.path().join("symbols.db")).unwrap();
    let rpm = fixture_rpm();
    let wrong = Checksum::of(HashKind::Sha256, b"some other bytes");
    let err = load_rpm_bytes(&db, &rpm, "demo.rpm", Some(&wrong), None).unwrap_err();
    assert!(matches!(
        err,
        symboldb_core::errors::LoadError::PackageDigestMismatch { .. }
    ));
}

#[test]
fn source_packages_are_not_unpacked() {
    let dir = TempDir::new().unwrap();
    let db = DatabaseManager::open(&dir.path().join("symbols.db")).unwrap();
    let class = build_class_file("com/example/S", "java/lang/Object", &[], &[]);
    let rpm = build_rpm(
        "demo",
        "src",
        None,
        &[FileSpec::regular("/", "S.class", class)],
    );
    load_rpm_bytes(&db, &rpm, "demo.src.rpm", None, None).unwrap();
    // The file is recorded, but not format-analyzed.
    assert_eq!(count(&db, "SELECT COUNT(*) FROM file"), 1);
    assert_eq!(count(&db, "SELECT COUNT(*) FROM java_class"), 0);
}
