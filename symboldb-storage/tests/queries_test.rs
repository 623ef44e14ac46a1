//! Query-layer tests: interning, package sets, URL cache, expiry.

use symboldb_core::types::PackageId;
use symboldb_storage::queries::{expire, files, packages, sets, url_cache};
use symboldb_storage::DatabaseManager;
use tempfile::TempDir;

fn test_package<'a>(name: &'a str, hash: &'a str) -> packages::NewPackage<'a> {
    packages::NewPackage {
        name,
        epoch: None,
        version: "1.0",
        release: "1",
        arch: "x86_64",
        kind: "binary",
        source_rpm: Some("src-1.0-1.src.rpm"),
        hash,
        build_host: "builder",
        build_time: 1_400_000_000,
        summary: "summary",
        description: "description",
        license: "MIT",
        group: "Development/Tools",
        normalized: false,
    }
}

fn test_file<'a>(name: &'a str) -> files::NewFile<'a> {
    files::NewFile {
        name,
        user: "root",
        group: "root",
        mode: 0o100644,
        mtime: 1_400_000_000,
        inode: 1,
        flags: 0,
        normalized: false,
    }
}

fn open_db(dir: &TempDir) -> DatabaseManager {
    DatabaseManager::open(&dir.path().join("symbols.db")).unwrap()
}

#[test]
fn intern_package_deduplicates_on_hash() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);
    db.with_transaction(|conn| -> Result<(), symboldb_core::errors::StorageError> {
        let (first, added) = packages::intern_package(conn, &test_package("a", "aa11")).unwrap();
        assert!(added);
        let (second, added) = packages::intern_package(conn, &test_package("a", "aa11")).unwrap();
        assert!(!added);
        assert_eq!(first, second);
        let (third, added) = packages::intern_package(conn, &test_package("a", "bb22")).unwrap();
        assert!(added);
        assert_ne!(first, third);
        Ok(())
    })
    .unwrap();
}

#[test]
fn package_lookup_by_digest() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);
    db.with_transaction(|conn| -> Result<(), symboldb_core::errors::StorageError> {
        let (pkg, _) = packages::intern_package(conn, &test_package("a", "cc33")).unwrap();
        packages::add_package_digest(conn, pkg, &[1u8; 32], 4096).unwrap();
        packages::add_package_digest(conn, pkg, &[2u8; 20], 4096).unwrap();
        assert_eq!(packages::package_by_digest(conn, &[1u8; 32]).unwrap(), Some(pkg));
        assert_eq!(packages::package_by_digest(conn, &[2u8; 20]).unwrap(), Some(pkg));
        assert_eq!(packages::package_by_digest(conn, &[9u8; 32]).unwrap(), None);
        Ok(())
    })
    .unwrap();
}

#[test]
fn file_contents_are_shared_across_packages() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);
    db.with_transaction(|conn| -> Result<(), symboldb_core::errors::StorageError> {
        let (pkg_a, _) = packages::intern_package(conn, &test_package("a", "dd44")).unwrap();
        let (pkg_b, _) = packages::intern_package(conn, &test_package("b", "ee55")).unwrap();
        let digest = [7u8; 32];

        let added_a =
            files::add_file(conn, pkg_a, &test_file("/usr/bin/tool"), &digest, 10, b"preview")
                .unwrap();
        assert!(added_a.added);
        let added_b =
            files::add_file(conn, pkg_b, &test_file("/usr/bin/tool"), &digest, 10, b"preview")
                .unwrap();
        assert!(!added_b.added, "identical contents must be shared");
        assert_eq!(added_a.contents_id, added_b.contents_id);
        assert_ne!(added_a.file_id, added_b.file_id);

        // A longer preview replaces the stored one.
        files::update_contents_preview(conn, added_a.contents_id, b"much longer preview").unwrap();
        let (_, added, len) = files::intern_file_contents(
            conn,
            &test_file("/usr/bin/tool"),
            &digest,
            10,
            b"preview",
        )
        .unwrap();
        assert!(!added);
        assert_eq!(len, b"much longer preview".len() as i64);
        Ok(())
    })
    .unwrap();
}

#[test]
fn files_with_digest_reports_all_locations() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);
    db.with_transaction(|conn| -> Result<(), symboldb_core::errors::StorageError> {
        let (pkg, _) = packages::intern_package(conn, &test_package("a", "ff66")).unwrap();
        packages::add_package_digest(conn, pkg, &[0xAB; 32], 2048).unwrap();
        let digest = [3u8; 32];
        files::add_file(conn, pkg, &test_file("/usr/share/doc/README"), &digest, 5, b"hello")
            .unwrap();
        let locations = files::files_with_digest(conn, &digest).unwrap();
        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].file_name, "/usr/share/doc/README");
        assert_eq!(locations[0].rpm_digest, vec![0xAB; 32]);
        Ok(())
    })
    .unwrap();
}

#[test]
fn package_set_lifecycle() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);
    db.with_transaction(|conn| -> Result<(), symboldb_core::errors::StorageError> {
        let set = sets::create_package_set(conn, "fedora-18").unwrap();
        assert!(sets::create_package_set(conn, "fedora-18").is_err());
        assert_eq!(sets::lookup_package_set(conn, "fedora-18").unwrap(), Some(set));
        assert_eq!(sets::lookup_package_set(conn, "fedora-19").unwrap(), None);

        let (a, _) = packages::intern_package(conn, &test_package("a", "1111")).unwrap();
        let (b, _) = packages::intern_package(conn, &test_package("b", "2222")).unwrap();
        assert!(sets::replace_package_set(conn, set, &[a, b]).unwrap());
        assert!(!sets::replace_package_set(conn, set, &[b, a]).unwrap());
        assert!(sets::replace_package_set(conn, set, &[a]).unwrap());
        let members = sets::package_set_members(conn, set).unwrap();
        assert_eq!(members, vec![a]);
        Ok(())
    })
    .unwrap();
}

#[test]
fn url_cache_validation() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);
    db.with_transaction(|conn| -> Result<(), symboldb_core::errors::StorageError> {
        url_cache::update(conn, "http://x/repomd.xml", b"<repomd/>", 1_234).unwrap();
        assert_eq!(
            url_cache::fetch(conn, "http://x/repomd.xml").unwrap().as_deref(),
            Some(&b"<repomd/>"[..])
        );
        // Valid when both length and time match.
        assert!(url_cache::fetch_validated(conn, "http://x/repomd.xml", 9, 1_234)
            .unwrap()
            .is_some());
        // Stale time, wrong length, or zero time: miss.
        assert!(url_cache::fetch_validated(conn, "http://x/repomd.xml", 9, 999)
            .unwrap()
            .is_none());
        assert!(url_cache::fetch_validated(conn, "http://x/repomd.xml", 10, 1_234)
            .unwrap()
            .is_none());
        assert!(url_cache::fetch_validated(conn, "http://x/repomd.xml", 9, 0)
            .unwrap()
            .is_none());
        // Nothing is old enough to expire yet.
        assert_eq!(url_cache::expire(conn, 3 * 24 * 3600).unwrap(), 0);
        assert_eq!(url_cache::expire(conn, -1).unwrap(), 1);
        Ok(())
    })
    .unwrap();
}

#[test]
fn expiry_preserves_referenced_data() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);
    db.with_transaction(|conn| -> Result<(), symboldb_core::errors::StorageError> {
        let (kept, _) = packages::intern_package(conn, &test_package("kept", "aaaa")).unwrap();
        let (stale, _) = packages::intern_package(conn, &test_package("stale", "bbbb")).unwrap();
        packages::add_package_digest(conn, kept, &[1u8; 32], 100).unwrap();
        packages::add_package_digest(conn, stale, &[2u8; 32], 100).unwrap();
        files::add_file(conn, kept, &test_file("/usr/bin/kept"), &[11u8; 32], 1, b"k").unwrap();
        files::add_file(conn, stale, &test_file("/usr/bin/stale"), &[22u8; 32], 1, b"s").unwrap();

        let set = sets::create_package_set(conn, "live").unwrap();
        sets::replace_package_set(conn, set, &[kept]).unwrap();

        assert_eq!(expire::expire_packages(conn).unwrap(), 1);
        assert_eq!(expire::expire_file_contents(conn).unwrap(), 1);
        assert_eq!(expire::expire_java_classes(conn).unwrap(), 0);

        let digests = expire::referenced_package_digests(conn).unwrap();
        assert_eq!(digests, vec![vec![1u8; 32]]);
        assert_eq!(packages::package_by_digest(conn, &[2u8; 32]).unwrap(), None);
        Ok(())
    })
    .unwrap();
}

#[test]
fn typed_ids_round_trip() {
    let id = PackageId::new(42);
    assert_eq!(id.value(), 42);
    assert_eq!(PackageId::from(42i64), id);
}
