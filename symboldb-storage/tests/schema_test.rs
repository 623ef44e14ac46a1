//! Connection and schema tests.

use symboldb_storage::{migrations, pragmas, DatabaseManager};
use tempfile::TempDir;

#[test]
fn open_applies_pragmas_and_migrations() {
    let dir = TempDir::new().unwrap();
    let db = DatabaseManager::open(&dir.path().join("symbols.db")).unwrap();

    db.with_writer(|conn| -> Result<(), symboldb_core::errors::StorageError> {
        assert!(pragmas::verify_wal_mode(conn).unwrap());
        assert_eq!(migrations::current_version(conn).unwrap(), 4);

        let fk: i64 = conn
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .unwrap();
        assert_eq!(fk, 1, "foreign_keys should be ON");
        Ok(())
    })
    .unwrap();
}

#[test]
fn reopen_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("symbols.db");
    drop(DatabaseManager::open(&path).unwrap());
    let db = DatabaseManager::open(&path).unwrap();
    db.with_reader(|conn| -> Result<(), symboldb_core::errors::StorageError> {
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM package", [], |row| row.get(0))
            .map_err(|e| symboldb_core::errors::StorageError::SqliteError {
                message: e.to_string(),
            })?;
        assert_eq!(count, 0);
        Ok(())
    })
    .unwrap();
}

#[test]
fn readers_cannot_write() {
    let dir = TempDir::new().unwrap();
    let db = DatabaseManager::open(&dir.path().join("symbols.db")).unwrap();
    let result = db.with_reader(|conn| -> Result<(), symboldb_core::errors::StorageError> {
        conn.execute("INSERT INTO package_set (name) VALUES ('x')", [])
            .map_err(|e| symboldb_core::errors::StorageError::SqliteError {
                message: e.to_string(),
            })?;
        Ok(())
    });
    assert!(result.is_err(), "write through read pool should fail");
}

#[test]
fn transaction_rolls_back_on_error() {
    let dir = TempDir::new().unwrap();
    let db = DatabaseManager::open(&dir.path().join("symbols.db")).unwrap();
    let result: Result<(), _> = db.with_transaction(|conn| -> Result<(), symboldb_core::errors::StorageError> {
        conn.execute("INSERT INTO package_set (name) VALUES ('rollback')", [])
            .map_err(|e| symboldb_core::errors::StorageError::SqliteError {
                message: e.to_string(),
            })?;
        Err(symboldb_core::errors::StorageError::SqliteError {
            message: "forced".to_string(),
        })
    });
    assert!(result.is_err());
    db.with_reader(|conn| -> Result<(), symboldb_core::errors::StorageError> {
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM package_set", [], |row| row.get(0))
            .map_err(|e| symboldb_core::errors::StorageError::SqliteError {
                message: e.to_string(),
            })?;
        assert_eq!(count, 0, "insert should have been rolled back");
        Ok(())
    })
    .unwrap();
}
