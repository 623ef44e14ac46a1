//! SQLite persistence layer.
//!
//! One writer connection serializes all mutation; a small pool of read-only
//! connections serves queries. WAL mode lets readers proceed while a load
//! transaction is open.

pub mod closure;
pub mod migrations;
pub mod pragmas;
pub mod queries;

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use rusqlite::Connection;
use symboldb_core::errors::StorageError;

const READ_POOL_SIZE: usize = 4;

pub(crate) fn sqlite_err(e: rusqlite::Error) -> StorageError {
    StorageError::SqliteError {
        message: e.to_string(),
    }
}

/// Owns the writer connection and the read pool.
pub struct DatabaseManager {
    writer: Mutex<Connection>,
    readers: Vec<Mutex<Connection>>,
    next_reader: AtomicUsize,
}

impl DatabaseManager {
    /// Open (creating if necessary) the database at `path`, apply pragmas,
    /// and run pending migrations.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let writer = Connection::open(path).map_err(sqlite_err)?;
        pragmas::apply_pragmas(&writer)?;
        migrations::run_migrations(&writer)?;

        let mut readers = Vec::with_capacity(READ_POOL_SIZE);
        for _ in 0..READ_POOL_SIZE {
            let conn = Connection::open(path).map_err(sqlite_err)?;
            pragmas::apply_read_pragmas(&conn)?;
            readers.push(Mutex::new(conn));
        }

        Ok(DatabaseManager {
            writer: Mutex::new(writer),
            readers,
            next_reader: AtomicUsize::new(0),
        })
    }

    /// Run `f` with exclusive access to the writer connection.
    pub fn with_writer<T, E: From<StorageError>>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, E>,
    ) -> Result<T, E> {
        let conn = self.writer.lock().expect("writer lock poisoned");
        f(&conn)
    }

    /// Run `f` inside a transaction on the writer connection. The
    /// transaction is rolled back when `f` fails.
    pub fn with_transaction<T, E: From<StorageError>>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, E>,
    ) -> Result<T, E> {
        let conn = self.writer.lock().expect("writer lock poisoned");
        conn.execute_batch("BEGIN IMMEDIATE")
            .map_err(|e| E::from(sqlite_err(e)))?;
        match f(&conn) {
            Ok(value) => {
                conn.execute_batch("COMMIT")
                    .map_err(|e| E::from(sqlite_err(e)))?;
                Ok(value)
            }
            Err(e) => {
                let _ = conn.execute_batch("ROLLBACK");
                Err(e)
            }
        }
    }

    /// Run `f` on one of the read-only connections, round-robin.
    pub fn with_reader<T, E: From<StorageError>>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, E>,
    ) -> Result<T, E> {
        let index = self.next_reader.fetch_add(1, Ordering::Relaxed) % self.readers.len();
        let conn = self.readers[index].lock().expect("reader lock poisoned");
        f(&conn)
    }
}
