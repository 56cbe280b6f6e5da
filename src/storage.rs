//!
//! financy storage module
//! ----------------------
//! SQLite-backed store for identities and ledger transactions.
//!
//! Every operation here is a point lookup, a single-row write, or a single
//! aggregate query; no explicit transactions are needed. The `Store` owns one
//! connection and is shared across request handlers as a `SharedStore`
//! (`Arc<Mutex<Store>>`). Callers on the async side should hop onto a blocking
//! thread before locking (see `server::blocking`).

use std::path::Path;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use rusqlite::Connection;
use tracing::{debug, info};

pub mod schema;
pub mod transactions;
pub mod users;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("duplicate value: {0}")]
    Duplicate(String),
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Single-connection SQLite store.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) the database file and make sure the schema exists.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }
        info!("Opening SQLite database at {:?}", path);
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;")?;
        schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for tests).
    pub fn open_in_memory() -> StoreResult<Self> {
        debug!("Opening in-memory SQLite database");
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub(crate) fn conn(&self) -> &Connection { &self.conn }
}

#[derive(Clone)]
pub struct SharedStore(pub Arc<Mutex<Store>>);

impl SharedStore {
    pub fn new(store: Store) -> Self { Self(Arc::new(Mutex::new(store))) }

    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> { Store::open(path).map(Self::new) }

    pub fn open_in_memory() -> StoreResult<Self> { Store::open_in_memory().map(Self::new) }

    pub fn lock(&self) -> MutexGuard<'_, Store> { self.0.lock() }
}

/// Turn a UNIQUE constraint failure into `StoreError::Duplicate`.
pub(crate) fn map_constraint(err: rusqlite::Error, what: &str) -> StoreError {
    match err {
        rusqlite::Error::SqliteFailure(ref e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation => {
            StoreError::Duplicate(what.to_string())
        }
        other => StoreError::Sqlite(other),
    }
}
