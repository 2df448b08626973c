//! Relational data layer for Warbler: users, messages, follows and likes.
//!
//! Every mutating store operation takes an explicit [`Transaction`]; reads
//! take a [`Connection`]. [`Database::transaction`] owns the unit of work and
//! commits only when the closure succeeds.

pub mod config;
pub mod content;
pub mod error;
pub mod identity;
pub mod likes;
pub mod migrations;
pub mod models;
pub mod social;

#[cfg(test)]
pub(crate) mod test_support;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::{debug, info};

pub use config::{Config, DatabaseLocation};
pub use error::{StoreError, StoreResult};
pub use identity::IdentityStore;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Database {
    conn: Mutex<Connection>,
}

/// Row counts per table, as reported by `warbler stats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TableCounts {
    pub users: u64,
    pub messages: u64,
    pub follows: u64,
    pub likes: u64,
}

impl Database {
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        // WAL mode so readers in other processes don't block the writer
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!("journal_mode = {}", mode);

        let db = Self::init(conn)?;
        info!("Database opened at {}", path.display());
        Ok(db)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        let db = Self::init(Connection::open_in_memory()?)?;
        info!("In-memory database opened");
        Ok(db)
    }

    pub fn connect(location: &DatabaseLocation) -> StoreResult<Self> {
        match location {
            DatabaseLocation::Memory => Self::open_in_memory(),
            DatabaseLocation::File(path) => Self::open(path),
        }
    }

    fn init(mut conn: Connection) -> StoreResult<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        migrations::run(&mut conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// Read-only access outside an explicit unit of work.
    pub fn with_conn<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T>,
    {
        let conn = self.lock()?;
        f(&conn)
    }

    /// Run `f` inside one transaction. Commits when `f` returns `Ok`;
    /// any error rolls back everything `f` staged.
    ///
    /// The write lock is taken up front (`BEGIN IMMEDIATE`) so concurrent
    /// writers on the same file queue on the busy timeout instead of failing
    /// mid-transaction.
    pub fn transaction<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Transaction<'_>) -> StoreResult<T>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let value = f(&tx)?;

        tx.commit()?;
        Ok(value)
    }

    pub fn stats(&self) -> StoreResult<TableCounts> {
        self.with_conn(|conn| {
            Ok(TableCounts {
                users: models::count(conn, "SELECT COUNT(*) FROM users", [])?,
                messages: models::count(conn, "SELECT COUNT(*) FROM messages", [])?,
                follows: models::count(conn, "SELECT COUNT(*) FROM follows", [])?,
                likes: models::count(conn, "SELECT COUNT(*) FROM likes", [])?,
            })
        })
    }

    /// Delete every row from every table, keeping the schema.
    pub fn reset(&self) -> StoreResult<()> {
        self.transaction(|tx| {
            tx.execute_batch(
                "DELETE FROM likes;
                 DELETE FROM follows;
                 DELETE FROM messages;
                 DELETE FROM users;",
            )?;
            Ok(())
        })?;
        info!("All rows deleted");
        Ok(())
    }
}
