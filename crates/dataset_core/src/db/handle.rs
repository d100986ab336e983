//! Shared database handle.
//!
//! # Responsibility
//! - Own the bootstrapped connections of one dataset database.
//! - Hand each operation an exclusive connection and a scoped transaction.
//!
//! # Invariants
//! - The handle is created explicitly and passed by reference; there is no
//!   process-global connection.
//! - A connection serves one operation at a time.

use super::tx::{Tx, TxMode};
use super::{DbError, DbResult};
use rusqlite::Connection;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Handle to an open dataset database.
///
/// Connections are closed when the handle is dropped.
#[derive(Debug)]
pub struct Db {
    connections: Vec<Mutex<Connection>>,
    cursor: AtomicUsize,
    mode: &'static str,
}

impl Db {
    pub(crate) fn from_connections(connections: Vec<Connection>, mode: &'static str) -> Self {
        Self {
            connections: connections.into_iter().map(Mutex::new).collect(),
            cursor: AtomicUsize::new(0),
            mode,
        }
    }

    /// Number of connections owned by this handle.
    pub fn pool_size(&self) -> usize {
        self.connections.len()
    }

    /// `file` or `memory`, for diagnostics.
    pub fn mode(&self) -> &'static str {
        self.mode
    }

    /// Runs `f` in a transaction that takes the write lock up front.
    ///
    /// Commits when `f` returns `Ok`; any `Err` (or panic) rolls back.
    pub fn write_tx<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Tx<'_>) -> Result<T, E>,
        E: From<DbError>,
    {
        self.run_tx(TxMode::Immediate, f)
    }

    /// Runs `f` in a deferred transaction for multi-statement reads.
    pub fn read_tx<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Tx<'_>) -> Result<T, E>,
        E: From<DbError>,
    {
        self.run_tx(TxMode::Deferred, f)
    }

    /// Runs `f` with exclusive access to one connection, outside any
    /// explicit transaction.
    pub fn with_connection<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Connection) -> Result<T, E>,
        E: From<DbError>,
    {
        let conn = self.connection()?;
        f(&conn)
    }

    fn run_tx<T, E, F>(&self, mode: TxMode, f: F) -> Result<T, E>
    where
        F: FnOnce(&Tx<'_>) -> Result<T, E>,
        E: From<DbError>,
    {
        let conn = self.connection()?;
        let tx = Tx::begin(&conn, mode)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Locks the next connection in rotation.
    ///
    /// A poisoned lock is recovered: a panicking holder's transaction was
    /// already rolled back when its `Tx` dropped.
    fn connection(&self) -> DbResult<MutexGuard<'_, Connection>> {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.connections.len();
        Ok(self.connections[index]
            .lock()
            .unwrap_or_else(PoisonError::into_inner))
    }
}
