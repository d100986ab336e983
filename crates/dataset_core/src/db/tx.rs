//! Scoped transaction wrapper.
//!
//! # Responsibility
//! - Bracket a group of statements in one SQLite transaction.
//! - Guarantee rollback on every exit path that does not commit.
//!
//! # Invariants
//! - `commit` and `rollback` consume the `Tx`, so nothing can run after
//!   either, and a rollback after commit cannot be issued.
//! - Dropping an unfinished `Tx` rolls it back.
//! - A `Tx` borrows its connection exclusively for its whole lifetime.

use super::DbResult;
use rusqlite::{
    Connection, DropBehavior, OptionalExtension, Params, Row, Statement, Transaction,
    TransactionBehavior,
};

/// Lock acquisition mode for a new transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxMode {
    /// Takes locks lazily; used for read-only work.
    Deferred,
    /// Takes the write lock up front so a guard read and the mutation that
    /// follows observe the same database state.
    Immediate,
}

impl TxMode {
    fn behavior(self) -> TransactionBehavior {
        match self {
            Self::Deferred => TransactionBehavior::Deferred,
            Self::Immediate => TransactionBehavior::Immediate,
        }
    }
}

/// An open transaction on one connection.
pub struct Tx<'conn> {
    inner: Transaction<'conn>,
}

impl<'conn> Tx<'conn> {
    /// Starts a transaction on `conn`, which the caller must hold
    /// exclusively.
    pub fn begin(conn: &'conn Connection, mode: TxMode) -> DbResult<Self> {
        let mut inner = Transaction::new_unchecked(conn, mode.behavior())?;
        inner.set_drop_behavior(DropBehavior::Rollback);
        Ok(Self { inner })
    }

    /// Runs a data-modifying statement and returns the affected row count.
    pub fn execute<P: Params>(&self, sql: &str, params: P) -> DbResult<usize> {
        Ok(self.inner.execute(sql, params)?)
    }

    /// Runs a single-row query; `None` when no row matched.
    pub fn query_row<T, P, F>(&self, sql: &str, params: P, map: F) -> DbResult<Option<T>>
    where
        P: Params,
        F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
    {
        Ok(self.inner.query_row(sql, params, map).optional()?)
    }

    /// Prepares a statement for multi-row reads inside this transaction.
    pub fn prepare(&self, sql: &str) -> DbResult<Statement<'_>> {
        Ok(self.inner.prepare(sql)?)
    }

    /// Commits the transaction.
    pub fn commit(self) -> DbResult<()> {
        Ok(self.inner.commit()?)
    }

    /// Rolls the transaction back explicitly.
    pub fn rollback(self) -> DbResult<()> {
        Ok(self.inner.rollback()?)
    }
}

#[cfg(test)]
mod tests {
    use super::{Tx, TxMode};
    use rusqlite::Connection;

    fn scratch() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (v INTEGER NOT NULL);").unwrap();
        conn
    }

    fn count(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM t;", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn drop_without_commit_rolls_back() {
        let conn = scratch();
        {
            let tx = Tx::begin(&conn, TxMode::Immediate).unwrap();
            tx.execute("INSERT INTO t (v) VALUES (1);", []).unwrap();
        }
        assert_eq!(count(&conn), 0);
        assert!(conn.is_autocommit());
    }

    #[test]
    fn commit_persists_and_leaves_no_open_transaction() {
        let conn = scratch();
        let tx = Tx::begin(&conn, TxMode::Immediate).unwrap();
        tx.execute("INSERT INTO t (v) VALUES (1);", []).unwrap();
        tx.commit().unwrap();
        assert_eq!(count(&conn), 1);
        assert!(conn.is_autocommit());
    }

    #[test]
    fn explicit_rollback_discards_writes() {
        let conn = scratch();
        let tx = Tx::begin(&conn, TxMode::Deferred).unwrap();
        tx.execute("INSERT INTO t (v) VALUES (1);", []).unwrap();
        tx.rollback().unwrap();
        assert_eq!(count(&conn), 0);
        assert!(conn.is_autocommit());
    }

    #[test]
    fn failed_statement_is_rolled_back_with_the_rest() {
        let conn = scratch();
        {
            let tx = Tx::begin(&conn, TxMode::Immediate).unwrap();
            tx.execute("INSERT INTO t (v) VALUES (1);", []).unwrap();
            assert!(tx.execute("INSERT INTO t (v) VALUES (NULL);", []).is_err());
        }
        assert_eq!(count(&conn), 0);
    }

    #[test]
    fn query_row_maps_no_rows_to_none() {
        let conn = scratch();
        let tx = Tx::begin(&conn, TxMode::Deferred).unwrap();
        let value: Option<i64> = tx
            .query_row("SELECT v FROM t WHERE v = ?1;", [7], |row| row.get(0))
            .unwrap();
        assert_eq!(value, None);
    }
}
