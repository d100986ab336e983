//! SQLite storage bootstrap, connection handle and transactions.
//!
//! # Responsibility
//! - Open and configure SQLite connections for the dataset store.
//! - Apply schema migrations in deterministic order.
//! - Provide the scoped transaction wrapper every repository call runs in.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - A transaction that is not committed is rolled back when it goes out of
//!   scope.

use crate::config::ConfigError;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod handle;
pub mod migrations;
mod open;
mod tx;

pub use handle::Db;
pub use open::{open_db, open_db_in_memory};
pub use tx::{Tx, TxMode};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    Config(ConfigError),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::Config(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Config(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<ConfigError> for DbError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}
