//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open file or in-memory dataset databases as a `Db` handle.
//! - Configure connection pragmas and SQL functions required by the store.
//! - Trigger schema migrations before returning a usable handle.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON` and `json_merge_top`
//!   registered.
//! - Returned connections have migrations fully applied.

use super::handle::Db;
use super::migrations::apply_migrations;
use super::DbResult;
use crate::config::{JournalMode, StoreConfig};
use crate::model::document::merge_top_level;
use log::{error, info, warn};
use rusqlite::functions::FunctionFlags;
use rusqlite::{Connection, OpenFlags};
use serde_json::Value;
use std::time::{Duration, Instant};

/// SQL scalar function performing a shallow top-level JSON merge.
pub(crate) const JSON_MERGE_FN: &str = "json_merge_top";

const MEMORY_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Opens (or creates) the database described by `config`.
///
/// Every pooled connection is bootstrapped; the first one applies pending
/// migrations. An in-memory path always gets a single connection.
///
/// # Side effects
/// - Emits `db_open` logging events with duration and status.
pub fn open_db(config: &StoreConfig) -> DbResult<Db> {
    let started_at = Instant::now();
    info!(
        "event=db_open module=db status=start mode=file pool_size={}",
        config.pool_size
    );

    let result: DbResult<Db> = config
        .validate()
        .map_err(Into::into)
        .and_then(|()| open_file_pool(config));

    match result {
        Ok(db) => {
            info!(
                "event=db_open module=db status=ok mode=file duration_ms={}",
                started_at.elapsed().as_millis()
            );
            Ok(db)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode=file duration_ms={} error={}",
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

/// Opens a private in-memory database with a single connection.
///
/// In-memory databases are per connection, so the pool is always one.
pub fn open_db_in_memory() -> DbResult<Db> {
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode=memory");

    let result: DbResult<Db> = Connection::open_in_memory()
        .map_err(Into::into)
        .and_then(|mut conn| {
            bootstrap_connection(&mut conn, None, MEMORY_BUSY_TIMEOUT_MS)?;
            Ok(Db::from_connections(vec![conn], "memory"))
        });

    match result {
        Ok(db) => {
            info!(
                "event=db_open module=db status=ok mode=memory duration_ms={}",
                started_at.elapsed().as_millis()
            );
            Ok(db)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode=memory duration_ms={} error={}",
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn open_file_pool(config: &StoreConfig) -> DbResult<Db> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_NO_MUTEX
        | OpenFlags::SQLITE_OPEN_URI;

    let (pool_size, mode) = if config.is_in_memory() {
        if config.pool_size > 1 {
            warn!(
                "event=db_open module=db status=clamped mode=memory requested_pool_size={} pool_size=1",
                config.pool_size
            );
        }
        (1, "memory")
    } else {
        (config.pool_size, "file")
    };

    let mut connections = Vec::with_capacity(pool_size);
    for _ in 0..pool_size {
        let mut conn = Connection::open_with_flags(&config.path, flags)?;
        bootstrap_connection(&mut conn, Some(config.journal_mode), config.busy_timeout_ms)?;
        connections.push(conn);
    }

    Ok(Db::from_connections(connections, mode))
}

fn bootstrap_connection(
    conn: &mut Connection,
    journal_mode: Option<JournalMode>,
    busy_timeout_ms: u64,
) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(busy_timeout_ms))?;
    if let Some(mode) = journal_mode {
        conn.execute_batch(&format!("PRAGMA journal_mode = {};", mode.pragma_value()))?;
    }
    register_json_functions(conn)?;
    apply_migrations(conn)?;
    Ok(())
}

fn register_json_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        JSON_MERGE_FN,
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let base = parse_json_arg(&ctx.get::<String>(0)?)?;
            let patch = parse_json_arg(&ctx.get::<String>(1)?)?;
            serde_json::to_string(&merge_top_level(base, patch))
                .map_err(|err| rusqlite::Error::UserFunctionError(Box::new(err)))
        },
    )
}

fn parse_json_arg(raw: &str) -> rusqlite::Result<Value> {
    serde_json::from_str(raw).map_err(|err| rusqlite::Error::UserFunctionError(Box::new(err)))
}

#[cfg(test)]
mod tests {
    use super::open_db_in_memory;
    use crate::db::migrations::latest_version;

    #[test]
    fn in_memory_db_is_migrated_and_has_merge_function() {
        let db = open_db_in_memory().unwrap();
        assert_eq!(db.pool_size(), 1);

        let (version, merged) = db
            .with_connection(|conn| {
                let version: u32 =
                    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
                let merged: String = conn.query_row(
                    "SELECT json_merge_top('{\"a\":1,\"b\":{\"c\":1}}', '{\"b\":{\"d\":2}}');",
                    [],
                    |row| row.get(0),
                )?;
                Ok::<_, crate::db::DbError>((version, merged))
            })
            .unwrap();

        assert_eq!(version, latest_version());
        let merged: serde_json::Value = serde_json::from_str(&merged).unwrap();
        assert_eq!(merged, serde_json::json!({"a": 1, "b": {"d": 2}}));
    }
}
