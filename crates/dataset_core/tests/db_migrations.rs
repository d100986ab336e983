use dataset_core::db::migrations::latest_version;
use dataset_core::{
    open_db, open_db_in_memory, Dataset, DatasetRepository, Db, DbError, SqliteDatasetRepository,
    StoreConfig, FAMILY_GENERIC,
};
use rusqlite::Connection;
use serde_json::json;
use uuid::Uuid;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let db = open_db_in_memory().unwrap();

    assert_eq!(db.mode(), "memory");
    assert_eq!(schema_version(&db), latest_version());
    assert_object_exists(&db, "table", "datasets");
    assert_object_exists(&db, "index", "idx_datasets_owner");
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::new(dir.path().join("datasets.sqlite3"));

    let first = open_db(&config).unwrap();
    assert_eq!(first.pool_size(), config.pool_size);
    assert_eq!(schema_version(&first), latest_version());
    drop(first);

    let second = open_db(&config).unwrap();
    assert_eq!(schema_version(&second), latest_version());
    assert_object_exists(&second, "table", "datasets");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.sqlite3");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&StoreConfig::new(&path)).err().unwrap();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn invalid_config_is_rejected_before_opening() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = StoreConfig::new(dir.path().join("never.sqlite3"));
    config.pool_size = 0;

    let err = open_db(&config).err().unwrap();
    assert!(matches!(err, DbError::Config(_)));
    assert!(!dir.path().join("never.sqlite3").exists());
}

#[test]
fn in_memory_path_uses_one_shared_connection() {
    let config = StoreConfig::new(":memory:");
    assert!(config.pool_size > 1);

    let db = open_db(&config).unwrap();
    assert_eq!(db.pool_size(), 1);
    assert_eq!(db.mode(), "memory");

    let repo = SqliteDatasetRepository::new(&db);
    let dataset =
        Dataset::create_for(Uuid::new_v4(), FAMILY_GENERIC, "dc-1", json!({"n": 1})).unwrap();
    repo.store(&dataset).unwrap();
    for _ in 0..config.pool_size {
        assert_eq!(repo.get(dataset.id).unwrap().blob(), &json!({"n": 1}));
    }
}

fn schema_version(db: &Db) -> u32 {
    db.with_connection(|conn| {
        Ok::<_, DbError>(conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?)
    })
    .unwrap()
}

fn assert_object_exists(db: &Db, kind: &str, name: &str) {
    let exists: i64 = db
        .with_connection(|conn| {
            Ok::<_, DbError>(conn.query_row(
                "SELECT EXISTS(
                    SELECT 1
                    FROM sqlite_master
                    WHERE type = ?1 AND name = ?2
                );",
                [kind, name],
                |row| row.get(0),
            )?)
        })
        .unwrap();
    assert_eq!(exists, 1, "{kind} {name} does not exist");
}
