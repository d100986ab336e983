use dataset_core::{
    open_db, Dataset, DatasetRepository, SqliteDatasetRepository, StoreConfig, FAMILY_GENERIC,
};
use serde_json::{json, Map, Value};
use std::thread;
use uuid::Uuid;

const WRITERS: usize = 4;
const PATCHES_PER_WRITER: i64 = 25;

#[test]
fn concurrent_patches_are_serialized_without_lost_updates() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::new(dir.path().join("concurrent.sqlite3"));
    let db = open_db(&config).unwrap();
    assert_eq!(db.pool_size(), config.pool_size);

    let owner = Uuid::new_v4();
    let dataset = Dataset::create_for(owner, FAMILY_GENERIC, "dc-1", json!({})).unwrap();
    SqliteDatasetRepository::new(&db).store(&dataset).unwrap();

    thread::scope(|scope| {
        for writer in 0..WRITERS {
            let db = &db;
            let id = dataset.id;
            scope.spawn(move || {
                let repo = SqliteDatasetRepository::new(db);
                for n in 0..PATCHES_PER_WRITER {
                    let mut patch = Map::new();
                    patch.insert(format!("writer{writer}"), json!(n));
                    repo.patch_with_owner(id, &Value::Object(patch), owner)
                        .unwrap();
                }
            });
        }
    });

    let loaded = SqliteDatasetRepository::new(&db).get(dataset.id).unwrap();
    assert_eq!(loaded.seq, WRITERS as i64 * PATCHES_PER_WRITER);
    for writer in 0..WRITERS {
        assert_eq!(
            loaded.blob()[format!("writer{writer}")],
            json!(PATCHES_PER_WRITER - 1)
        );
    }
}

#[test]
fn file_backed_store_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::new(dir.path().join("reopen.sqlite3"));

    let owner = Uuid::new_v4();
    let dataset =
        Dataset::create_for(owner, FAMILY_GENERIC, "dc-1", json!({"title": "kept"})).unwrap();
    {
        let db = open_db(&config).unwrap();
        let repo = SqliteDatasetRepository::new(&db);
        repo.store(&dataset).unwrap();
        repo.patch(dataset.id, &json!({"extra": true})).unwrap();
    }

    let db = open_db(&config).unwrap();
    let loaded = SqliteDatasetRepository::new(&db).get(dataset.id).unwrap();
    assert_eq!(loaded.blob(), &json!({"title": "kept", "extra": true}));
    assert_eq!(loaded.seq, 1);
}
