use dataset_core::{
    open_db_in_memory, Dataset, DatasetRepository, DbError, ErrorKind, Family,
    SqliteDatasetRepository, FAMILY_GENERIC, FAMILY_METAX,
};
use serde_json::{json, Value};
use uuid::Uuid;

#[test]
fn smart_update_merges_partial_family_documents() {
    let db = open_db_in_memory().unwrap();
    let repo = SqliteDatasetRepository::new(&db);

    let owner = Uuid::new_v4();
    let dataset = metax_dataset(
        owner,
        json!({
            "research_dataset": {"title": "a", "keywords": ["x"]},
            "preservation": {"state": 0}
        }),
    );
    repo.store(&dataset).unwrap();
    db.with_connection(|conn| {
        Ok::<_, DbError>(conn.execute(
            "UPDATE datasets SET modified = 0 WHERE id = ?1;",
            [dataset.id],
        )?)
    })
    .unwrap();

    repo.smart_update_with_owner(
        dataset.id,
        &json!({"research_dataset": {"title": "b"}}),
        owner,
    )
    .unwrap();

    let loaded = repo.get(dataset.id).unwrap();
    assert_eq!(
        loaded.blob(),
        &json!({
            "research_dataset": {"title": "b"},
            "preservation": {"state": 0}
        })
    );
    assert_eq!(loaded.seq, 1);
    assert!(loaded.modified > 0);
    assert_eq!(loaded.synced, None);
}

#[test]
fn smart_update_replaces_generic_documents() {
    let db = open_db_in_memory().unwrap();
    let repo = SqliteDatasetRepository::new(&db);

    let owner = Uuid::new_v4();
    let dataset =
        Dataset::create_for(owner, FAMILY_GENERIC, "dc-1", json!({"title": "a", "extra": 1}))
            .unwrap();
    repo.store(&dataset).unwrap();

    repo.smart_update_with_owner(dataset.id, &json!({"title": "b"}), owner)
        .unwrap();

    let loaded = repo.get(dataset.id).unwrap();
    assert_eq!(loaded.blob(), &json!({"title": "b"}));
    assert_eq!(loaded.seq, 1);
}

#[test]
fn smart_get_projects_partial_family_to_its_key() {
    let db = open_db_in_memory().unwrap();
    let repo = SqliteDatasetRepository::new(&db);

    let owner = Uuid::new_v4();
    let dataset = metax_dataset(
        owner,
        json!({
            "research_dataset": {"title": "visible"},
            "internal": {"hidden": true}
        }),
    );
    repo.store(&dataset).unwrap();

    let projected = repo.smart_get_with_owner(dataset.id, owner).unwrap();
    assert_eq!(projected.blob(), &json!({"title": "visible"}));
    assert_eq!(projected.family(), Family::Metax);
    assert_eq!(projected.schema(), "metax-ida");
    assert!(projected.valid());
    assert_eq!(projected.owner, owner);

    let whole = repo.get(dataset.id).unwrap();
    assert_eq!(whole.blob(), dataset.blob());
}

#[test]
fn smart_get_of_missing_partial_key_yields_null() {
    let db = open_db_in_memory().unwrap();
    let repo = SqliteDatasetRepository::new(&db);

    let owner = Uuid::new_v4();
    let dataset = metax_dataset(owner, json!({"other": 1}));
    repo.store(&dataset).unwrap();

    let projected = repo.smart_get_with_owner(dataset.id, owner).unwrap();
    assert_eq!(projected.blob(), &Value::Null);
    assert!(!projected.valid());
}

#[test]
fn smart_get_returns_whole_generic_document() {
    let db = open_db_in_memory().unwrap();
    let repo = SqliteDatasetRepository::new(&db);

    let owner = Uuid::new_v4();
    let blob = json!({"research_dataset": {"title": "not special here"}, "n": 1});
    let dataset = Dataset::create_for(owner, FAMILY_GENERIC, "dc-1", blob.clone()).unwrap();
    repo.store(&dataset).unwrap();

    let loaded = repo.smart_get_with_owner(dataset.id, owner).unwrap();
    assert_eq!(loaded.blob(), &blob);
}

#[test]
fn smart_update_with_unknown_stored_family_changes_nothing() {
    let db = open_db_in_memory().unwrap();
    let repo = SqliteDatasetRepository::new(&db);

    let owner = Uuid::new_v4();
    let dataset = metax_dataset(owner, json!({"research_dataset": {}}));
    repo.store(&dataset).unwrap();
    db.with_connection(|conn| {
        Ok::<_, DbError>(conn.execute(
            "UPDATE datasets SET family = 99 WHERE id = ?1;",
            [dataset.id],
        )?)
    })
    .unwrap();

    let err = repo
        .smart_update_with_owner(dataset.id, &json!({"research_dataset": {"a": 1}}), owner)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let (seq, blob): (i64, String) = db
        .with_connection(|conn| {
            Ok::<_, DbError>(conn.query_row(
                "SELECT seq, blob FROM datasets WHERE id = ?1;",
                [dataset.id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?)
        })
        .unwrap();
    assert_eq!(seq, 0);
    assert_eq!(
        serde_json::from_str::<Value>(&blob).unwrap(),
        json!({"research_dataset": {}})
    );
}

#[test]
fn smart_update_rejects_non_object_document() {
    let db = open_db_in_memory().unwrap();
    let repo = SqliteDatasetRepository::new(&db);

    let owner = Uuid::new_v4();
    let dataset = metax_dataset(owner, json!({"research_dataset": {}}));
    repo.store(&dataset).unwrap();

    let err = repo
        .smart_update_with_owner(dataset.id, &json!("plain string"), owner)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(repo.get(dataset.id).unwrap().seq, 0);
}

fn metax_dataset(owner: Uuid, blob: Value) -> Dataset {
    Dataset::create_for(owner, FAMILY_METAX, "metax-ida", blob).unwrap()
}
