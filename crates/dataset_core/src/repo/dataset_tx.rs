//! In-transaction dataset primitives.
//!
//! # Responsibility
//! - Ownership guard, family lookup, reads and single-statement mutations,
//!   each executed on an already open `Tx`.
//!
//! # Invariants
//! - Every mutation matches by `id` only and treats zero affected rows as
//!   `NotFound`.
//! - Content mutations bump `seq` by exactly one; publish-only and owner-only
//!   updates leave it alone.
//! - No primitive commits; the caller owns the transaction boundary.

use crate::db::Tx;
use crate::model::dataset::{validate_document, Dataset, DatasetId, PrincipalId};
use crate::model::document::json_path_for_key;
use crate::repo::dataset_repo::{RepoError, RepoResult};
use rusqlite::{params, Row};
use serde_json::Value;

macro_rules! now_ms {
    () => {
        "CAST(unixepoch('subsec') * 1000 AS INTEGER)"
    };
}

macro_rules! dataset_columns {
    () => {
        "id, creator, owner, created, modified, synced, published, valid, family, schema, seq"
    };
}

const SELECT_WHOLE_SQL: &str = concat!(
    "SELECT ",
    dataset_columns!(),
    ", blob FROM datasets WHERE id = ?1;"
);

const SELECT_PROJECTED_SQL: &str = concat!(
    "SELECT ",
    dataset_columns!(),
    ", blob -> ?2 AS blob FROM datasets WHERE id = ?1;"
);

const LIST_FOR_OWNER_SQL: &str = concat!(
    "SELECT ",
    dataset_columns!(),
    ", NULL AS blob FROM datasets WHERE owner = ?1 ORDER BY created ASC, id ASC;"
);

const UPDATE_SQL: &str = concat!(
    "UPDATE datasets SET modified = ",
    now_ms!(),
    ", seq = seq + 1, blob = ?2 WHERE id = ?1;"
);

const UPDATE_BY_SERVICE_SQL: &str = concat!(
    "UPDATE datasets SET synced = ",
    now_ms!(),
    ", seq = seq + 1, blob = ?2 WHERE id = ?1;"
);

const PATCH_SQL: &str = concat!(
    "UPDATE datasets SET modified = ",
    now_ms!(),
    ", seq = seq + 1, blob = json_merge_top(blob, ?2) WHERE id = ?1;"
);

const STORE_PUBLISHED_SQL: &str = concat!(
    "UPDATE datasets SET blob = ?2, published = 1, synced = ",
    now_ms!(),
    ", seq = seq + 1 WHERE id = ?1;"
);

const MARK_PUBLISHED_SQL: &str = concat!(
    "UPDATE datasets SET published = ?2, synced = ",
    now_ms!(),
    " WHERE id = ?1;"
);

const CLONE_SQL: &str = "INSERT INTO datasets (
        id, creator, owner, created, modified, synced, published, valid, family, schema, blob
    )
    SELECT ?2, creator, owner, created, modified, synced, published, valid, family, schema, ?3
    FROM datasets
    WHERE id = ?1;";

/// Which form of the document a read returns.
#[derive(Debug, Clone, Copy)]
enum BlobShape {
    /// Whole document, validated by the document model.
    Whole,
    /// Sub-document or no document; only family/schema are validated.
    Projected,
}

/// Raw column values of one `datasets` row.
struct DatasetRow {
    id: DatasetId,
    creator: PrincipalId,
    owner: PrincipalId,
    created: i64,
    modified: i64,
    synced: Option<i64>,
    published: bool,
    valid: bool,
    family: i64,
    schema: String,
    seq: i64,
    blob: Option<String>,
}

impl DatasetRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            creator: row.get("creator")?,
            owner: row.get("owner")?,
            created: row.get("created")?,
            modified: row.get("modified")?,
            synced: row.get("synced")?,
            published: row.get("published")?,
            valid: row.get("valid")?,
            family: row.get("family")?,
            schema: row.get("schema")?,
            seq: row.get("seq")?,
            blob: row.get("blob")?,
        })
    }

    fn into_dataset(self, shape: BlobShape) -> RepoResult<Dataset> {
        let blob = match self.blob {
            Some(text) => serde_json::from_str(&text).map_err(|err| {
                RepoError::InvalidData(format!(
                    "invalid JSON in datasets.blob for {}: {err}",
                    self.id
                ))
            })?,
            None => Value::Null,
        };

        let mut dataset = Dataset::empty(self.id, self.creator, self.owner);
        match shape {
            BlobShape::Whole => dataset.set_data(self.family, self.schema, blob)?,
            BlobShape::Projected => dataset.set_projected_data(self.family, self.schema, blob)?,
        }
        dataset.set_valid(self.valid);
        dataset.created = self.created;
        dataset.modified = self.modified;
        dataset.synced = self.synced;
        dataset.published = self.published;
        dataset.seq = self.seq;
        Ok(dataset)
    }
}

impl Tx<'_> {
    /// Fails unless `principal` currently owns the dataset at `id`.
    ///
    /// # Errors
    /// - `NotFound` when no dataset has this id.
    /// - `NotOwner` when it exists but is owned by someone else.
    pub fn check_owner(&self, id: DatasetId, principal: PrincipalId) -> RepoResult<()> {
        let is_owner: Option<bool> = self.query_row(
            "SELECT owner = ?2 FROM datasets WHERE id = ?1;",
            params![id, principal],
            |row| row.get(0),
        )?;

        match is_owner {
            None => Err(RepoError::NotFound(id)),
            Some(false) => Err(RepoError::NotOwner { id, principal }),
            Some(true) => Ok(()),
        }
    }

    /// Reads the persisted family id of the dataset at `id`.
    pub(crate) fn family_of(&self, id: DatasetId) -> RepoResult<i64> {
        self.query_row(
            "SELECT family FROM datasets WHERE id = ?1;",
            [id],
            |row| row.get(0),
        )?
        .ok_or(RepoError::NotFound(id))
    }

    /// Reads one dataset, optionally projected to the top-level `key`.
    pub(crate) fn get_dataset(&self, id: DatasetId, key: Option<&str>) -> RepoResult<Dataset> {
        let (row, shape) = match key.filter(|key| !key.is_empty()) {
            None => (
                self.query_row(SELECT_WHOLE_SQL, [id], DatasetRow::from_row)?,
                BlobShape::Whole,
            ),
            Some(key) => (
                self.query_row(
                    SELECT_PROJECTED_SQL,
                    params![id, json_path_for_key(key)],
                    DatasetRow::from_row,
                )?,
                BlobShape::Projected,
            ),
        };

        row.ok_or(RepoError::NotFound(id))?.into_dataset(shape)
    }

    pub(crate) fn list_for_owner(&self, owner: PrincipalId) -> RepoResult<Vec<Dataset>> {
        let mut stmt = self.prepare(LIST_FOR_OWNER_SQL)?;
        let rows = stmt.query_map([owner], DatasetRow::from_row)?;

        let mut datasets = Vec::new();
        for row in rows {
            datasets.push(row?.into_dataset(BlobShape::Projected)?);
        }
        Ok(datasets)
    }

    pub(crate) fn insert_dataset(&self, dataset: &Dataset) -> RepoResult<()> {
        let blob = encode_document(dataset.blob())?;
        self.execute(
            "INSERT INTO datasets (id, creator, owner, valid, family, schema, blob)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                dataset.id,
                dataset.creator,
                dataset.owner,
                dataset.valid(),
                dataset.family().id(),
                dataset.schema(),
                blob,
            ],
        )?;
        Ok(())
    }

    /// Owner-triggered full replace.
    pub(crate) fn update_dataset(&self, id: DatasetId, blob: &Value) -> RepoResult<()> {
        self.execute_one(id, UPDATE_SQL, blob)
    }

    /// Service-triggered full replace; stamps `synced` instead of `modified`.
    pub(crate) fn update_dataset_by_service(&self, id: DatasetId, blob: &Value) -> RepoResult<()> {
        self.execute_one(id, UPDATE_BY_SERVICE_SQL, blob)
    }

    /// Owner-triggered shallow merge of `patch` into the stored document.
    pub(crate) fn patch_dataset(&self, id: DatasetId, patch: &Value) -> RepoResult<()> {
        self.execute_one(id, PATCH_SQL, patch)
    }

    pub(crate) fn store_published(&self, id: DatasetId, blob: &Value) -> RepoResult<()> {
        self.execute_one(id, STORE_PUBLISHED_SQL, blob)
    }

    pub(crate) fn mark_published(&self, id: DatasetId, published: bool) -> RepoResult<()> {
        let changed = self.execute(MARK_PUBLISHED_SQL, params![id, published])?;
        expect_one_row(id, changed)
    }

    pub(crate) fn change_owner(&self, id: DatasetId, new_owner: PrincipalId) -> RepoResult<()> {
        let changed = self.execute(
            "UPDATE datasets SET owner = ?2 WHERE id = ?1;",
            params![id, new_owner],
        )?;
        expect_one_row(id, changed)
    }

    pub(crate) fn clone_dataset(
        &self,
        source: DatasetId,
        new_id: DatasetId,
        blob: &Value,
    ) -> RepoResult<()> {
        let blob = encode_document(blob)?;
        let inserted = self.execute(CLONE_SQL, params![source, new_id, blob])?;
        expect_one_row(source, inserted)
    }

    pub(crate) fn delete_dataset(&self, id: DatasetId) -> RepoResult<()> {
        let deleted = self.execute("DELETE FROM datasets WHERE id = ?1;", [id])?;
        expect_one_row(id, deleted)
    }

    fn execute_one(&self, id: DatasetId, sql: &str, blob: &Value) -> RepoResult<()> {
        let blob = encode_document(blob)?;
        let changed = self.execute(sql, params![id, blob])?;
        expect_one_row(id, changed)
    }
}

fn expect_one_row(id: DatasetId, affected: usize) -> RepoResult<()> {
    if affected != 1 {
        return Err(RepoError::NotFound(id));
    }
    Ok(())
}

/// Validates a document for writing and serializes it for the `blob` column.
fn encode_document(blob: &Value) -> RepoResult<String> {
    validate_document(blob)?;
    serde_json::to_string(blob)
        .map_err(|err| RepoError::InvalidData(format!("unserializable document: {err}")))
}
