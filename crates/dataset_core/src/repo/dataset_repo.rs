//! Dataset repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide the public dataset operations: guarded and unguarded reads,
//!   content mutations, publish transitions, lifecycle orchestration.
//! - Dispatch between full replace and merge patch by schema family.
//!
//! # Invariants
//! - One operation, one transaction; any error rolls everything back.
//! - `NotOwner` is returned before any mutation statement runs.
//! - The family of a dataset is re-read inside the dispatching transaction.

use crate::db::{Db, DbError};
use crate::model::dataset::{Dataset, DatasetId, DatasetValidationError, PrincipalId};
use crate::model::family::lookup_family;
use log::{debug, error, info, warn};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for dataset persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    /// No dataset matched the target id.
    NotFound(DatasetId),
    /// The dataset exists but the acting principal does not own it.
    NotOwner {
        id: DatasetId,
        principal: PrincipalId,
    },
    Validation(DatasetValidationError),
    Db(DbError),
    /// A persisted row could not be decoded.
    InvalidData(String),
}

/// Coarse error classification for callers mapping errors to responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    NotOwner,
    Validation,
    Storage,
}

impl RepoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::NotOwner { .. } => ErrorKind::NotOwner,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Db(_) | Self::InvalidData(_) => ErrorKind::Storage,
        }
    }

    fn code(&self) -> &'static str {
        match self.kind() {
            ErrorKind::NotFound => "not_found",
            ErrorKind::NotOwner => "not_owner",
            ErrorKind::Validation => "validation",
            ErrorKind::Storage => "storage",
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "dataset not found: {id}"),
            Self::NotOwner { id, principal } => {
                write!(f, "dataset {id} is not owned by {principal}")
            }
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted dataset data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound(_) | Self::NotOwner { .. } | Self::InvalidData(_) => None,
        }
    }
}

impl From<DatasetValidationError> for RepoError {
    fn from(value: DatasetValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface for dataset operations.
pub trait DatasetRepository {
    /// Fails unless `principal` owns the dataset at `id`.
    fn check_owner(&self, id: DatasetId, principal: PrincipalId) -> RepoResult<()>;
    /// Reassigns ownership; leaves content, `seq` and publish state alone.
    fn change_owner_to(&self, id: DatasetId, new_owner: PrincipalId) -> RepoResult<()>;
    fn store(&self, dataset: &Dataset) -> RepoResult<()>;
    /// Inserts every dataset or none of them.
    fn batch_store(&self, datasets: &[Dataset]) -> RepoResult<()>;
    fn update(&self, id: DatasetId, blob: &Value) -> RepoResult<()>;
    fn update_with_owner(&self, id: DatasetId, blob: &Value, owner: PrincipalId)
        -> RepoResult<()>;
    /// Full replace on behalf of a service; stamps `synced`, not `modified`.
    fn update_by_service(&self, id: DatasetId, blob: &Value) -> RepoResult<()>;
    fn patch(&self, id: DatasetId, patch: &Value) -> RepoResult<()>;
    fn patch_with_owner(&self, id: DatasetId, patch: &Value, owner: PrincipalId)
        -> RepoResult<()>;
    /// Guarded read, projected to the family key for partial families.
    fn smart_get_with_owner(&self, id: DatasetId, owner: PrincipalId) -> RepoResult<Dataset>;
    /// Guarded write: merge patch for partial families, full replace otherwise.
    fn smart_update_with_owner(
        &self,
        id: DatasetId,
        blob: &Value,
        owner: PrincipalId,
    ) -> RepoResult<()>;
    /// Replaces the document and marks the dataset published in one write.
    fn store_published(&self, id: DatasetId, blob: &Value) -> RepoResult<()>;
    /// Copies `source` to `new_id` with a fresh document.
    fn clone_dataset(&self, source: DatasetId, new_id: DatasetId, blob: &Value)
        -> RepoResult<()>;
    fn mark_published(&self, id: DatasetId, published: bool) -> RepoResult<()>;
    fn mark_published_with_owner(
        &self,
        id: DatasetId,
        owner: PrincipalId,
        published: bool,
    ) -> RepoResult<()>;
    fn get(&self, id: DatasetId) -> RepoResult<Dataset>;
    fn get_with_owner(&self, id: DatasetId, owner: PrincipalId) -> RepoResult<Dataset>;
    /// Physically removes a dataset, checking ownership first when `owner`
    /// is given.
    fn delete(&self, id: DatasetId, owner: Option<PrincipalId>) -> RepoResult<()>;
    /// Lists datasets owned by `owner` without their documents.
    fn list_all_for_uid(&self, owner: PrincipalId) -> RepoResult<Vec<Dataset>>;
}

/// SQLite-backed dataset repository.
pub struct SqliteDatasetRepository<'db> {
    db: &'db Db,
}

impl<'db> SqliteDatasetRepository<'db> {
    pub fn new(db: &'db Db) -> Self {
        Self { db }
    }
}

impl DatasetRepository for SqliteDatasetRepository<'_> {
    fn check_owner(&self, id: DatasetId, principal: PrincipalId) -> RepoResult<()> {
        let result = self.db.read_tx(|tx| tx.check_owner(id, principal));
        log_outcome("dataset_check_owner", id, &result);
        result
    }

    fn change_owner_to(&self, id: DatasetId, new_owner: PrincipalId) -> RepoResult<()> {
        let result = self.db.write_tx(|tx| tx.change_owner(id, new_owner));
        log_outcome("dataset_change_owner", id, &result);
        result
    }

    fn store(&self, dataset: &Dataset) -> RepoResult<()> {
        let result = self.db.write_tx(|tx| tx.insert_dataset(dataset));
        log_outcome("dataset_store", dataset.id, &result);
        result
    }

    fn batch_store(&self, datasets: &[Dataset]) -> RepoResult<()> {
        let result: RepoResult<()> = self.db.write_tx(|tx| {
            for dataset in datasets {
                tx.insert_dataset(dataset)?;
            }
            Ok(())
        });

        match &result {
            Ok(()) => info!(
                "event=dataset_batch_store module=repo status=ok count={}",
                datasets.len()
            ),
            Err(err) => error!(
                "event=dataset_batch_store module=repo status=error count={} error_code={} error={}",
                datasets.len(),
                err.code(),
                err
            ),
        }
        result
    }

    fn update(&self, id: DatasetId, blob: &Value) -> RepoResult<()> {
        let result = self.db.write_tx(|tx| tx.update_dataset(id, blob));
        log_outcome("dataset_update", id, &result);
        result
    }

    fn update_with_owner(
        &self,
        id: DatasetId,
        blob: &Value,
        owner: PrincipalId,
    ) -> RepoResult<()> {
        let result = self.db.write_tx(|tx| {
            tx.check_owner(id, owner)?;
            tx.update_dataset(id, blob)
        });
        log_outcome("dataset_update", id, &result);
        result
    }

    fn update_by_service(&self, id: DatasetId, blob: &Value) -> RepoResult<()> {
        let result = self.db.write_tx(|tx| tx.update_dataset_by_service(id, blob));
        log_outcome("dataset_update_by_service", id, &result);
        result
    }

    fn patch(&self, id: DatasetId, patch: &Value) -> RepoResult<()> {
        let result = self.db.write_tx(|tx| tx.patch_dataset(id, patch));
        log_outcome("dataset_patch", id, &result);
        result
    }

    fn patch_with_owner(
        &self,
        id: DatasetId,
        patch: &Value,
        owner: PrincipalId,
    ) -> RepoResult<()> {
        let result = self.db.write_tx(|tx| {
            tx.check_owner(id, owner)?;
            tx.patch_dataset(id, patch)
        });
        log_outcome("dataset_patch", id, &result);
        result
    }

    fn smart_get_with_owner(&self, id: DatasetId, owner: PrincipalId) -> RepoResult<Dataset> {
        let result = self.db.read_tx(|tx| {
            tx.check_owner(id, owner)?;
            let family = lookup_family(tx.family_of(id)?).map_err(DatasetValidationError::from)?;
            if family.is_partial() {
                tx.get_dataset(id, Some(family.key()))
            } else {
                tx.get_dataset(id, None)
            }
        });
        log_outcome("dataset_smart_get", id, &result);
        result
    }

    fn smart_update_with_owner(
        &self,
        id: DatasetId,
        blob: &Value,
        owner: PrincipalId,
    ) -> RepoResult<()> {
        let result = self.db.write_tx(|tx| {
            tx.check_owner(id, owner)?;
            let family = lookup_family(tx.family_of(id)?).map_err(DatasetValidationError::from)?;
            debug!(
                "event=dataset_smart_update module=repo status=dispatch id={} family={} partial={}",
                id,
                family,
                family.is_partial()
            );
            if family.is_partial() {
                tx.patch_dataset(id, blob)
            } else {
                tx.update_dataset(id, blob)
            }
        });
        log_outcome("dataset_smart_update", id, &result);
        result
    }

    fn store_published(&self, id: DatasetId, blob: &Value) -> RepoResult<()> {
        let result = self.db.write_tx(|tx| tx.store_published(id, blob));
        log_outcome("dataset_store_published", id, &result);
        result
    }

    fn clone_dataset(
        &self,
        source: DatasetId,
        new_id: DatasetId,
        blob: &Value,
    ) -> RepoResult<()> {
        let result = self.db.write_tx(|tx| tx.clone_dataset(source, new_id, blob));
        log_outcome("dataset_clone", source, &result);
        result
    }

    fn mark_published(&self, id: DatasetId, published: bool) -> RepoResult<()> {
        let result = self.db.write_tx(|tx| tx.mark_published(id, published));
        log_outcome("dataset_mark_published", id, &result);
        result
    }

    fn mark_published_with_owner(
        &self,
        id: DatasetId,
        owner: PrincipalId,
        published: bool,
    ) -> RepoResult<()> {
        let result = self.db.write_tx(|tx| {
            tx.check_owner(id, owner)?;
            tx.mark_published(id, published)
        });
        log_outcome("dataset_mark_published", id, &result);
        result
    }

    fn get(&self, id: DatasetId) -> RepoResult<Dataset> {
        let result = self.db.read_tx(|tx| tx.get_dataset(id, None));
        log_outcome("dataset_get", id, &result);
        result
    }

    fn get_with_owner(&self, id: DatasetId, owner: PrincipalId) -> RepoResult<Dataset> {
        let result = self.db.read_tx(|tx| {
            tx.check_owner(id, owner)?;
            tx.get_dataset(id, None)
        });
        log_outcome("dataset_get", id, &result);
        result
    }

    fn delete(&self, id: DatasetId, owner: Option<PrincipalId>) -> RepoResult<()> {
        let result = self.db.write_tx(|tx| {
            if let Some(owner) = owner {
                tx.check_owner(id, owner)?;
            }
            tx.delete_dataset(id)
        });
        log_outcome("dataset_delete", id, &result);
        result
    }

    fn list_all_for_uid(&self, owner: PrincipalId) -> RepoResult<Vec<Dataset>> {
        let result = self.db.read_tx(|tx| tx.list_for_owner(owner));
        match &result {
            Ok(datasets) => debug!(
                "event=dataset_list module=repo status=ok owner={} count={}",
                owner,
                datasets.len()
            ),
            Err(err) => error!(
                "event=dataset_list module=repo status=error owner={} error_code={} error={}",
                owner,
                err.code(),
                err
            ),
        }
        result
    }
}

/// Logs the outcome of one dataset operation. Expected refusals (absent
/// record, foreign owner, bad document) are warnings; storage failures are
/// errors.
fn log_outcome<T>(event: &str, id: DatasetId, result: &RepoResult<T>) {
    match result {
        Ok(_) => debug!("event={} module=repo status=ok id={}", event, id),
        Err(err) if err.kind() == ErrorKind::Storage => error!(
            "event={} module=repo status=error id={} error_code={} error={}",
            event,
            id,
            err.code(),
            err
        ),
        Err(err) => warn!(
            "event={} module=repo status=rejected id={} error_code={}",
            event,
            id,
            err.code()
        ),
    }
}
