//! Dataset use-case service.
//!
//! # Responsibility
//! - Provide owner-facing entry points (create, edit, view, publish, clone,
//!   delete) on top of a `DatasetRepository`.
//! - Build validated records and generate identities for new datasets.
//!
//! # Invariants
//! - Every call maps to exactly one repository operation, so each use case
//!   stays inside a single transaction.
//! - Service layer remains storage-agnostic.

use crate::model::dataset::{Dataset, DatasetId, PrincipalId};
use crate::repo::dataset_repo::{DatasetRepository, RepoResult};
use serde_json::Value;
use uuid::Uuid;

/// Request model for creating one dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDataset {
    pub family: i64,
    pub schema: String,
    pub blob: Value,
}

impl NewDataset {
    pub fn new(family: i64, schema: impl Into<String>, blob: Value) -> Self {
        Self {
            family,
            schema: schema.into(),
            blob,
        }
    }
}

/// Use-case service wrapper for dataset operations.
pub struct DatasetService<R: DatasetRepository> {
    repo: R,
}

impl<R: DatasetRepository> DatasetService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates a dataset owned (and created) by `owner`.
    ///
    /// Returns the generated dataset id.
    pub fn create(&self, owner: PrincipalId, request: NewDataset) -> RepoResult<DatasetId> {
        let dataset = Dataset::create_for(owner, request.family, request.schema, request.blob)?;
        self.repo.store(&dataset)?;
        Ok(dataset.id)
    }

    /// Creates several datasets for `owner` atomically.
    ///
    /// Either every id is returned or nothing was stored.
    pub fn create_many(
        &self,
        owner: PrincipalId,
        requests: Vec<NewDataset>,
    ) -> RepoResult<Vec<DatasetId>> {
        let mut datasets = Vec::with_capacity(requests.len());
        for request in requests {
            datasets.push(Dataset::create_for(
                owner,
                request.family,
                request.schema,
                request.blob,
            )?);
        }
        self.repo.batch_store(&datasets)?;
        Ok(datasets.iter().map(|dataset| dataset.id).collect())
    }

    /// Reads a dataset as its owner sees it (projected for partial families).
    pub fn view(&self, id: DatasetId, principal: PrincipalId) -> RepoResult<Dataset> {
        self.repo.smart_get_with_owner(id, principal)
    }

    /// Applies an owner edit using the family's update policy.
    pub fn edit(&self, id: DatasetId, principal: PrincipalId, blob: &Value) -> RepoResult<()> {
        self.repo.smart_update_with_owner(id, blob, principal)
    }

    pub fn publish(&self, id: DatasetId, principal: PrincipalId) -> RepoResult<()> {
        self.repo.mark_published_with_owner(id, principal, true)
    }

    pub fn unpublish(&self, id: DatasetId, principal: PrincipalId) -> RepoResult<()> {
        self.repo.mark_published_with_owner(id, principal, false)
    }

    /// Copies `source` under a generated id with `blob` as its document.
    pub fn clone_with(&self, source: DatasetId, blob: &Value) -> RepoResult<DatasetId> {
        let new_id = Uuid::new_v4();
        self.repo.clone_dataset(source, new_id, blob)?;
        Ok(new_id)
    }

    pub fn delete(&self, id: DatasetId, principal: PrincipalId) -> RepoResult<()> {
        self.repo.delete(id, Some(principal))
    }

    pub fn list_owned(&self, principal: PrincipalId) -> RepoResult<Vec<Dataset>> {
        self.repo.list_all_for_uid(principal)
    }
}
