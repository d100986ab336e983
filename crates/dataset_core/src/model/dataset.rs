//! Dataset domain model.
//!
//! # Responsibility
//! - Define the persisted dataset record and its document accessors.
//! - Validate family/schema/document triples before they reach storage.
//!
//! # Invariants
//! - `family`, `schema` and `blob` are only populated through `set_data`
//!   (or the projection variant used by partial reads).
//! - A whole document is always a JSON object.
//! - `valid` reflects the family's structural check, not the write path.

use crate::model::document::as_object;
use crate::model::family::{lookup_family, Family, FamilyError};
use serde::Serialize;
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of a dataset record.
pub type DatasetId = Uuid;

/// Identifier of a principal (user or service) acting on datasets.
pub type PrincipalId = Uuid;

/// One dataset record as stored in `datasets`.
///
/// Timestamps are Unix epoch milliseconds assigned by storage; values set on
/// a record passed to `store` are ignored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dataset {
    pub id: DatasetId,
    pub creator: PrincipalId,
    pub owner: PrincipalId,
    pub created: i64,
    pub modified: i64,
    /// Last service-side write or publish, `None` until one happens.
    pub synced: Option<i64>,
    pub published: bool,
    /// Content version, bumped by every accepted content write.
    pub seq: i64,
    family: Family,
    schema: String,
    blob: Value,
    valid: bool,
}

impl Dataset {
    /// Builds a new record with caller-provided identity and document parts.
    ///
    /// # Errors
    /// - Returns `DatasetValidationError` when the parts do not validate.
    pub fn new(
        id: DatasetId,
        creator: PrincipalId,
        owner: PrincipalId,
        family: i64,
        schema: impl Into<String>,
        blob: Value,
    ) -> Result<Self, DatasetValidationError> {
        let mut dataset = Self::empty(id, creator, owner);
        dataset.set_data(family, schema, blob)?;
        Ok(dataset)
    }

    /// Builds a new record for `owner` with a generated id; the owner is
    /// also recorded as creator.
    pub fn create_for(
        owner: PrincipalId,
        family: i64,
        schema: impl Into<String>,
        blob: Value,
    ) -> Result<Self, DatasetValidationError> {
        Self::new(Uuid::new_v4(), owner, owner, family, schema, blob)
    }

    pub(crate) fn empty(id: DatasetId, creator: PrincipalId, owner: PrincipalId) -> Self {
        Self {
            id,
            creator,
            owner,
            created: 0,
            modified: 0,
            synced: None,
            published: false,
            seq: 0,
            family: Family::Generic,
            schema: String::new(),
            blob: Value::Object(Map::new()),
            valid: false,
        }
    }

    /// Validates and installs the document parts.
    ///
    /// On success `valid` is recomputed from the family's structural check.
    /// On failure the record is left unchanged.
    pub fn set_data(
        &mut self,
        family: i64,
        schema: impl Into<String>,
        blob: Value,
    ) -> Result<(), DatasetValidationError> {
        let schema = schema.into();
        let family = resolve_family_schema(family, &schema)?;
        validate_document(&blob)?;

        self.valid = structurally_valid(family, &blob);
        self.family = family;
        self.schema = schema;
        self.blob = blob;
        Ok(())
    }

    /// Installs a projected sub-document (or no document at all).
    ///
    /// Family and schema are still checked; the document shape is not, since
    /// shape rules apply to whole documents only. `valid` is left untouched.
    pub(crate) fn set_projected_data(
        &mut self,
        family: i64,
        schema: impl Into<String>,
        blob: Value,
    ) -> Result<(), DatasetValidationError> {
        let schema = schema.into();
        let family = resolve_family_schema(family, &schema)?;
        self.family = family;
        self.schema = schema;
        self.blob = blob;
        Ok(())
    }

    pub fn set_valid(&mut self, valid: bool) {
        self.valid = valid;
    }

    pub fn family(&self) -> Family {
        self.family
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn blob(&self) -> &Value {
        &self.blob
    }

    pub fn valid(&self) -> bool {
        self.valid
    }
}

/// Checks that a whole document submitted for a write is a JSON object.
pub fn validate_document(blob: &Value) -> Result<(), DatasetValidationError> {
    if as_object(blob).is_none() {
        return Err(DatasetValidationError::NotAnObject);
    }
    Ok(())
}

fn resolve_family_schema(family: i64, schema: &str) -> Result<Family, DatasetValidationError> {
    let family = lookup_family(family)?;
    if !family.accepts_schema(schema) {
        return Err(DatasetValidationError::UnsupportedSchema {
            family,
            schema: schema.to_string(),
        });
    }
    Ok(family)
}

fn structurally_valid(family: Family, blob: &Value) -> bool {
    if !family.is_partial() {
        return true;
    }
    blob.get(family.key()).and_then(as_object).is_some()
}

/// Document model validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetValidationError {
    UnknownFamily(FamilyError),
    UnsupportedSchema { family: Family, schema: String },
    NotAnObject,
}

impl Display for DatasetValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownFamily(err) => write!(f, "{err}"),
            Self::UnsupportedSchema { family, schema } => {
                write!(f, "schema `{schema}` is not supported by family {family}")
            }
            Self::NotAnObject => write!(f, "dataset document must be a JSON object"),
        }
    }
}

impl Error for DatasetValidationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::UnknownFamily(err) => Some(err),
            Self::UnsupportedSchema { .. } | Self::NotAnObject => None,
        }
    }
}

impl From<FamilyError> for DatasetValidationError {
    fn from(value: FamilyError) -> Self {
        Self::UnknownFamily(value)
    }
}
