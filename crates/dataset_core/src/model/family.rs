//! Schema family registry.
//!
//! # Responsibility
//! - Enumerate the schema families known to this build.
//! - Expose per-family update policy (`is_partial`) and projection key.
//!
//! # Invariants
//! - The family table is closed: ids outside it are rejected, never guessed.
//! - A family's update policy never changes for a given id.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

static GENERIC_SCHEMA_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9._-]*$").expect("valid generic schema regex"));
static METAX_SCHEMA_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^metax-[a-z0-9][a-z0-9_-]*$").expect("valid metax schema regex"));

/// Family id persisted for generic whole-document datasets.
pub const FAMILY_GENERIC: i64 = 1;
/// Family id persisted for Metax catalog records.
pub const FAMILY_METAX: i64 = 2;

/// Sub-document key addressed by partial Metax updates and reads.
pub const METAX_PARTIAL_KEY: &str = "research_dataset";

/// Schema classification of a dataset.
///
/// Decides how the dataset's document is validated and whether writes
/// replace the whole document or merge into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Family {
    /// Free-form JSON document, always replaced as a whole.
    Generic,
    /// Catalog record whose editable part lives under [`METAX_PARTIAL_KEY`].
    Metax,
}

impl Family {
    /// Stable integer id stored in `datasets.family`.
    pub fn id(self) -> i64 {
        match self {
            Self::Generic => FAMILY_GENERIC,
            Self::Metax => FAMILY_METAX,
        }
    }

    /// Short name used in logs and error messages.
    pub fn name(self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::Metax => "metax",
        }
    }

    /// Whether documents of this family are addressed through a sub-path.
    ///
    /// Partial families are read projected to [`Family::key`] and written
    /// with merge-patch semantics.
    pub fn is_partial(self) -> bool {
        match self {
            Self::Generic => false,
            Self::Metax => true,
        }
    }

    /// Sub-document key for partial families, empty for whole-document ones.
    pub fn key(self) -> &'static str {
        match self {
            Self::Generic => "",
            Self::Metax => METAX_PARTIAL_KEY,
        }
    }

    /// Returns whether `schema` is a tag this family accepts.
    pub fn accepts_schema(self, schema: &str) -> bool {
        match self {
            Self::Generic => GENERIC_SCHEMA_RE.is_match(schema),
            Self::Metax => METAX_SCHEMA_RE.is_match(schema),
        }
    }

    /// All families known to this build, ordered by id.
    pub fn all() -> &'static [Family] {
        &[Family::Generic, Family::Metax]
    }
}

impl Display for Family {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name(), self.id())
    }
}

/// Resolves a persisted family id to its descriptor.
pub fn lookup_family(id: i64) -> Result<Family, FamilyError> {
    Family::all()
        .iter()
        .copied()
        .find(|family| family.id() == id)
        .ok_or(FamilyError::Unknown(id))
}

/// Family lookup errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FamilyError {
    Unknown(i64),
}

impl Display for FamilyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown(id) => write!(f, "unknown dataset family: {id}"),
        }
    }
}

impl Error for FamilyError {}
