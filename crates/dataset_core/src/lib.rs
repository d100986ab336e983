//! Core dataset store.
//! Transactional, ownership-guarded persistence of versioned JSON datasets.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, JournalMode, StoreConfig};
pub use db::{open_db, open_db_in_memory, Db, DbError, DbResult, Tx, TxMode};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::dataset::{Dataset, DatasetId, DatasetValidationError, PrincipalId};
pub use model::document::merge_top_level;
pub use model::family::{lookup_family, Family, FamilyError, FAMILY_GENERIC, FAMILY_METAX};
pub use repo::dataset_repo::{
    DatasetRepository, ErrorKind, RepoError, RepoResult, SqliteDatasetRepository,
};
pub use service::dataset_service::{DatasetService, NewDataset};

/// Minimal health-check API for smoke probes.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
