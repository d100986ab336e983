//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for datasets.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Every public operation runs in exactly one transaction.
//! - Ownership checks run inside the transaction of the mutation they guard.
//! - Zero affected rows is reported as `NotFound`, never as success.

pub mod dataset_repo;
mod dataset_tx;
