//! Dataset domain model.
//!
//! # Responsibility
//! - Define the dataset record, its schema families and document helpers.
//! - Keep validation rules next to the data they guard.
//!
//! # Invariants
//! - Every dataset is identified by a stable `DatasetId`.
//! - Deletion is physical; there is no tombstone state.

pub mod dataset;
pub mod document;
pub mod family;
