//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the family tree data access contract.
//! - Isolate SQLite query details from service/business orchestration.
//!
//! # Invariants
//! - Relationship writes are applied only through versioned change sets.
//! - Repository APIs return semantic errors (`TreeNotFound`,
//!   `VersionConflict`) in addition to DB transport errors.

pub mod family_repo;
