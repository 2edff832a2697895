//! Core domain logic for famtree.
//! This crate is the single source of truth for family relationship invariants.

pub mod access;
pub mod config;
pub mod db;
pub mod graph;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, CoreConfig, LoggingConfig, TreePolicy};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use graph::legacy::{LegacyImportSummary, LegacyModel, LegacyParentage};
pub use graph::relations::MemberRelations;
pub use graph::{FamilyGraph, GraphError, RelationshipStatus, RootPolicy};
pub use logging::{init_logging, init_logging_from_config, logging_status};
pub use model::couple::{Couple, CoupleId};
pub use model::member::{FamilyMember, Gender, MemberData, MemberId, MemberRef};
pub use model::principal::Principal;
pub use model::tree::{FamilyTree, TreeData, TreeId, Visibility};
pub use repo::family_repo::{
    FamilyRepoError, FamilyRepoResult, FamilyRepository, SqliteFamilyRepository, TreeChangeSet,
    TreeSnapshot,
};
pub use service::error::{ErrorKind, FamilyServiceError};
pub use service::family_service::{FamilyService, FamilyServiceResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
