//! Domain model for family trees.
//!
//! # Responsibility
//! - Define trees, members, couples and principals used by core logic.
//! - Keep relationship data in one canonical shape (couple + child list).
//!
//! # Invariants
//! - Every object is identified by a stable UUID.
//! - Deletion is a hard delete; relationship edges are cleared first.

pub mod couple;
pub mod member;
pub mod principal;
pub mod tree;
