//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate access checks, graph mutations and repository commits into
//!   use-case level APIs.
//! - Keep transport layers decoupled from storage details.

pub mod error;
pub mod family_service;
