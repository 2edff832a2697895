//! Family tree aggregate model.
//!
//! # Responsibility
//! - Define tree identity, ownership and visibility.
//! - Validate tree metadata input before persistence.
//!
//! # Invariants
//! - `owner` is the username of the only principal allowed to write.
//! - `version` increases by one on every committed relationship change.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable family tree identifier.
pub type TreeId = Uuid;

/// Read visibility of a tree for principals other than the owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Only the owner and admins can read.
    Private,
    /// Everyone can read.
    Public,
}

impl Visibility {
    /// Returns whether reads are restricted to owner/admin.
    pub fn is_private(self) -> bool {
        matches!(self, Self::Private)
    }

    /// Stable storage value.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Public => "public",
        }
    }
}

/// Persisted family tree record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyTree {
    pub id: TreeId,
    pub name: String,
    pub visibility: Visibility,
    /// Username of the owning user.
    pub owner: String,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
    /// Optimistic concurrency token for relationship commits.
    pub version: i64,
}

impl FamilyTree {
    /// Returns whether `username` owns this tree.
    pub fn is_owned_by(&self, username: &str) -> bool {
        self.owner == username
    }
}

/// Input shape for creating or updating tree metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeData {
    pub name: String,
    pub visibility: Visibility,
}

impl TreeData {
    pub fn new(name: impl Into<String>, visibility: Visibility) -> Self {
        Self {
            name: name.into(),
            visibility,
        }
    }

    /// Returns a trimmed copy, rejecting blank names.
    pub fn normalized(&self) -> Result<Self, TreeValidationError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(TreeValidationError::BlankName);
        }
        Ok(Self {
            name: name.to_string(),
            visibility: self.visibility,
        })
    }
}

/// Tree metadata validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeValidationError {
    BlankName,
}

impl Display for TreeValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankName => write!(f, "tree name must not be blank"),
        }
    }
}

impl Error for TreeValidationError {}
