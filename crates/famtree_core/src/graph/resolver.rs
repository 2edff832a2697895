//! Parent/partner reference resolution.
//!
//! # Invariants
//! - Lookups are scoped to the registry of the tree being mutated, so a
//!   reference into another tree always fails as "invalid id".

use super::registry::MemberRegistry;
use super::{GraphError, GraphResult};
use crate::model::member::{FamilyMember, MemberId, MemberRef};
use std::fmt::{Display, Formatter};

/// Role a referenced member plays for the member being linked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentRole {
    Primary,
    Secondary,
    Father,
    Mother,
}

impl ParentRole {
    pub fn label(self) -> &'static str {
        match self {
            Self::Primary => "primary parent",
            Self::Secondary => "secondary parent",
            Self::Father => "father",
            Self::Mother => "mother",
        }
    }
}

impl Display for ParentRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Resolves an optional reference.
///
/// Absent references and references without identity resolve to `None`.
pub fn resolve_parent<'a>(
    candidate: Option<&MemberRef>,
    registry: &'a MemberRegistry,
    role: ParentRole,
) -> GraphResult<Option<&'a FamilyMember>> {
    match candidate.and_then(|reference| reference.id) {
        None => Ok(None),
        Some(member_id) => resolve_required(member_id, registry, role).map(Some),
    }
}

/// Resolves a mandatory reference.
pub fn resolve_required(
    member_id: MemberId,
    registry: &MemberRegistry,
    role: ParentRole,
) -> GraphResult<&FamilyMember> {
    registry
        .find_by_id(member_id)
        .ok_or(GraphError::InvalidReference { role, member_id })
}
