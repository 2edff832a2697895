//! Whole-graph invariant check run before every commit.

use super::FamilyGraph;
use crate::model::couple::CoupleId;
use crate::model::member::MemberId;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// First invariant violation found in a graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityViolation {
    /// Member or couple carries another tree's id.
    ForeignRecord { record_id: uuid::Uuid },
    /// Couple references an id missing from the registry.
    DanglingReference {
        couple_id: CoupleId,
        member_id: MemberId,
    },
    /// Couple lists the same member as main and partner.
    SelfPartnership { couple_id: CoupleId },
    /// Member occupies slots in more than one couple.
    DuplicateSlot { member_id: MemberId },
    /// Member is listed under more than one couple, or twice under one.
    DuplicateParentage { member_id: MemberId },
    /// Member is its own ancestor.
    Cycle { member_id: MemberId },
}

impl Display for IntegrityViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ForeignRecord { record_id } => {
                write!(f, "record {record_id} belongs to another tree")
            }
            Self::DanglingReference {
                couple_id,
                member_id,
            } => write!(
                f,
                "couple {couple_id} references missing member {member_id}"
            ),
            Self::SelfPartnership { couple_id } => {
                write!(f, "couple {couple_id} partners a member with itself")
            }
            Self::DuplicateSlot { member_id } => {
                write!(f, "member {member_id} occupies more than one couple slot")
            }
            Self::DuplicateParentage { member_id } => {
                write!(f, "member {member_id} has more than one parent couple")
            }
            Self::Cycle { member_id } => write!(f, "member {member_id} is its own ancestor"),
        }
    }
}

impl Error for IntegrityViolation {}

impl FamilyGraph {
    /// Verifies every relationship invariant of the graph.
    pub fn check_integrity(&self) -> Result<(), IntegrityViolation> {
        let tree_id = self.tree_id();
        if let Some(member) = self
            .registry
            .find_all()
            .iter()
            .find(|member| member.tree_id != tree_id)
        {
            return Err(IntegrityViolation::ForeignRecord {
                record_id: member.id,
            });
        }

        let mut slotted: HashSet<MemberId> = HashSet::new();
        let mut parented: HashSet<MemberId> = HashSet::new();
        for couple in &self.couples {
            if couple.tree_id != tree_id {
                return Err(IntegrityViolation::ForeignRecord {
                    record_id: couple.id,
                });
            }
            if couple.partner_id == Some(couple.main_member_id) {
                return Err(IntegrityViolation::SelfPartnership {
                    couple_id: couple.id,
                });
            }
            for member_id in couple.parents().chain(couple.children.iter().copied()) {
                if !self.registry.contains(member_id) {
                    return Err(IntegrityViolation::DanglingReference {
                        couple_id: couple.id,
                        member_id,
                    });
                }
            }
            for member_id in couple.parents() {
                if !slotted.insert(member_id) {
                    return Err(IntegrityViolation::DuplicateSlot { member_id });
                }
            }
            for member_id in &couple.children {
                if !parented.insert(*member_id) {
                    return Err(IntegrityViolation::DuplicateParentage {
                        member_id: *member_id,
                    });
                }
            }
        }

        for couple in &self.couples {
            for child_id in &couple.children {
                if self.is_ancestor_or_parent(*child_id, couple) {
                    return Err(IntegrityViolation::Cycle {
                        member_id: *child_id,
                    });
                }
            }
        }

        Ok(())
    }
}
