//! In-memory relationship graph of one family tree.
//!
//! # Responsibility
//! - Hold the member registry and couple set loaded for one operation.
//! - Apply relationship mutations (see `parentage`) on a private copy that
//!   is committed only after `check_integrity` passes.
//!
//! # Invariants
//! - A member occupies at most one couple slot (main or partner).
//! - A member is listed as a child of at most one couple.
//! - A couple's children are never its parents or their ancestors.
//! - Every id referenced by a couple belongs to the registry.

pub mod integrity;
pub mod legacy;
pub mod parentage;
pub mod registry;
pub mod relations;
pub mod resolver;

use crate::model::couple::{Couple, CoupleId};
use crate::model::member::MemberId;
use crate::model::tree::TreeId;
use registry::MemberRegistry;
use resolver::ParentRole;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type GraphResult<T> = Result<T, GraphError>;

/// Relationship rule violations raised by the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Member id is not part of this tree.
    MemberNotFound(MemberId),
    /// Referenced parent/partner id is not part of this tree.
    InvalidReference {
        role: ParentRole,
        member_id: MemberId,
    },
    /// No couple matches the requested `(main, partner)` pair.
    CoupleNotFound {
        main_member_id: MemberId,
        partner_id: Option<MemberId>,
    },
    /// Couple already has a partner.
    PartnerAlreadySet {
        couple_id: CoupleId,
        partner_id: MemberId,
    },
    /// Child is already listed under another couple.
    DuplicateParentage {
        child_id: MemberId,
        couple_id: CoupleId,
    },
    /// Attaching the child would make it its own ancestor.
    CycleDetected {
        child_id: MemberId,
        couple_id: CoupleId,
    },
    /// Member already has a place in the graph.
    MemberAlreadyAttached(MemberId),
    /// A member cannot be partnered with itself.
    SelfPartnership(MemberId),
    /// Tree policy allows a single root couple and one exists.
    RootLimitReached(TreeId),
}

impl Display for GraphError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MemberNotFound(id) => write!(f, "family member not found: {id}"),
            Self::InvalidReference { role, member_id } => {
                write!(f, "invalid {role} id: {member_id}")
            }
            Self::CoupleNotFound {
                main_member_id,
                partner_id: Some(partner_id),
            } => write!(
                f,
                "couple not found: main {main_member_id} with partner {partner_id}"
            ),
            Self::CoupleNotFound {
                main_member_id,
                partner_id: None,
            } => write!(f, "couple not found: main {main_member_id} without partner"),
            Self::PartnerAlreadySet {
                couple_id,
                partner_id,
            } => write!(
                f,
                "couple {couple_id} already has partner {partner_id}"
            ),
            Self::DuplicateParentage {
                child_id,
                couple_id,
            } => write!(
                f,
                "member {child_id} is already a child of couple {couple_id}"
            ),
            Self::CycleDetected {
                child_id,
                couple_id,
            } => write!(
                f,
                "member {child_id} is an ancestor of couple {couple_id}"
            ),
            Self::MemberAlreadyAttached(id) => {
                write!(f, "member {id} is already attached to the tree")
            }
            Self::SelfPartnership(id) => write!(f, "member {id} cannot partner with itself"),
            Self::RootLimitReached(tree_id) => {
                write!(f, "tree {tree_id} already has a root couple")
            }
        }
    }
}

impl Error for GraphError {}

/// Place of one member in the relationship graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipStatus {
    Unattached,
    /// Main of a couple without partner, not anyone's child.
    Root,
    /// In a partnered couple, not anyone's child.
    PartneredRoot,
    /// Listed under a couple.
    Child,
}

/// Role a new member takes when it is added.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipRole {
    Root,
    Partner,
    Child,
}

impl RelationshipRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Root => "root",
            Self::Partner => "partner",
            Self::Child => "child",
        }
    }
}

/// How many unconnected root couples one tree may hold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RootPolicy {
    #[default]
    Multiple,
    Single,
}

/// Members and couples of one tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilyGraph {
    registry: MemberRegistry,
    couples: Vec<Couple>,
}

impl FamilyGraph {
    pub fn new(registry: MemberRegistry, couples: Vec<Couple>) -> Self {
        Self { registry, couples }
    }

    /// Creates an empty graph for `tree_id`.
    pub fn empty(tree_id: TreeId) -> Self {
        Self::new(MemberRegistry::new(tree_id, Vec::new()), Vec::new())
    }

    pub fn tree_id(&self) -> TreeId {
        self.registry.tree_id()
    }

    pub fn registry(&self) -> &MemberRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut MemberRegistry {
        &mut self.registry
    }

    /// Couples in creation order.
    pub fn couples(&self) -> &[Couple] {
        &self.couples
    }

    pub fn couple(&self, couple_id: CoupleId) -> Option<&Couple> {
        self.couples.iter().find(|couple| couple.id == couple_id)
    }

    /// Couple in which `member_id` is main or partner.
    pub fn couple_of(&self, member_id: MemberId) -> Option<&Couple> {
        self.couples.iter().find(|couple| couple.involves(member_id))
    }

    /// Couple listing `member_id` as a child.
    pub fn parent_couple_of(&self, member_id: MemberId) -> Option<&Couple> {
        self.couples.iter().find(|couple| couple.has_child(member_id))
    }

    pub fn status_of(&self, member_id: MemberId) -> RelationshipStatus {
        if self.parent_couple_of(member_id).is_some() {
            return RelationshipStatus::Child;
        }
        match self.couple_of(member_id) {
            Some(couple) if couple.has_partner() => RelationshipStatus::PartneredRoot,
            Some(_) => RelationshipStatus::Root,
            None => RelationshipStatus::Unattached,
        }
    }

    /// Couples whose parents have no recorded parents themselves.
    pub fn root_couples(&self) -> impl Iterator<Item = &Couple> + '_ {
        self.couples
            .iter()
            .filter(|couple| couple.parents().all(|id| self.parent_couple_of(id).is_none()))
    }

    fn ensure_member(&self, member_id: MemberId) -> GraphResult<()> {
        if self.registry.contains(member_id) {
            Ok(())
        } else {
            Err(GraphError::MemberNotFound(member_id))
        }
    }
}
