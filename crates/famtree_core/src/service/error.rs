//! Family service error taxonomy.

use crate::graph::integrity::IntegrityViolation;
use crate::graph::GraphError;
use crate::model::member::{MemberId, MemberValidationError};
use crate::model::tree::{TreeId, TreeValidationError};
use crate::repo::family_repo::FamilyRepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Transport-neutral error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    Conflict,
    Invalid,
    Internal,
}

impl ErrorKind {
    /// Stable machine-readable code.
    pub fn code(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Forbidden => "forbidden",
            Self::Conflict => "conflict",
            Self::Invalid => "invalid",
            Self::Internal => "internal",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Errors from family service operations.
#[derive(Debug)]
pub enum FamilyServiceError {
    /// Tree is missing or hidden from the caller.
    TreeNotFound(TreeId),
    /// Member is not part of the tree.
    MemberNotFound(MemberId),
    /// Caller can read the tree but does not own it.
    AccessDenied(TreeId),
    InvalidMember(MemberValidationError),
    InvalidTree(TreeValidationError),
    /// Relationship rule violation.
    Graph(GraphError),
    /// Mutation produced a graph that breaks an invariant.
    Integrity(IntegrityViolation),
    /// Tree kept changing underneath every commit attempt.
    ConcurrentModification { tree_id: TreeId, attempts: u32 },
    /// Repository-level failure.
    Repo(FamilyRepoError),
}

impl FamilyServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TreeNotFound(_) | Self::MemberNotFound(_) => ErrorKind::NotFound,
            Self::AccessDenied(_) => ErrorKind::Forbidden,
            Self::InvalidMember(_) | Self::InvalidTree(_) => ErrorKind::Invalid,
            Self::Graph(err) => match err {
                GraphError::MemberNotFound(_)
                | GraphError::InvalidReference { .. }
                | GraphError::CoupleNotFound { .. } => ErrorKind::NotFound,
                GraphError::PartnerAlreadySet { .. }
                | GraphError::DuplicateParentage { .. }
                | GraphError::CycleDetected { .. }
                | GraphError::MemberAlreadyAttached(_)
                | GraphError::SelfPartnership(_)
                | GraphError::RootLimitReached(_) => ErrorKind::Conflict,
            },
            Self::ConcurrentModification { .. } => ErrorKind::Conflict,
            Self::Repo(FamilyRepoError::VersionConflict { .. }) => ErrorKind::Conflict,
            Self::Integrity(_) | Self::Repo(_) => ErrorKind::Internal,
        }
    }
}

impl Display for FamilyServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TreeNotFound(id) => write!(f, "family tree not found: {id}"),
            Self::MemberNotFound(id) => write!(f, "family member not found: {id}"),
            Self::AccessDenied(id) => write!(f, "not allowed to modify family tree {id}"),
            Self::InvalidMember(err) => write!(f, "{err}"),
            Self::InvalidTree(err) => write!(f, "{err}"),
            Self::Graph(err) => write!(f, "{err}"),
            Self::Integrity(err) => write!(f, "family tree integrity violated: {err}"),
            Self::ConcurrentModification { tree_id, attempts } => write!(
                f,
                "family tree {tree_id} was modified concurrently; gave up after {attempts} attempts"
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for FamilyServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidMember(err) => Some(err),
            Self::InvalidTree(err) => Some(err),
            Self::Graph(err) => Some(err),
            Self::Integrity(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<FamilyRepoError> for FamilyServiceError {
    fn from(value: FamilyRepoError) -> Self {
        match value {
            FamilyRepoError::TreeNotFound(tree_id) => Self::TreeNotFound(tree_id),
            other => Self::Repo(other),
        }
    }
}

impl From<GraphError> for FamilyServiceError {
    fn from(value: GraphError) -> Self {
        match value {
            GraphError::MemberNotFound(member_id) => Self::MemberNotFound(member_id),
            other => Self::Graph(other),
        }
    }
}

impl From<IntegrityViolation> for FamilyServiceError {
    fn from(value: IntegrityViolation) -> Self {
        Self::Integrity(value)
    }
}

impl From<MemberValidationError> for FamilyServiceError {
    fn from(value: MemberValidationError) -> Self {
        Self::InvalidMember(value)
    }
}

impl From<TreeValidationError> for FamilyServiceError {
    fn from(value: TreeValidationError) -> Self {
        Self::InvalidTree(value)
    }
}
