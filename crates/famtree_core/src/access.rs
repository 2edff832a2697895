//! Tree read/write access rules.
//!
//! # Invariants
//! - Reads: public tree, owner, or admin.
//! - Writes: owner only. Admin status grants no write access.
//! - A tree the principal cannot read is reported the same way as a missing one.
//! - A write by anyone but the owner is forbidden, whether or not the tree is readable.

use crate::model::principal::Principal;
use crate::model::tree::FamilyTree;
use log::debug;

/// Access check failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessError {
    /// Principal may not see the tree.
    TreeHidden,
    /// Principal is not the owner of the tree.
    WriteForbidden,
}

pub fn can_read(tree: &FamilyTree, principal: &Principal) -> bool {
    !tree.visibility.is_private() || principal.is_admin || tree.is_owned_by(&principal.username)
}

pub fn can_write(tree: &FamilyTree, principal: &Principal) -> bool {
    tree.is_owned_by(&principal.username)
}

pub fn ensure_readable(tree: &FamilyTree, principal: &Principal) -> Result<(), AccessError> {
    if can_read(tree, principal) {
        return Ok(());
    }
    debug!(
        "event=access_check module=access status=denied access=read tree_id={} username={}",
        tree.id, principal.username
    );
    Err(AccessError::TreeHidden)
}

/// Checks write access. Never reports `TreeHidden`.
pub fn ensure_writable(tree: &FamilyTree, principal: &Principal) -> Result<(), AccessError> {
    if can_write(tree, principal) {
        return Ok(());
    }
    debug!(
        "event=access_check module=access status=denied access=write tree_id={} username={}",
        tree.id, principal.username
    );
    Err(AccessError::WriteForbidden)
}
