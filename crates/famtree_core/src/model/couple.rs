//! Couple (parentage unit) model.

use super::member::MemberId;
use super::tree::TreeId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable couple identifier.
pub type CoupleId = Uuid;

/// A main member, an optional partner and their children.
///
/// A couple without partner is a single-parent branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Couple {
    pub id: CoupleId,
    pub tree_id: TreeId,
    pub main_member_id: MemberId,
    pub partner_id: Option<MemberId>,
    /// Child member ids in insertion order.
    pub children: Vec<MemberId>,
}

impl Couple {
    /// Creates a couple with a generated id and only a main member.
    pub fn new(tree_id: TreeId, main_member_id: MemberId) -> Self {
        Self {
            id: Uuid::new_v4(),
            tree_id,
            main_member_id,
            partner_id: None,
            children: Vec::new(),
        }
    }

    pub fn has_partner(&self) -> bool {
        self.partner_id.is_some()
    }

    /// Main member followed by partner, when set.
    pub fn parents(&self) -> impl Iterator<Item = MemberId> + '_ {
        std::iter::once(self.main_member_id).chain(self.partner_id)
    }

    /// Returns whether `member_id` occupies the main or partner slot.
    pub fn involves(&self, member_id: MemberId) -> bool {
        self.main_member_id == member_id || self.partner_id == Some(member_id)
    }

    pub fn has_child(&self, member_id: MemberId) -> bool {
        self.children.contains(&member_id)
    }

    /// Exact `(main, partner)` match; `None` only matches an empty partner slot.
    pub fn matches(&self, main_member_id: MemberId, partner_id: Option<MemberId>) -> bool {
        self.main_member_id == main_member_id && self.partner_id == partner_id
    }

    /// The slot opposite to `member_id`, when `member_id` is in this couple.
    pub fn other_parent(&self, member_id: MemberId) -> Option<MemberId> {
        if self.main_member_id == member_id {
            self.partner_id
        } else if self.partner_id == Some(member_id) {
            Some(self.main_member_id)
        } else {
            None
        }
    }
}
