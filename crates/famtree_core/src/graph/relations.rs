//! Per-member relations projection derived from couples.
//!
//! Reproduces the `primaryParentId` / `secondaryParentId` / `partners` view
//! that clients of the earlier relationship models consume.

use super::FamilyGraph;
use crate::model::member::MemberId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberRelations {
    pub member_id: MemberId,
    /// Main member of the parent couple.
    pub primary_parent_id: Option<MemberId>,
    /// Partner of the parent couple.
    pub secondary_parent_id: Option<MemberId>,
    pub partners: Vec<MemberId>,
}

impl FamilyGraph {
    /// Relations of `member_id`, or `None` when the member is unknown.
    pub fn relations_of(&self, member_id: MemberId) -> Option<MemberRelations> {
        if !self.registry.contains(member_id) {
            return None;
        }

        let parents = self.parent_couple_of(member_id);
        let partners = self
            .couple_of(member_id)
            .and_then(|couple| couple.other_parent(member_id))
            .into_iter()
            .collect();

        Some(MemberRelations {
            member_id,
            primary_parent_id: parents.map(|couple| couple.main_member_id),
            secondary_parent_id: parents.and_then(|couple| couple.partner_id),
            partners,
        })
    }

    /// Relations of every member in registry order.
    pub fn relations(&self) -> Vec<MemberRelations> {
        self.registry
            .find_all()
            .iter()
            .filter_map(|member| self.relations_of(member.id))
            .collect()
    }
}
