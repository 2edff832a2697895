//! Member registry: the member set of one tree.
//!
//! Holds no relationship logic. Identity is assigned on first save.

use super::{GraphError, GraphResult};
use crate::model::member::{FamilyMember, MemberData, MemberId};
use crate::model::tree::TreeId;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRegistry {
    tree_id: TreeId,
    members: Vec<FamilyMember>,
}

impl MemberRegistry {
    pub fn new(tree_id: TreeId, members: Vec<FamilyMember>) -> Self {
        Self { tree_id, members }
    }

    pub fn tree_id(&self) -> TreeId {
        self.tree_id
    }

    /// Members in insertion order.
    pub fn find_all(&self) -> &[FamilyMember] {
        &self.members
    }

    pub fn find_by_id(&self, member_id: MemberId) -> Option<&FamilyMember> {
        self.members.iter().find(|member| member.id == member_id)
    }

    pub fn contains(&self, member_id: MemberId) -> bool {
        self.find_by_id(member_id).is_some()
    }

    /// Inserts a new member when `member_id` is `None`, otherwise replaces the
    /// data of an existing one.
    pub fn save(
        &mut self,
        member_id: Option<MemberId>,
        data: MemberData,
    ) -> GraphResult<&FamilyMember> {
        match member_id {
            None => {
                self.members
                    .push(FamilyMember::from_data(Uuid::new_v4(), self.tree_id, data));
                let index = self.members.len() - 1;
                Ok(&self.members[index])
            }
            Some(member_id) => {
                let member = self
                    .members
                    .iter_mut()
                    .find(|member| member.id == member_id)
                    .ok_or(GraphError::MemberNotFound(member_id))?;
                member.apply(data);
                Ok(&*member)
            }
        }
    }

    /// Removes a member from the view.
    pub fn delete(&mut self, member_id: MemberId) -> Option<FamilyMember> {
        let index = self.members.iter().position(|member| member.id == member_id)?;
        Some(self.members.remove(index))
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
