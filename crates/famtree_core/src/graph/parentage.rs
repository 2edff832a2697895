//! Couple/parentage state transitions.
//!
//! # Responsibility
//! - Place members in the graph as root, partner or child.
//! - Detach removed members from every couple (promote and dissolve).
//!
//! # Invariants
//! - Couple lookup by `(main, partner)` is exact and not symmetric.
//! - An existing partner is never overwritten.
//! - A child is appended only when it has no parent couple and is not an
//!   ancestor of the target couple.
//! - Every child owns a couple slot, so it can later receive a partner.

use super::{FamilyGraph, GraphError, GraphResult, RelationshipStatus, RootPolicy};
use crate::model::couple::{Couple, CoupleId};
use crate::model::member::{FamilyMember, MemberId};
use std::collections::HashSet;

/// Outcome of detaching one member.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Detachment {
    /// Couples removed because no parent remained.
    pub dissolved_couples: Vec<CoupleId>,
    /// Children of dissolved couples, now parentless.
    pub orphaned_children: Vec<MemberId>,
    /// Partners moved into the main slot.
    pub promoted_partners: Vec<MemberId>,
}

impl FamilyGraph {
    /// Starts a new root couple with `member_id` as main member.
    pub fn add_main_member(
        &mut self,
        member_id: MemberId,
        roots: RootPolicy,
    ) -> GraphResult<CoupleId> {
        self.ensure_member(member_id)?;
        if self.status_of(member_id) != RelationshipStatus::Unattached {
            return Err(GraphError::MemberAlreadyAttached(member_id));
        }
        if roots == RootPolicy::Single && self.root_couples().next().is_some() {
            return Err(GraphError::RootLimitReached(self.tree_id()));
        }

        let couple = Couple::new(self.tree_id(), member_id);
        let couple_id = couple.id;
        self.couples.push(couple);
        Ok(couple_id)
    }

    /// Fills the empty partner slot of the couple led by `primary_parent_id`.
    pub fn add_partner(
        &mut self,
        primary_parent_id: MemberId,
        member_id: MemberId,
    ) -> GraphResult<CoupleId> {
        self.ensure_member(member_id)?;
        if member_id == primary_parent_id {
            return Err(GraphError::SelfPartnership(member_id));
        }
        if self.status_of(member_id) != RelationshipStatus::Unattached {
            return Err(GraphError::MemberAlreadyAttached(member_id));
        }

        let couple = self
            .couples
            .iter_mut()
            .find(|couple| couple.main_member_id == primary_parent_id)
            .ok_or(GraphError::CoupleNotFound {
                main_member_id: primary_parent_id,
                partner_id: None,
            })?;
        if let Some(partner_id) = couple.partner_id {
            return Err(GraphError::PartnerAlreadySet {
                couple_id: couple.id,
                partner_id,
            });
        }

        couple.partner_id = Some(member_id);
        Ok(couple.id)
    }

    /// Lists `child_id` under the couple `(primary_parent_id, partner_id)`.
    ///
    /// The child may be unattached or the head of an existing root branch;
    /// in the latter case the cycle guard keeps ancestors out of their own
    /// descendants.
    pub fn add_child(
        &mut self,
        primary_parent_id: MemberId,
        partner_id: Option<MemberId>,
        child_id: MemberId,
    ) -> GraphResult<CoupleId> {
        self.ensure_member(child_id)?;
        let index = self
            .couples
            .iter()
            .position(|couple| couple.matches(primary_parent_id, partner_id))
            .ok_or(GraphError::CoupleNotFound {
                main_member_id: primary_parent_id,
                partner_id,
            })?;
        let couple_id = self.couples[index].id;

        if let Some(existing) = self.parent_couple_of(child_id) {
            return Err(GraphError::DuplicateParentage {
                child_id,
                couple_id: existing.id,
            });
        }
        if self.is_ancestor_or_parent(child_id, &self.couples[index]) {
            return Err(GraphError::CycleDetected {
                child_id,
                couple_id,
            });
        }

        self.couples[index].children.push(child_id);
        if self.couple_of(child_id).is_none() {
            self.couples.push(Couple::new(self.tree_id(), child_id));
        }
        Ok(couple_id)
    }

    /// Clears every edge that references `member_id`.
    ///
    /// Children lists drop the member; a vacated partner slot is emptied; a
    /// vacated main slot takes the partner, or dissolves the couple when
    /// there is none.
    pub fn detach_member(&mut self, member_id: MemberId) -> GraphResult<Detachment> {
        self.ensure_member(member_id)?;
        let mut detachment = Detachment::default();

        for couple in &mut self.couples {
            couple.children.retain(|child_id| *child_id != member_id);

            if couple.partner_id == Some(member_id) {
                couple.partner_id = None;
            } else if couple.main_member_id == member_id {
                match couple.partner_id.take() {
                    Some(partner_id) => {
                        couple.main_member_id = partner_id;
                        detachment.promoted_partners.push(partner_id);
                    }
                    None => {
                        detachment.dissolved_couples.push(couple.id);
                        detachment
                            .orphaned_children
                            .extend(couple.children.iter().copied());
                    }
                }
            }
        }

        self.couples
            .retain(|couple| !detachment.dissolved_couples.contains(&couple.id));
        Ok(detachment)
    }

    /// Detaches and then deletes `member_id` from the registry.
    pub fn remove_member(&mut self, member_id: MemberId) -> GraphResult<FamilyMember> {
        self.detach_member(member_id)?;
        self.registry
            .delete(member_id)
            .ok_or(GraphError::MemberNotFound(member_id))
    }

    /// Walks from `couple` up through parent couples looking for `member_id`.
    pub(crate) fn is_ancestor_or_parent(&self, member_id: MemberId, couple: &Couple) -> bool {
        let mut visited: HashSet<CoupleId> = HashSet::new();
        let mut pending = vec![couple];
        while let Some(current) = pending.pop() {
            if !visited.insert(current.id) {
                continue;
            }
            for parent_id in current.parents() {
                if parent_id == member_id {
                    return true;
                }
                if let Some(parent_couple) = self.parent_couple_of(parent_id) {
                    pending.push(parent_couple);
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use crate::graph::{FamilyGraph, GraphError, RelationshipStatus, RootPolicy};
    use crate::model::member::{Gender, MemberData, MemberId};
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn add(graph: &mut FamilyGraph, first_name: &str) -> MemberId {
        graph
            .registry_mut()
            .save(
                None,
                MemberData::new(
                    first_name,
                    "Doe",
                    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap(),
                    Gender::Other,
                ),
            )
            .unwrap()
            .id
    }

    /// A + B with child D.
    fn family() -> (FamilyGraph, MemberId, MemberId, MemberId) {
        let mut graph = FamilyGraph::empty(Uuid::new_v4());
        let a = add(&mut graph, "A");
        let b = add(&mut graph, "B");
        let d = add(&mut graph, "D");
        graph.add_main_member(a, RootPolicy::Multiple).unwrap();
        graph.add_partner(a, b).unwrap();
        graph.add_child(a, Some(b), d).unwrap();
        (graph, a, b, d)
    }

    #[test]
    fn root_partner_child_sequence_builds_one_couple() {
        let (graph, a, b, d) = family();

        let c1 = graph.couple_of(a).unwrap();
        assert_eq!(c1.main_member_id, a);
        assert_eq!(c1.partner_id, Some(b));
        assert_eq!(c1.children, vec![d]);
        assert_eq!(graph.status_of(a), RelationshipStatus::PartneredRoot);
        assert_eq!(graph.status_of(b), RelationshipStatus::PartneredRoot);
        assert_eq!(graph.status_of(d), RelationshipStatus::Child);
        assert_eq!(graph.couple_of(d).unwrap().main_member_id, d);
        graph.check_integrity().unwrap();
    }

    #[test]
    fn second_partner_is_rejected_and_first_kept() {
        let (mut graph, a, b, _) = family();
        let e = add(&mut graph, "E");

        let err = graph.add_partner(a, e).unwrap_err();
        assert!(matches!(err, GraphError::PartnerAlreadySet { partner_id, .. } if partner_id == b));
        assert_eq!(graph.couple_of(a).unwrap().partner_id, Some(b));
    }

    #[test]
    fn partner_requires_couple_led_by_primary() {
        let (mut graph, _, b, _) = family();
        let e = add(&mut graph, "E");

        let err = graph.add_partner(b, e).unwrap_err();
        assert_eq!(
            err,
            GraphError::CoupleNotFound {
                main_member_id: b,
                partner_id: None
            }
        );
    }

    #[test]
    fn couple_match_is_exact_and_ordered() {
        let (mut graph, a, b, _) = family();
        let f = add(&mut graph, "F");

        let swapped = graph.add_child(b, Some(a), f).unwrap_err();
        assert!(matches!(swapped, GraphError::CoupleNotFound { .. }));

        let single = graph.add_child(a, None, f).unwrap_err();
        assert_eq!(
            single,
            GraphError::CoupleNotFound {
                main_member_id: a,
                partner_id: None
            }
        );
    }

    #[test]
    fn single_parent_couple_accepts_children() {
        let mut graph = FamilyGraph::empty(Uuid::new_v4());
        let a = add(&mut graph, "A");
        let d = add(&mut graph, "D");
        graph.add_main_member(a, RootPolicy::Multiple).unwrap();

        graph.add_child(a, None, d).unwrap();

        assert_eq!(graph.parent_couple_of(d).unwrap().main_member_id, a);
    }

    #[test]
    fn duplicate_parentage_is_rejected_and_first_kept() {
        let (mut graph, a, _, d) = family();
        let x = add(&mut graph, "X");
        graph.add_main_member(x, RootPolicy::Multiple).unwrap();

        let err = graph.add_child(x, None, d).unwrap_err();
        let first = graph.couple_of(a).unwrap().id;
        assert_eq!(
            err,
            GraphError::DuplicateParentage {
                child_id: d,
                couple_id: first
            }
        );
        assert_eq!(graph.parent_couple_of(d).unwrap().id, first);
        assert!(graph.couple_of(x).unwrap().children.is_empty());
    }

    #[test]
    fn ancestor_cannot_become_child_of_descendant() {
        let (mut graph, a, b, d) = family();
        let g = add(&mut graph, "G");
        graph.add_child(d, None, g).unwrap();

        let err = graph.add_child(g, None, a).unwrap_err();
        assert!(matches!(err, GraphError::CycleDetected { child_id, .. } if child_id == a));
        let err = graph.add_child(d, None, b).unwrap_err();
        assert!(matches!(err, GraphError::CycleDetected { child_id, .. } if child_id == b));
    }

    #[test]
    fn unrelated_root_branch_can_be_linked_as_child() {
        let (mut graph, a, b, _) = family();
        let r = add(&mut graph, "R");
        let s = add(&mut graph, "S");
        graph.add_main_member(r, RootPolicy::Multiple).unwrap();
        graph.add_child(r, None, s).unwrap();

        graph.add_child(a, Some(b), r).unwrap();

        assert_eq!(graph.status_of(r), RelationshipStatus::Child);
        assert_eq!(graph.couple_of(r).unwrap().children, vec![s]);
        graph.check_integrity().unwrap();
    }

    #[test]
    fn attached_member_cannot_start_a_root() {
        let (mut graph, _, _, d) = family();

        assert_eq!(
            graph.add_main_member(d, RootPolicy::Multiple).unwrap_err(),
            GraphError::MemberAlreadyAttached(d)
        );
    }

    #[test]
    fn single_root_policy_rejects_second_root() {
        let mut graph = FamilyGraph::empty(Uuid::new_v4());
        let a = add(&mut graph, "A");
        let z = add(&mut graph, "Z");
        graph.add_main_member(a, RootPolicy::Single).unwrap();

        let err = graph.add_main_member(z, RootPolicy::Single).unwrap_err();
        assert_eq!(err, GraphError::RootLimitReached(graph.tree_id()));
        graph.add_main_member(z, RootPolicy::Multiple).unwrap();
    }

    #[test]
    fn removing_main_promotes_partner_and_keeps_children() {
        let (mut graph, a, b, d) = family();
        let c1 = graph.couple_of(a).unwrap().id;

        graph.remove_member(a).unwrap();

        let couple = graph.couple(c1).unwrap();
        assert_eq!(couple.main_member_id, b);
        assert_eq!(couple.partner_id, None);
        assert_eq!(couple.children, vec![d]);
        assert!(graph.registry().find_by_id(a).is_none());
        graph.check_integrity().unwrap();
    }

    #[test]
    fn removing_last_parent_dissolves_couple() {
        let (mut graph, a, b, d) = family();
        let c1 = graph.couple_of(a).unwrap().id;
        graph.remove_member(b).unwrap();

        let detachment = graph.detach_member(a).unwrap();

        assert_eq!(detachment.dissolved_couples, vec![c1]);
        assert_eq!(detachment.orphaned_children, vec![d]);
        assert!(graph.couple(c1).is_none());
        assert_eq!(graph.status_of(d), RelationshipStatus::Root);
    }

    #[test]
    fn removing_child_clears_child_list_and_own_couple() {
        let (mut graph, a, _, d) = family();

        graph.remove_member(d).unwrap();

        assert!(graph.couple_of(a).unwrap().children.is_empty());
        assert!(graph.couple_of(d).is_none());
        assert_eq!(graph.couples().len(), 1);
        graph.check_integrity().unwrap();
    }
}
