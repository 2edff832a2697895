//! One-time import of father/mother and primary/secondary parent links.
//!
//! # Responsibility
//! - Translate per-member parent references into couples and child lists.
//!
//! # Invariants
//! - References resolve only inside the importing tree.
//! - Attachment goes through `add_child`, so duplicate and cycle guards apply.
//! - After import every member holds a couple slot.

use super::resolver::{resolve_parent, ParentRole};
use super::{FamilyGraph, GraphError, GraphResult};
use crate::model::couple::Couple;
use crate::model::member::{MemberId, MemberRef};
use serde::{Deserialize, Serialize};

/// Relationship generation a record was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegacyModel {
    FatherMother,
    PrimarySecondary,
}

impl LegacyModel {
    fn roles(self) -> (ParentRole, ParentRole) {
        match self {
            Self::FatherMother => (ParentRole::Father, ParentRole::Mother),
            Self::PrimarySecondary => (ParentRole::Primary, ParentRole::Secondary),
        }
    }
}

/// Parent links of one existing member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyParentage {
    pub member_id: MemberId,
    pub model: LegacyModel,
    /// Father or primary parent.
    pub first: Option<MemberRef>,
    /// Mother or secondary parent.
    pub second: Option<MemberRef>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LegacyImportSummary {
    pub linked_children: usize,
    pub created_couples: usize,
}

impl FamilyGraph {
    /// Applies `records` in order, then roots every unattached member.
    pub fn import_legacy(
        &mut self,
        records: &[LegacyParentage],
    ) -> GraphResult<LegacyImportSummary> {
        let couples_before = self.couples.len();
        let mut linked_children = 0;

        for record in records {
            self.ensure_member(record.member_id)?;
            let (first_role, second_role) = record.model.roles();
            let first = resolve_parent(record.first.as_ref(), &self.registry, first_role)?
                .map(|member| member.id);
            let second = resolve_parent(record.second.as_ref(), &self.registry, second_role)?
                .map(|member| member.id);

            let (main_member_id, partner_id) = match (first, second) {
                (None, None) => continue,
                (Some(parent_id), None) | (None, Some(parent_id)) => {
                    self.own_couple_slots(parent_id)
                }
                (Some(first_id), Some(second_id)) => self.pair_slots(first_id, second_id)?,
            };
            self.add_child(main_member_id, partner_id, record.member_id)?;
            linked_children += 1;
        }

        let unattached: Vec<MemberId> = self
            .registry
            .find_all()
            .iter()
            .map(|member| member.id)
            .filter(|member_id| self.couple_of(*member_id).is_none())
            .collect();
        for member_id in unattached {
            self.couples.push(Couple::new(self.tree_id(), member_id));
        }

        Ok(LegacyImportSummary {
            linked_children,
            created_couples: self.couples.len() - couples_before,
        })
    }

    /// `(main, partner)` of the couple holding `member_id`, created solo if needed.
    fn own_couple_slots(&mut self, member_id: MemberId) -> (MemberId, Option<MemberId>) {
        if let Some(couple) = self.couple_of(member_id) {
            return (couple.main_member_id, couple.partner_id);
        }
        self.couples.push(Couple::new(self.tree_id(), member_id));
        (member_id, None)
    }

    /// `(main, partner)` of the couple joining both parents, filling an empty
    /// partner slot when one parent is still unattached.
    fn pair_slots(
        &mut self,
        first_id: MemberId,
        second_id: MemberId,
    ) -> GraphResult<(MemberId, Option<MemberId>)> {
        if first_id == second_id {
            return Err(GraphError::SelfPartnership(first_id));
        }

        let first_index = self.couples.iter().position(|couple| couple.involves(first_id));
        let second_index = self.couples.iter().position(|couple| couple.involves(second_id));
        let index = match (first_index, second_index) {
            (Some(first), Some(second)) if first == second => first,
            (Some(index), None) => self.fill_partner(index, second_id)?,
            (None, Some(index)) => self.fill_partner(index, first_id)?,
            (None, None) => {
                let mut couple = Couple::new(self.tree_id(), first_id);
                couple.partner_id = Some(second_id);
                self.couples.push(couple);
                self.couples.len() - 1
            }
            (Some(_), Some(_)) => return Err(GraphError::MemberAlreadyAttached(second_id)),
        };

        let couple = &self.couples[index];
        Ok((couple.main_member_id, couple.partner_id))
    }

    fn fill_partner(&mut self, index: usize, member_id: MemberId) -> GraphResult<usize> {
        let couple = &mut self.couples[index];
        if let Some(partner_id) = couple.partner_id {
            return Err(GraphError::PartnerAlreadySet {
                couple_id: couple.id,
                partner_id,
            });
        }
        couple.partner_id = Some(member_id);
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::{LegacyModel, LegacyParentage};
    use crate::graph::resolver::ParentRole;
    use crate::graph::{FamilyGraph, GraphError, RelationshipStatus};
    use crate::model::member::{Gender, MemberData, MemberId, MemberRef};
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn add(graph: &mut FamilyGraph, first_name: &str) -> MemberId {
        graph
            .registry_mut()
            .save(
                None,
                MemberData::new(
                    first_name,
                    "Old",
                    NaiveDate::from_ymd_opt(1920, 3, 3).unwrap(),
                    Gender::Other,
                ),
            )
            .unwrap()
            .id
    }

    fn record(
        member_id: MemberId,
        model: LegacyModel,
        first: Option<MemberId>,
        second: Option<MemberId>,
    ) -> LegacyParentage {
        LegacyParentage {
            member_id,
            model,
            first: first.map(MemberRef::from),
            second: second.map(MemberRef::from),
        }
    }

    #[test]
    fn father_mother_links_become_one_couple() {
        let mut graph = FamilyGraph::empty(Uuid::new_v4());
        let father = add(&mut graph, "Father");
        let mother = add(&mut graph, "Mother");
        let son = add(&mut graph, "Son");
        let daughter = add(&mut graph, "Daughter");

        let summary = graph
            .import_legacy(&[
                record(son, LegacyModel::FatherMother, Some(father), Some(mother)),
                record(daughter, LegacyModel::FatherMother, Some(father), Some(mother)),
            ])
            .unwrap();

        assert_eq!(summary.linked_children, 2);
        let couple = graph.couple_of(father).unwrap();
        assert_eq!(couple.partner_id, Some(mother));
        assert_eq!(couple.children, vec![son, daughter]);
        assert_eq!(graph.couples().len(), 3);
        graph.check_integrity().unwrap();
    }

    #[test]
    fn single_secondary_parent_uses_that_parents_couple() {
        let mut graph = FamilyGraph::empty(Uuid::new_v4());
        let parent = add(&mut graph, "Parent");
        let child = add(&mut graph, "Child");

        graph
            .import_legacy(&[record(
                child,
                LegacyModel::PrimarySecondary,
                None,
                Some(parent),
            )])
            .unwrap();

        assert_eq!(graph.parent_couple_of(child).unwrap().main_member_id, parent);
        assert_eq!(graph.status_of(parent), RelationshipStatus::Root);
    }

    #[test]
    fn child_recorded_before_its_parents_still_links_generations() {
        let mut graph = FamilyGraph::empty(Uuid::new_v4());
        let grandpa = add(&mut graph, "Grandpa");
        let dad = add(&mut graph, "Dad");
        let kid = add(&mut graph, "Kid");

        graph
            .import_legacy(&[
                record(kid, LegacyModel::FatherMother, Some(dad), None),
                record(dad, LegacyModel::FatherMother, Some(grandpa), None),
            ])
            .unwrap();

        assert_eq!(graph.parent_couple_of(kid).unwrap().main_member_id, dad);
        assert_eq!(graph.parent_couple_of(dad).unwrap().main_member_id, grandpa);
        graph.check_integrity().unwrap();
    }

    #[test]
    fn unknown_reference_reports_legacy_role() {
        let mut graph = FamilyGraph::empty(Uuid::new_v4());
        let kid = add(&mut graph, "Kid");
        let stranger = Uuid::new_v4();

        let err = graph
            .import_legacy(&[record(kid, LegacyModel::FatherMother, None, Some(stranger))])
            .unwrap_err();
        assert_eq!(
            err,
            GraphError::InvalidReference {
                role: ParentRole::Mother,
                member_id: stranger
            }
        );
    }

    #[test]
    fn anonymous_references_leave_member_as_root() {
        let mut graph = FamilyGraph::empty(Uuid::new_v4());
        let loner = add(&mut graph, "Loner");

        let summary = graph
            .import_legacy(&[LegacyParentage {
                member_id: loner,
                model: LegacyModel::PrimarySecondary,
                first: Some(MemberRef::anonymous()),
                second: None,
            }])
            .unwrap();

        assert_eq!(summary.linked_children, 0);
        assert_eq!(summary.created_couples, 1);
        assert_eq!(graph.status_of(loner), RelationshipStatus::Root);
    }

    #[test]
    fn conflicting_second_parent_is_rejected() {
        let mut graph = FamilyGraph::empty(Uuid::new_v4());
        let father = add(&mut graph, "Father");
        let mother = add(&mut graph, "Mother");
        let other = add(&mut graph, "Other");
        let first_kid = add(&mut graph, "First");
        let second_kid = add(&mut graph, "Second");

        let err = graph
            .import_legacy(&[
                record(first_kid, LegacyModel::FatherMother, Some(father), Some(mother)),
                record(second_kid, LegacyModel::FatherMother, Some(father), Some(other)),
            ])
            .unwrap_err();
        assert!(matches!(err, GraphError::PartnerAlreadySet { partner_id, .. } if partner_id == mother));
    }

    #[test]
    fn cyclic_legacy_links_are_rejected() {
        let mut graph = FamilyGraph::empty(Uuid::new_v4());
        let a = add(&mut graph, "A");
        let b = add(&mut graph, "B");

        let err = graph
            .import_legacy(&[
                record(a, LegacyModel::PrimarySecondary, Some(b), None),
                record(b, LegacyModel::PrimarySecondary, Some(a), None),
            ])
            .unwrap_err();
        assert!(matches!(err, GraphError::CycleDetected { child_id, .. } if child_id == b));
    }
}
