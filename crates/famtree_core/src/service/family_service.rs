//! Family tree use-case service.
//!
//! # Responsibility
//! - Enforce access rules for every tree read and write.
//! - Run relationship mutations on a private graph copy and commit the
//!   resulting change set atomically.
//!
//! # Invariants
//! - Reads of hidden and missing trees fail with the same `TreeNotFound`;
//!   writes by non-owners fail with `AccessDenied`.
//! - Nothing is committed unless `check_integrity` passes.
//! - A commit lost to a concurrent writer re-runs the whole operation on a
//!   fresh snapshot, at most `max_commit_retries` times.

use super::error::FamilyServiceError;
use crate::access::{self, AccessError};
use crate::config::TreePolicy;
use crate::graph::legacy::{LegacyImportSummary, LegacyParentage};
use crate::graph::relations::MemberRelations;
use crate::graph::resolver::{resolve_parent, resolve_required, ParentRole};
use crate::graph::{FamilyGraph, GraphError, RelationshipRole, RootPolicy};
use crate::model::couple::{Couple, CoupleId};
use crate::model::member::{FamilyMember, MemberData, MemberId, MemberRef};
use crate::model::principal::Principal;
use crate::model::tree::{FamilyTree, TreeData, TreeId};
use crate::repo::family_repo::{FamilyRepoError, FamilyRepository, TreeChangeSet, TreeSnapshot};
use log::{debug, info, warn};

pub type FamilyServiceResult<T> = Result<T, FamilyServiceError>;

/// Family tree service facade.
pub struct FamilyService<R: FamilyRepository> {
    repo: R,
    roots: RootPolicy,
    max_commit_retries: u32,
}

impl<R: FamilyRepository> FamilyService<R> {
    /// Creates service with the default tree policy.
    pub fn new(repo: R) -> Self {
        Self::with_policy(repo, &TreePolicy::default())
    }

    pub fn with_policy(repo: R, policy: &TreePolicy) -> Self {
        Self {
            repo,
            roots: policy.root_policy(),
            max_commit_retries: policy.max_commit_retries.max(1),
        }
    }

    /// Creates one tree owned by `principal`.
    pub fn create_tree(
        &self,
        data: TreeData,
        principal: &Principal,
    ) -> FamilyServiceResult<FamilyTree> {
        let data = data.normalized()?;
        let tree = self.repo.create_tree(&data, &principal.username)?;
        info!(
            "event=tree_create module=service status=ok tree_id={} visibility={}",
            tree.id,
            tree.visibility.as_str()
        );
        Ok(tree)
    }

    /// Replaces tree name and visibility.
    pub fn update_tree(
        &self,
        tree_id: TreeId,
        data: TreeData,
        principal: &Principal,
    ) -> FamilyServiceResult<FamilyTree> {
        let data = data.normalized()?;
        let mut tree = self.find_tree(tree_id)?;
        access::ensure_writable(&tree, principal).map_err(|err| access_error(tree_id, err))?;

        tree.name = data.name;
        tree.visibility = data.visibility;
        self.repo.save_tree(&tree).map_err(Into::into)
    }

    pub fn get_tree(&self, tree_id: TreeId, principal: &Principal) -> FamilyServiceResult<FamilyTree> {
        self.readable_tree(tree_id, principal)
    }

    /// Lists trees `principal` can read, in creation order.
    pub fn list_trees(&self, principal: &Principal) -> FamilyServiceResult<Vec<FamilyTree>> {
        let trees = self.repo.list_trees()?;
        Ok(trees
            .into_iter()
            .filter(|tree| access::can_read(tree, principal))
            .collect())
    }

    pub fn get_member(
        &self,
        tree_id: TreeId,
        member_id: MemberId,
        principal: &Principal,
    ) -> FamilyServiceResult<FamilyMember> {
        self.readable_tree(tree_id, principal)?;
        self.repo
            .get_member(tree_id, member_id)?
            .ok_or(FamilyServiceError::MemberNotFound(member_id))
    }

    pub fn list_members(
        &self,
        tree_id: TreeId,
        principal: &Principal,
    ) -> FamilyServiceResult<Vec<FamilyMember>> {
        self.readable_tree(tree_id, principal)?;
        self.repo.list_members(tree_id).map_err(Into::into)
    }

    pub fn list_couples(
        &self,
        tree_id: TreeId,
        principal: &Principal,
    ) -> FamilyServiceResult<Vec<Couple>> {
        self.readable_tree(tree_id, principal)?;
        self.repo.list_couples(tree_id).map_err(Into::into)
    }

    /// Parent/partner view of every member, derived from couples.
    pub fn list_member_relations(
        &self,
        tree_id: TreeId,
        principal: &Principal,
    ) -> FamilyServiceResult<Vec<MemberRelations>> {
        let snapshot = self.readable_snapshot(tree_id, principal)?;
        let (_, graph) = snapshot.into_graph();
        Ok(graph.relations())
    }

    /// Adds a member heading a new root couple.
    pub fn add_root_member(
        &self,
        tree_id: TreeId,
        data: MemberData,
        principal: &Principal,
    ) -> FamilyServiceResult<FamilyMember> {
        let data = data.normalized()?;
        self.mutate(tree_id, principal, RelationshipRole::Root.as_str(), |graph| {
            let member_id = graph.registry_mut().save(None, data.clone())?.id;
            graph.add_main_member(member_id, self.roots)?;
            member_of(graph, member_id)
        })
    }

    /// Adds a member as partner of the couple led by `main_member_id`.
    pub fn add_partner(
        &self,
        tree_id: TreeId,
        data: MemberData,
        main_member_id: MemberId,
        principal: &Principal,
    ) -> FamilyServiceResult<FamilyMember> {
        let data = data.normalized()?;
        self.mutate(
            tree_id,
            principal,
            RelationshipRole::Partner.as_str(),
            |graph| {
                let primary_id =
                    resolve_required(main_member_id, graph.registry(), ParentRole::Primary)?.id;
                let member_id = graph.registry_mut().save(None, data.clone())?.id;
                graph.add_partner(primary_id, member_id)?;
                member_of(graph, member_id)
            },
        )
    }

    /// Adds a member as child of the couple `(primary, partner)`.
    pub fn add_child(
        &self,
        tree_id: TreeId,
        data: MemberData,
        primary_parent_id: MemberId,
        partner_parent_id: Option<MemberId>,
        principal: &Principal,
    ) -> FamilyServiceResult<FamilyMember> {
        let data = data.normalized()?;
        self.mutate(tree_id, principal, RelationshipRole::Child.as_str(), |graph| {
            let (primary_id, partner_id) =
                resolve_parents(graph, primary_parent_id, partner_parent_id)?;
            let member_id = graph.registry_mut().save(None, data.clone())?.id;
            graph.add_child(primary_id, partner_id, member_id)?;
            member_of(graph, member_id)
        })
    }

    /// Places an existing root branch under the couple `(primary, partner)`.
    ///
    /// Returns the parent couple after the link.
    pub fn link_existing_child(
        &self,
        tree_id: TreeId,
        child_id: MemberId,
        primary_parent_id: MemberId,
        partner_parent_id: Option<MemberId>,
        principal: &Principal,
    ) -> FamilyServiceResult<Couple> {
        self.mutate(tree_id, principal, "link_child", |graph| {
            if !graph.registry().contains(child_id) {
                return Err(FamilyServiceError::MemberNotFound(child_id));
            }
            let (primary_id, partner_id) =
                resolve_parents(graph, primary_parent_id, partner_parent_id)?;
            let couple_id = graph.add_child(primary_id, partner_id, child_id)?;
            couple_of(graph, couple_id, primary_id, partner_id)
        })
    }

    /// Replaces member data; relationships are untouched.
    pub fn update_member(
        &self,
        tree_id: TreeId,
        member_id: MemberId,
        data: MemberData,
        principal: &Principal,
    ) -> FamilyServiceResult<FamilyMember> {
        let data = data.normalized()?;
        self.mutate(tree_id, principal, "update_member", |graph| {
            let member = graph.registry_mut().save(Some(member_id), data.clone())?;
            Ok(member.clone())
        })
    }

    /// Deletes a member after detaching it from every couple.
    pub fn delete_member(
        &self,
        tree_id: TreeId,
        member_id: MemberId,
        principal: &Principal,
    ) -> FamilyServiceResult<()> {
        self.mutate(tree_id, principal, "delete_member", |graph| {
            let detachment = graph.detach_member(member_id)?;
            graph
                .registry_mut()
                .delete(member_id)
                .ok_or(FamilyServiceError::MemberNotFound(member_id))?;
            debug!(
                "event=member_detach module=service status=ok tree_id={tree_id} member_id={member_id} promoted={} dissolved={} orphaned={}",
                detachment.promoted_partners.len(),
                detachment.dissolved_couples.len(),
                detachment.orphaned_children.len()
            );
            Ok(())
        })
    }

    /// Rebuilds couples from father/mother or primary/secondary records.
    pub fn import_legacy_parentage(
        &self,
        tree_id: TreeId,
        records: &[LegacyParentage],
        principal: &Principal,
    ) -> FamilyServiceResult<LegacyImportSummary> {
        let summary = self.mutate(tree_id, principal, "legacy_import", |graph| {
            graph.import_legacy(records).map_err(Into::into)
        })?;
        info!(
            "event=legacy_import module=service status=ok tree_id={tree_id} records={} linked_children={} created_couples={}",
            records.len(),
            summary.linked_children,
            summary.created_couples
        );
        Ok(summary)
    }

    fn find_tree(&self, tree_id: TreeId) -> FamilyServiceResult<FamilyTree> {
        self.repo
            .get_tree(tree_id)?
            .ok_or(FamilyServiceError::TreeNotFound(tree_id))
    }

    fn readable_tree(
        &self,
        tree_id: TreeId,
        principal: &Principal,
    ) -> FamilyServiceResult<FamilyTree> {
        let tree = self.find_tree(tree_id)?;
        access::ensure_readable(&tree, principal).map_err(|err| access_error(tree_id, err))?;
        Ok(tree)
    }

    fn readable_snapshot(
        &self,
        tree_id: TreeId,
        principal: &Principal,
    ) -> FamilyServiceResult<TreeSnapshot> {
        let snapshot = self
            .repo
            .load_snapshot(tree_id)?
            .ok_or(FamilyServiceError::TreeNotFound(tree_id))?;
        access::ensure_readable(&snapshot.tree, principal)
            .map_err(|err| access_error(tree_id, err))?;
        Ok(snapshot)
    }

    /// Load, check, mutate, verify and commit; retried on version conflicts.
    fn mutate<T>(
        &self,
        tree_id: TreeId,
        principal: &Principal,
        operation: &'static str,
        mut apply: impl FnMut(&mut FamilyGraph) -> FamilyServiceResult<T>,
    ) -> FamilyServiceResult<T> {
        let mut attempt = 1;
        loop {
            let snapshot = self
                .repo
                .load_snapshot(tree_id)?
                .ok_or(FamilyServiceError::TreeNotFound(tree_id))?;
            access::ensure_writable(&snapshot.tree, principal)
                .map_err(|err| access_error(tree_id, err))?;

            let expected_version = snapshot.tree.version;
            let (_, before) = snapshot.into_graph();
            let mut after = before.clone();
            let output = apply(&mut after)?;
            after.check_integrity()?;

            let changes = TreeChangeSet::between(expected_version, &before, &after);
            if changes.is_empty() {
                return Ok(output);
            }

            match self.repo.commit(&changes) {
                Ok(version) => {
                    info!(
                        "event=tree_commit module=service status=ok operation={operation} tree_id={tree_id} version={version} attempt={attempt}"
                    );
                    return Ok(output);
                }
                Err(FamilyRepoError::VersionConflict { actual, .. })
                    if attempt < self.max_commit_retries =>
                {
                    warn!(
                        "event=tree_commit module=service status=retry operation={operation} tree_id={tree_id} expected_version={expected_version} actual_version={actual} attempt={attempt}"
                    );
                    attempt += 1;
                }
                Err(FamilyRepoError::VersionConflict { .. }) => {
                    warn!(
                        "event=tree_commit module=service status=error operation={operation} tree_id={tree_id} error_code=concurrent_modification attempt={attempt}"
                    );
                    return Err(FamilyServiceError::ConcurrentModification {
                        tree_id,
                        attempts: attempt,
                    });
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

fn access_error(tree_id: TreeId, err: AccessError) -> FamilyServiceError {
    match err {
        AccessError::TreeHidden => FamilyServiceError::TreeNotFound(tree_id),
        AccessError::WriteForbidden => FamilyServiceError::AccessDenied(tree_id),
    }
}

fn resolve_parents(
    graph: &FamilyGraph,
    primary_parent_id: MemberId,
    partner_parent_id: Option<MemberId>,
) -> FamilyServiceResult<(MemberId, Option<MemberId>)> {
    let primary_id =
        resolve_required(primary_parent_id, graph.registry(), ParentRole::Primary)?.id;
    let partner_ref = partner_parent_id.map(MemberRef::from);
    let partner_id = resolve_parent(partner_ref.as_ref(), graph.registry(), ParentRole::Secondary)?
        .map(|member| member.id);
    Ok((primary_id, partner_id))
}

fn member_of(graph: &FamilyGraph, member_id: MemberId) -> FamilyServiceResult<FamilyMember> {
    graph
        .registry()
        .find_by_id(member_id)
        .cloned()
        .ok_or(FamilyServiceError::MemberNotFound(member_id))
}

fn couple_of(
    graph: &FamilyGraph,
    couple_id: CoupleId,
    main_member_id: MemberId,
    partner_id: Option<MemberId>,
) -> FamilyServiceResult<Couple> {
    graph
        .couple(couple_id)
        .cloned()
        .ok_or_else(|| {
            GraphError::CoupleNotFound {
                main_member_id,
                partner_id,
            }
            .into()
        })
}
