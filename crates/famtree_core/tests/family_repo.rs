use chrono::NaiveDate;
use famtree_core::db::open_db_in_memory;
use famtree_core::{
    FamilyGraph, FamilyRepoError, FamilyRepository, Gender, MemberData, MemberId, RootPolicy,
    SqliteFamilyRepository, TreeChangeSet, TreeData, TreeId, Visibility,
};
use rusqlite::Connection;
use uuid::Uuid;

fn member(first_name: &str) -> MemberData {
    MemberData::new(
        first_name,
        "Doe",
        NaiveDate::from_ymd_opt(1960, 5, 17).unwrap(),
        Gender::Other,
    )
}

fn load_graph(repo: &SqliteFamilyRepository<'_>, tree_id: TreeId) -> (i64, FamilyGraph) {
    let (tree, graph) = repo.load_snapshot(tree_id).unwrap().unwrap().into_graph();
    (tree.version, graph)
}

fn save(graph: &mut FamilyGraph, first_name: &str) -> MemberId {
    graph.registry_mut().save(None, member(first_name)).unwrap().id
}

#[test]
fn create_tree_starts_at_version_zero() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteFamilyRepository::try_new(&conn).unwrap();

    let tree = repo
        .create_tree(&TreeData::new("Doe", Visibility::Public), "alice")
        .unwrap();
    assert_eq!(tree.version, 0);
    assert_eq!(tree.owner, "alice");
    assert_eq!(repo.get_tree(tree.id).unwrap(), Some(tree.clone()));
    assert_eq!(repo.list_trees().unwrap(), vec![tree]);
}

#[test]
fn commit_persists_couples_with_child_order_and_bumps_version() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteFamilyRepository::try_new(&conn).unwrap();
    let tree = repo
        .create_tree(&TreeData::new("Doe", Visibility::Private), "alice")
        .unwrap();

    let (version, before) = load_graph(&repo, tree.id);
    let mut after = before.clone();
    let a = save(&mut after, "A");
    let b = save(&mut after, "B");
    let first = save(&mut after, "First");
    let second = save(&mut after, "Second");
    after.add_main_member(a, RootPolicy::Multiple).unwrap();
    after.add_partner(a, b).unwrap();
    after.add_child(a, Some(b), second).unwrap();
    after.add_child(a, Some(b), first).unwrap();

    let changes = TreeChangeSet::between(version, &before, &after);
    assert_eq!(changes.upserted_members.len(), 4);
    assert_eq!(repo.commit(&changes).unwrap(), 1);

    let (version, reloaded) = load_graph(&repo, tree.id);
    assert_eq!(version, 1);
    assert_eq!(reloaded, after);
    let names: Vec<String> = repo
        .list_members(tree.id)
        .unwrap()
        .into_iter()
        .map(|member| member.first_name)
        .collect();
    assert_eq!(names, vec!["A", "B", "First", "Second"]);
    assert_eq!(reloaded.couple_of(a).unwrap().children, vec![second, first]);
}

#[test]
fn stale_version_is_rejected_without_partial_writes() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteFamilyRepository::try_new(&conn).unwrap();
    let tree = repo
        .create_tree(&TreeData::new("Doe", Visibility::Private), "alice")
        .unwrap();

    let (version, before) = load_graph(&repo, tree.id);
    let mut first_writer = before.clone();
    let root = save(&mut first_writer, "Root");
    first_writer.add_main_member(root, RootPolicy::Multiple).unwrap();
    repo.commit(&TreeChangeSet::between(version, &before, &first_writer))
        .unwrap();

    let mut second_writer = before.clone();
    let other = save(&mut second_writer, "Other");
    second_writer
        .add_main_member(other, RootPolicy::Multiple)
        .unwrap();
    let err = repo
        .commit(&TreeChangeSet::between(version, &before, &second_writer))
        .unwrap_err();

    assert!(matches!(
        err,
        FamilyRepoError::VersionConflict {
            expected: 0,
            actual: 1,
            ..
        }
    ));
    assert_eq!(repo.list_members(tree.id).unwrap().len(), 1);
    assert_eq!(repo.list_couples(tree.id).unwrap().len(), 1);
}

#[test]
fn member_removal_clears_rows_in_one_commit() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteFamilyRepository::try_new(&conn).unwrap();
    let tree = repo
        .create_tree(&TreeData::new("Doe", Visibility::Private), "alice")
        .unwrap();

    let (version, before) = load_graph(&repo, tree.id);
    let mut graph = before.clone();
    let a = save(&mut graph, "A");
    let d = save(&mut graph, "D");
    graph.add_main_member(a, RootPolicy::Multiple).unwrap();
    graph.add_child(a, None, d).unwrap();
    repo.commit(&TreeChangeSet::between(version, &before, &graph))
        .unwrap();

    let (version, before) = load_graph(&repo, tree.id);
    let mut graph = before.clone();
    graph.remove_member(a).unwrap();
    let changes = TreeChangeSet::between(version, &before, &graph);
    assert_eq!(changes.deleted_members, vec![a]);
    assert_eq!(changes.deleted_couples.len(), 1);
    repo.commit(&changes).unwrap();

    let couples = repo.list_couples(tree.id).unwrap();
    assert_eq!(couples.len(), 1);
    assert_eq!(couples[0].main_member_id, d);
    assert!(couples[0].children.is_empty());
    assert_eq!(repo.get_member(tree.id, a).unwrap(), None);
}

#[test]
fn member_lookup_is_scoped_to_tree() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteFamilyRepository::try_new(&conn).unwrap();
    let first = repo
        .create_tree(&TreeData::new("First", Visibility::Public), "alice")
        .unwrap();
    let second = repo
        .create_tree(&TreeData::new("Second", Visibility::Public), "alice")
        .unwrap();

    let (version, before) = load_graph(&repo, first.id);
    let mut graph = before.clone();
    let a = save(&mut graph, "A");
    graph.add_main_member(a, RootPolicy::Multiple).unwrap();
    repo.commit(&TreeChangeSet::between(version, &before, &graph))
        .unwrap();

    assert!(repo.get_member(first.id, a).unwrap().is_some());
    assert_eq!(repo.get_member(second.id, a).unwrap(), None);
}

#[test]
fn unknown_tree_has_no_snapshot_and_rejects_commit() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteFamilyRepository::try_new(&conn).unwrap();
    let tree_id = Uuid::new_v4();

    assert!(repo.load_snapshot(tree_id).unwrap().is_none());
    let changes = TreeChangeSet {
        tree_id,
        ..TreeChangeSet::default()
    };
    assert!(matches!(
        repo.commit(&changes),
        Err(FamilyRepoError::TreeNotFound(id)) if id == tree_id
    ));
}

#[test]
fn save_tree_updates_metadata_without_touching_version() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteFamilyRepository::try_new(&conn).unwrap();
    let mut tree = repo
        .create_tree(&TreeData::new("Doe", Visibility::Private), "alice")
        .unwrap();

    tree.name = "Doe-Smith".to_string();
    tree.visibility = Visibility::Public;
    let saved = repo.save_tree(&tree).unwrap();
    assert_eq!(saved.name, "Doe-Smith");
    assert_eq!(saved.visibility, Visibility::Public);
    assert_eq!(saved.version, 0);
}

#[test]
fn unmigrated_connection_is_rejected() {
    let conn = Connection::open_in_memory().unwrap();
    let err = SqliteFamilyRepository::try_new(&conn).err().unwrap();
    assert!(matches!(
        err,
        FamilyRepoError::UninitializedConnection {
            actual_version: 0,
            ..
        }
    ));
}
