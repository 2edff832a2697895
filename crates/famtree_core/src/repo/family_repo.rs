//! Family tree repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide tree, member and couple reads scoped to one tree.
//! - Persist relationship mutations as one atomic, versioned change set.
//!
//! # Invariants
//! - `commit` applies nothing unless the stored tree version equals the
//!   snapshot version; on success the version increases by one.
//! - Member and couple listings are deterministic: `sort_order ASC, uuid ASC`.
//! - Children keep their per-couple insertion order.

use crate::db::migrations::{current_user_version, latest_version};
use crate::db::DbError;
use crate::graph::registry::MemberRegistry;
use crate::graph::FamilyGraph;
use crate::model::couple::{Couple, CoupleId};
use crate::model::member::{FamilyMember, Gender, MemberId};
use crate::model::tree::{FamilyTree, TreeData, TreeId, Visibility};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const DATE_FORMAT: &str = "%Y-%m-%d";

const TREE_SELECT_SQL: &str = "SELECT
    tree_uuid,
    name,
    visibility,
    owner_username,
    created_at,
    version
FROM family_trees";

const MEMBER_SELECT_SQL: &str = "SELECT
    member_uuid,
    tree_uuid,
    first_name,
    last_name,
    birthday,
    date_of_death,
    gender
FROM family_members";

const REQUIRED_TABLES: &[&str] = &["family_trees", "family_members", "couples", "couple_children"];

/// Result type used by family repository operations.
pub type FamilyRepoResult<T> = Result<T, FamilyRepoError>;

/// Errors from family repository operations.
#[derive(Debug)]
pub enum FamilyRepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Target tree does not exist.
    TreeNotFound(TreeId),
    /// Tree changed since the snapshot was loaded.
    VersionConflict {
        tree_id: TreeId,
        expected: i64,
        actual: i64,
    },
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
}

impl Display for FamilyRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::TreeNotFound(id) => write!(f, "family tree not found: {id}"),
            Self::VersionConflict {
                tree_id,
                expected,
                actual,
            } => write!(
                f,
                "family tree {tree_id} changed concurrently: expected version {expected}, found {actual}"
            ),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "family repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "family repository requires table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid family data: {message}"),
        }
    }
}

impl Error for FamilyRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for FamilyRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for FamilyRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Tree plus its members and couples, read at one version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeSnapshot {
    pub tree: FamilyTree,
    pub members: Vec<FamilyMember>,
    pub couples: Vec<Couple>,
}

impl TreeSnapshot {
    /// Splits the snapshot into tree metadata and its relationship graph.
    pub fn into_graph(self) -> (FamilyTree, FamilyGraph) {
        let registry = MemberRegistry::new(self.tree.id, self.members);
        (self.tree, FamilyGraph::new(registry, self.couples))
    }
}

/// Row-level changes of one tree, applied atomically by `commit`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeChangeSet {
    pub tree_id: TreeId,
    /// Version the changes were computed against.
    pub expected_version: i64,
    pub upserted_members: Vec<FamilyMember>,
    pub deleted_members: Vec<MemberId>,
    pub upserted_couples: Vec<Couple>,
    pub deleted_couples: Vec<CoupleId>,
}

impl TreeChangeSet {
    /// Diffs two graphs of the same tree.
    pub fn between(expected_version: i64, before: &FamilyGraph, after: &FamilyGraph) -> Self {
        let upserted_members = after
            .registry()
            .find_all()
            .iter()
            .filter(|member| before.registry().find_by_id(member.id) != Some(*member))
            .cloned()
            .collect();
        let deleted_members = before
            .registry()
            .find_all()
            .iter()
            .filter(|member| !after.registry().contains(member.id))
            .map(|member| member.id)
            .collect();
        let upserted_couples = after
            .couples()
            .iter()
            .filter(|couple| before.couple(couple.id) != Some(*couple))
            .cloned()
            .collect();
        let deleted_couples = before
            .couples()
            .iter()
            .filter(|couple| after.couple(couple.id).is_none())
            .map(|couple| couple.id)
            .collect();

        Self {
            tree_id: after.tree_id(),
            expected_version,
            upserted_members,
            deleted_members,
            upserted_couples,
            deleted_couples,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.upserted_members.is_empty()
            && self.deleted_members.is_empty()
            && self.upserted_couples.is_empty()
            && self.deleted_couples.is_empty()
    }
}

/// Persistence collaborator for family trees.
pub trait FamilyRepository {
    /// Creates one tree owned by `owner`.
    fn create_tree(&self, data: &TreeData, owner: &str) -> FamilyRepoResult<FamilyTree>;
    /// Loads one tree by id.
    fn get_tree(&self, tree_id: TreeId) -> FamilyRepoResult<Option<FamilyTree>>;
    /// Lists every tree in creation order.
    fn list_trees(&self) -> FamilyRepoResult<Vec<FamilyTree>>;
    /// Persists tree name and visibility.
    fn save_tree(&self, tree: &FamilyTree) -> FamilyRepoResult<FamilyTree>;
    /// Loads one member scoped to its tree.
    fn get_member(
        &self,
        tree_id: TreeId,
        member_id: MemberId,
    ) -> FamilyRepoResult<Option<FamilyMember>>;
    /// Lists members of one tree.
    fn list_members(&self, tree_id: TreeId) -> FamilyRepoResult<Vec<FamilyMember>>;
    /// Lists couples of one tree with their children.
    fn list_couples(&self, tree_id: TreeId) -> FamilyRepoResult<Vec<Couple>>;
    /// Loads tree, members and couples consistently.
    fn load_snapshot(&self, tree_id: TreeId) -> FamilyRepoResult<Option<TreeSnapshot>>;
    /// Applies a change set if the tree is still at `expected_version`.
    ///
    /// Returns the new tree version.
    fn commit(&self, changes: &TreeChangeSet) -> FamilyRepoResult<i64>;
}

/// SQLite-backed family repository.
pub struct SqliteFamilyRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteFamilyRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> FamilyRepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl FamilyRepository for SqliteFamilyRepository<'_> {
    fn create_tree(&self, data: &TreeData, owner: &str) -> FamilyRepoResult<FamilyTree> {
        let tree_id = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO family_trees (
                tree_uuid,
                name,
                visibility,
                owner_username
            ) VALUES (?1, ?2, ?3, ?4);",
            params![
                tree_id.to_string(),
                data.name.as_str(),
                data.visibility.as_str(),
                owner,
            ],
        )?;
        query_tree(self.conn, tree_id)?.ok_or(FamilyRepoError::TreeNotFound(tree_id))
    }

    fn get_tree(&self, tree_id: TreeId) -> FamilyRepoResult<Option<FamilyTree>> {
        query_tree(self.conn, tree_id)
    }

    fn list_trees(&self) -> FamilyRepoResult<Vec<FamilyTree>> {
        let mut stmt = self.conn.prepare(&format!(
            "{TREE_SELECT_SQL} ORDER BY created_at ASC, rowid ASC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut trees = Vec::new();
        while let Some(row) = rows.next()? {
            trees.push(parse_tree_row(row)?);
        }
        Ok(trees)
    }

    fn save_tree(&self, tree: &FamilyTree) -> FamilyRepoResult<FamilyTree> {
        let changed = self.conn.execute(
            "UPDATE family_trees
             SET name = ?2,
                 visibility = ?3,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE tree_uuid = ?1;",
            params![
                tree.id.to_string(),
                tree.name.as_str(),
                tree.visibility.as_str(),
            ],
        )?;
        if changed == 0 {
            return Err(FamilyRepoError::TreeNotFound(tree.id));
        }
        query_tree(self.conn, tree.id)?.ok_or(FamilyRepoError::TreeNotFound(tree.id))
    }

    fn get_member(
        &self,
        tree_id: TreeId,
        member_id: MemberId,
    ) -> FamilyRepoResult<Option<FamilyMember>> {
        let mut stmt = self.conn.prepare(&format!(
            "{MEMBER_SELECT_SQL}
             WHERE tree_uuid = ?1
               AND member_uuid = ?2;"
        ))?;
        let mut rows = stmt.query(params![tree_id.to_string(), member_id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_member_row(row)?));
        }
        Ok(None)
    }

    fn list_members(&self, tree_id: TreeId) -> FamilyRepoResult<Vec<FamilyMember>> {
        query_members(self.conn, tree_id)
    }

    fn list_couples(&self, tree_id: TreeId) -> FamilyRepoResult<Vec<Couple>> {
        query_couples(self.conn, tree_id)
    }

    fn load_snapshot(&self, tree_id: TreeId) -> FamilyRepoResult<Option<TreeSnapshot>> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Deferred)?;
        let Some(tree) = query_tree(&tx, tree_id)? else {
            return Ok(None);
        };
        let members = query_members(&tx, tree_id)?;
        let couples = query_couples(&tx, tree_id)?;
        tx.commit()?;

        Ok(Some(TreeSnapshot {
            tree,
            members,
            couples,
        }))
    }

    fn commit(&self, changes: &TreeChangeSet) -> FamilyRepoResult<i64> {
        let tree_id = changes.tree_id;
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        let actual: i64 = tx
            .query_row(
                "SELECT version FROM family_trees WHERE tree_uuid = ?1;",
                [tree_id.to_string()],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(FamilyRepoError::TreeNotFound(tree_id))?;
        if actual != changes.expected_version {
            return Err(FamilyRepoError::VersionConflict {
                tree_id,
                expected: changes.expected_version,
                actual,
            });
        }

        let touched_couples = changes
            .deleted_couples
            .iter()
            .chain(changes.upserted_couples.iter().map(|couple| &couple.id));
        for couple_id in touched_couples {
            tx.execute(
                "DELETE FROM couple_children WHERE couple_uuid = ?1;",
                [couple_id.to_string()],
            )?;
        }
        for couple_id in &changes.deleted_couples {
            tx.execute(
                "DELETE FROM couples WHERE couple_uuid = ?1 AND tree_uuid = ?2;",
                params![couple_id.to_string(), tree_id.to_string()],
            )?;
        }
        for member in &changes.upserted_members {
            upsert_member(&tx, member)?;
        }
        for couple in &changes.upserted_couples {
            upsert_couple(&tx, couple)?;
        }
        for couple in &changes.upserted_couples {
            for (index, child_id) in couple.children.iter().enumerate() {
                tx.execute(
                    "INSERT INTO couple_children (couple_uuid, child_uuid, sort_order)
                     VALUES (?1, ?2, ?3);",
                    params![couple.id.to_string(), child_id.to_string(), index as i64],
                )?;
            }
        }
        for member_id in &changes.deleted_members {
            tx.execute(
                "DELETE FROM family_members WHERE member_uuid = ?1 AND tree_uuid = ?2;",
                params![member_id.to_string(), tree_id.to_string()],
            )?;
        }

        tx.execute(
            "UPDATE family_trees
             SET version = version + 1,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE tree_uuid = ?1;",
            [tree_id.to_string()],
        )?;
        tx.commit()?;
        Ok(actual + 1)
    }
}

fn query_tree(conn: &Connection, tree_id: TreeId) -> FamilyRepoResult<Option<FamilyTree>> {
    let mut stmt = conn.prepare(&format!("{TREE_SELECT_SQL} WHERE tree_uuid = ?1;"))?;
    let mut rows = stmt.query([tree_id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_tree_row(row)?));
    }
    Ok(None)
}

fn query_members(conn: &Connection, tree_id: TreeId) -> FamilyRepoResult<Vec<FamilyMember>> {
    let mut stmt = conn.prepare(&format!(
        "{MEMBER_SELECT_SQL}
         WHERE tree_uuid = ?1
         ORDER BY sort_order ASC, member_uuid ASC;"
    ))?;
    let mut rows = stmt.query([tree_id.to_string()])?;
    let mut members = Vec::new();
    while let Some(row) = rows.next()? {
        members.push(parse_member_row(row)?);
    }
    Ok(members)
}

fn query_couples(conn: &Connection, tree_id: TreeId) -> FamilyRepoResult<Vec<Couple>> {
    let mut stmt = conn.prepare(
        "SELECT
            couple_uuid,
            tree_uuid,
            main_member_uuid,
            partner_member_uuid
         FROM couples
         WHERE tree_uuid = ?1
         ORDER BY sort_order ASC, couple_uuid ASC;",
    )?;
    let mut rows = stmt.query([tree_id.to_string()])?;
    let mut couples = Vec::new();
    while let Some(row) = rows.next()? {
        couples.push(parse_couple_row(row)?);
    }
    attach_children(conn, tree_id, &mut couples)?;
    Ok(couples)
}

fn attach_children(
    conn: &Connection,
    tree_id: TreeId,
    couples: &mut [Couple],
) -> FamilyRepoResult<()> {
    let mut stmt = conn.prepare(
        "SELECT cc.couple_uuid, cc.child_uuid
         FROM couple_children cc
         INNER JOIN couples c ON c.couple_uuid = cc.couple_uuid
         WHERE c.tree_uuid = ?1
         ORDER BY cc.couple_uuid ASC, cc.sort_order ASC;",
    )?;
    let mut rows = stmt.query([tree_id.to_string()])?;
    while let Some(row) = rows.next()? {
        let couple_text: String = row.get(0)?;
        let child_text: String = row.get(1)?;
        let couple_id = parse_uuid(&couple_text, "couple_children.couple_uuid")?;
        let child_id = parse_uuid(&child_text, "couple_children.child_uuid")?;

        let couple = couples
            .iter_mut()
            .find(|couple| couple.id == couple_id)
            .ok_or_else(|| {
                FamilyRepoError::InvalidData(format!(
                    "child row references unknown couple `{couple_id}`"
                ))
            })?;
        couple.children.push(child_id);
    }
    Ok(())
}

fn upsert_member(conn: &Connection, member: &FamilyMember) -> FamilyRepoResult<()> {
    let changed = conn.execute(
        "INSERT INTO family_members (
            member_uuid,
            tree_uuid,
            first_name,
            last_name,
            birthday,
            date_of_death,
            gender,
            sort_order
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5, ?6, ?7,
            (SELECT COALESCE(MAX(sort_order), -1) + 1 FROM family_members WHERE tree_uuid = ?2)
        )
        ON CONFLICT (member_uuid) DO UPDATE SET
            first_name = excluded.first_name,
            last_name = excluded.last_name,
            birthday = excluded.birthday,
            date_of_death = excluded.date_of_death,
            gender = excluded.gender,
            updated_at = (strftime('%s', 'now') * 1000)
        WHERE family_members.tree_uuid = excluded.tree_uuid;",
        params![
            member.id.to_string(),
            member.tree_id.to_string(),
            member.first_name.as_str(),
            member.last_name.as_str(),
            format_date(member.birthday),
            member.date_of_death.map(format_date),
            member.gender.as_str(),
        ],
    )?;
    if changed == 0 {
        return Err(FamilyRepoError::InvalidData(format!(
            "member `{}` belongs to another tree",
            member.id
        )));
    }
    Ok(())
}

fn upsert_couple(conn: &Connection, couple: &Couple) -> FamilyRepoResult<()> {
    let changed = conn.execute(
        "INSERT INTO couples (
            couple_uuid,
            tree_uuid,
            main_member_uuid,
            partner_member_uuid,
            sort_order
        ) VALUES (
            ?1, ?2, ?3, ?4,
            (SELECT COALESCE(MAX(sort_order), -1) + 1 FROM couples WHERE tree_uuid = ?2)
        )
        ON CONFLICT (couple_uuid) DO UPDATE SET
            main_member_uuid = excluded.main_member_uuid,
            partner_member_uuid = excluded.partner_member_uuid,
            updated_at = (strftime('%s', 'now') * 1000)
        WHERE couples.tree_uuid = excluded.tree_uuid;",
        params![
            couple.id.to_string(),
            couple.tree_id.to_string(),
            couple.main_member_id.to_string(),
            couple.partner_id.map(|value| value.to_string()),
        ],
    )?;
    if changed == 0 {
        return Err(FamilyRepoError::InvalidData(format!(
            "couple `{}` belongs to another tree",
            couple.id
        )));
    }
    Ok(())
}

fn parse_tree_row(row: &Row<'_>) -> FamilyRepoResult<FamilyTree> {
    let id_text: String = row.get("tree_uuid")?;
    let visibility_text: String = row.get("visibility")?;
    let visibility = match visibility_text.as_str() {
        "private" => Visibility::Private,
        "public" => Visibility::Public,
        other => {
            return Err(FamilyRepoError::InvalidData(format!(
                "invalid visibility `{other}` in family_trees.visibility"
            )));
        }
    };

    Ok(FamilyTree {
        id: parse_uuid(&id_text, "family_trees.tree_uuid")?,
        name: row.get("name")?,
        visibility,
        owner: row.get("owner_username")?,
        created_at: row.get("created_at")?,
        version: row.get("version")?,
    })
}

fn parse_member_row(row: &Row<'_>) -> FamilyRepoResult<FamilyMember> {
    let id_text: String = row.get("member_uuid")?;
    let tree_text: String = row.get("tree_uuid")?;
    let birthday_text: String = row.get("birthday")?;
    let death_text: Option<String> = row.get("date_of_death")?;
    let gender_text: String = row.get("gender")?;
    let gender = Gender::parse(&gender_text).ok_or_else(|| {
        FamilyRepoError::InvalidData(format!(
            "invalid gender `{gender_text}` in family_members.gender"
        ))
    })?;

    Ok(FamilyMember {
        id: parse_uuid(&id_text, "family_members.member_uuid")?,
        tree_id: parse_uuid(&tree_text, "family_members.tree_uuid")?,
        first_name: row.get("first_name")?,
        last_name: row.get("last_name")?,
        birthday: parse_date(&birthday_text, "family_members.birthday")?,
        date_of_death: death_text
            .map(|value| parse_date(&value, "family_members.date_of_death"))
            .transpose()?,
        gender,
    })
}

fn parse_couple_row(row: &Row<'_>) -> FamilyRepoResult<Couple> {
    let id_text: String = row.get("couple_uuid")?;
    let tree_text: String = row.get("tree_uuid")?;
    let main_text: String = row.get("main_member_uuid")?;
    let partner_id = row
        .get::<_, Option<String>>("partner_member_uuid")?
        .map(|value| parse_uuid(&value, "couples.partner_member_uuid"))
        .transpose()?;

    Ok(Couple {
        id: parse_uuid(&id_text, "couples.couple_uuid")?,
        tree_id: parse_uuid(&tree_text, "couples.tree_uuid")?,
        main_member_id: parse_uuid(&main_text, "couples.main_member_uuid")?,
        partner_id,
        children: Vec::new(),
    })
}

fn format_date(value: NaiveDate) -> String {
    value.format(DATE_FORMAT).to_string()
}

fn parse_date(value: &str, column: &'static str) -> FamilyRepoResult<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|_| FamilyRepoError::InvalidData(format!("invalid date `{value}` in {column}")))
}

fn parse_uuid(value: &str, column: &'static str) -> FamilyRepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| FamilyRepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

fn ensure_connection_ready(conn: &Connection) -> FamilyRepoResult<()> {
    let expected_version = latest_version();
    let actual_version = current_user_version(conn)?;
    if actual_version != expected_version {
        return Err(FamilyRepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in REQUIRED_TABLES {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [*table],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(FamilyRepoError::MissingRequiredTable(*table));
        }
    }
    Ok(())
}
