use famtree_core::db::migrations::latest_version;
use famtree_core::db::{open_db, open_db_in_memory, DbError};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "family_trees");
    assert_table_exists(&conn, "family_members");
    assert_table_exists(&conn, "couples");
    assert_table_exists(&conn, "couple_children");
}

#[test]
fn connections_enforce_foreign_keys() {
    let conn = open_db_in_memory().unwrap();
    let enabled: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(enabled, 1);
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("famtree.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "couples");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    assert_eq!(
        err.to_string(),
        format!(
            "family database schema version 999 is newer than this build supports ({}, 0002_couples.sql)",
            latest_version()
        )
    );
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
            latest_script,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
            assert_eq!(latest_script, "0002_couples.sql");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn schema_rejects_member_in_two_partner_slots() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "INSERT INTO family_trees (tree_uuid, name, visibility, owner_username)
         VALUES ('t', 'Doe', 'private', 'alice');
         INSERT INTO family_members
             (member_uuid, tree_uuid, first_name, last_name, birthday, gender, sort_order)
         VALUES ('a', 't', 'A', 'Doe', '1970-01-01', 'male', 0),
                ('b', 't', 'B', 'Doe', '1970-01-01', 'female', 1),
                ('c', 't', 'C', 'Doe', '1970-01-01', 'other', 2);
         INSERT INTO couples (couple_uuid, tree_uuid, main_member_uuid, partner_member_uuid, sort_order)
         VALUES ('c1', 't', 'a', 'b', 0);",
    )
    .unwrap();

    let result = conn.execute(
        "INSERT INTO couples (couple_uuid, tree_uuid, main_member_uuid, partner_member_uuid, sort_order)
         VALUES ('c2', 't', 'c', 'b', 1);",
        [],
    );
    assert!(result.is_err());
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
