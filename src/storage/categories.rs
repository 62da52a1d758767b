//! Category resolver: maps a category name to its id, creating the row on
//! first use.
//!
//! Lookups return `Option` so "no such category" never travels through
//! the error channel. Two transactions creating the same new name at once
//! are not reconciled here: the loser hits the `UNIQUE` constraint and gets
//! [`ListingError::Conflict`].

use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Transaction};
use tracing::info;

use crate::domain::{Category, CategoryId};
use crate::error::{ListingError, PersistenceStep, Result};

/// Look up a category id by exact name
pub fn find(conn: &Connection, name: &str) -> Result<Option<CategoryId>> {
    conn.query_row(
        "SELECT id FROM categories WHERE name = ?1",
        params![name],
        |row| row.get(0).map(CategoryId),
    )
    .optional()
    .map_err(|e| ListingError::persistence(PersistenceStep::ResolveCategory, e))
}

/// Return the id for `name`, inserting the category if it does not exist.
///
/// Runs inside the caller's transaction so a later failure rolls the new
/// category back together with everything else.
pub fn resolve_or_create(tx: &Transaction<'_>, name: &str) -> Result<CategoryId> {
    if let Some(id) = find(tx, name)? {
        return Ok(id);
    }

    let id = insert(tx, name)?;
    info!(category = name, id = %id, "Created category");
    Ok(id)
}

/// Insert a new category row
pub fn insert(conn: &Connection, name: &str) -> Result<CategoryId> {
    conn.execute("INSERT INTO categories (name) VALUES (?1)", params![name])
        .map_err(|e| {
            if is_unique_violation(&e) {
                ListingError::Conflict(name.to_string())
            } else {
                ListingError::persistence(PersistenceStep::ResolveCategory, e)
            }
        })?;

    Ok(CategoryId(conn.last_insert_rowid()))
}

/// All categories ordered by id
pub fn list(conn: &Connection) -> Result<Vec<Category>> {
    let query = |conn: &Connection| -> rusqlite::Result<Vec<Category>> {
        let mut stmt = conn.prepare("SELECT id, name FROM categories ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok(Category {
                id: CategoryId(row.get(0)?),
                name: row.get(1)?,
            })
        })?;
        rows.collect()
    };

    query(conn).map_err(|e| ListingError::persistence(PersistenceStep::Query, e))
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.code == ErrorCode::ConstraintViolation
                && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::schema::{migrate, SchemaSource};

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn, &SchemaSource::default()).unwrap();
        conn
    }

    #[test]
    fn test_resolve_creates_once() {
        let mut conn = test_conn();

        let tx = conn.transaction().unwrap();
        let first = resolve_or_create(&tx, "fashion").unwrap();
        let second = resolve_or_create(&tx, "fashion").unwrap();
        tx.commit().unwrap();

        assert_eq!(first, second);
        assert_eq!(list(&conn).unwrap().len(), 1);
    }

    #[test]
    fn test_distinct_names_get_distinct_ids() {
        let mut conn = test_conn();

        let tx = conn.transaction().unwrap();
        let fashion = resolve_or_create(&tx, "fashion").unwrap();
        let toys = resolve_or_create(&tx, "toys").unwrap();
        tx.commit().unwrap();

        assert_ne!(fashion, toys);
        assert_eq!(find(&conn, "toys").unwrap(), Some(toys));
    }

    #[test]
    fn test_lookup_is_exact() {
        let mut conn = test_conn();

        let tx = conn.transaction().unwrap();
        resolve_or_create(&tx, "fashion").unwrap();
        tx.commit().unwrap();

        assert_eq!(find(&conn, "Fashion").unwrap(), None);
        assert_eq!(find(&conn, "missing").unwrap(), None);
    }

    #[test]
    fn test_duplicate_insert_is_conflict() {
        let conn = test_conn();
        insert(&conn, "fashion").unwrap();

        match insert(&conn, "fashion") {
            Err(ListingError::Conflict(name)) => assert_eq!(name, "fashion"),
            other => panic!("expected conflict, got {:?}", other),
        }
    }

    #[test]
    fn test_rollback_discards_new_category() {
        let mut conn = test_conn();

        let tx = conn.transaction().unwrap();
        resolve_or_create(&tx, "fashion").unwrap();
        drop(tx);

        assert!(list(&conn).unwrap().is_empty());
    }
}
