//! Table definitions and the idempotent startup migration.

use std::path::Path;

use rusqlite::Connection;
use tracing::info;

use crate::error::{ListingError, PersistenceStep, Result};

pub const CATEGORIES_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS categories (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    );
";

pub const ITEMS_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS items (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        category_id INTEGER NOT NULL,
        image_name TEXT NOT NULL,
        FOREIGN KEY(category_id) REFERENCES categories(id)
    );
";

/// File names looked up in an external schema directory
pub const CATEGORIES_SCHEMA_FILE: &str = "categories.sql";
pub const ITEMS_SCHEMA_FILE: &str = "items.sql";

/// Where the table definitions come from
#[derive(Debug, Clone)]
pub struct SchemaSource {
    pub categories: String,
    pub items: String,
}

impl Default for SchemaSource {
    fn default() -> Self {
        Self {
            categories: CATEGORIES_SCHEMA.to_string(),
            items: ITEMS_SCHEMA.to_string(),
        }
    }
}

impl SchemaSource {
    /// Load `categories.sql` and `items.sql` from `dir`
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let read = |name: &str| {
            let path = dir.join(name);
            std::fs::read_to_string(&path).map_err(|e| ListingError::storage(&path, e))
        };

        Ok(Self {
            categories: read(CATEGORIES_SCHEMA_FILE)?,
            items: read(ITEMS_SCHEMA_FILE)?,
        })
    }
}

/// Create both tables if absent. Categories go first because items
/// reference them.
pub fn migrate(conn: &Connection, source: &SchemaSource) -> Result<()> {
    conn.execute_batch(&source.categories)
        .map_err(|e| ListingError::persistence(PersistenceStep::Migrate, e))?;
    conn.execute_batch(&source.items)
        .map_err(|e| ListingError::persistence(PersistenceStep::Migrate, e))?;

    info!("Database schema ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn table_names(conn: &Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap();
        stmt.query_map([], |row| row.get(0))
            .unwrap()
            .collect::<rusqlite::Result<Vec<String>>>()
            .unwrap()
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        let source = SchemaSource::default();

        migrate(&conn, &source).unwrap();
        migrate(&conn, &source).unwrap();

        let tables = table_names(&conn);
        assert!(tables.contains(&"categories".to_string()));
        assert!(tables.contains(&"items".to_string()));
    }

    #[test]
    fn test_schema_from_dir() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(CATEGORIES_SCHEMA_FILE), CATEGORIES_SCHEMA).unwrap();
        std::fs::write(temp.path().join(ITEMS_SCHEMA_FILE), ITEMS_SCHEMA).unwrap();

        let source = SchemaSource::from_dir(temp.path()).unwrap();
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn, &source).unwrap();
        let tables = table_names(&conn);
        assert!(tables.contains(&"categories".to_string()));
        assert!(tables.contains(&"items".to_string()));
    }

    #[test]
    fn test_missing_schema_file_is_storage_error() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            SchemaSource::from_dir(temp.path()),
            Err(ListingError::Storage { .. })
        ));
    }
}
