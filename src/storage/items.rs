//! Item persistence on top of the connection pool.
//!
//! Everything here is blocking; [`ItemRepository`](crate::ItemRepository)
//! runs it on the blocking thread pool.

use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use tracing::debug;

use crate::domain::{Item, ItemId};
use crate::error::{ListingError, PersistenceStep, Result};

use super::categories;
use super::content::ImageKey;
use super::pool::DbPool;
use super::schema::{self, SchemaSource};

const SELECT_ITEMS: &str = "
    SELECT items.id, items.name, categories.name, items.image_name
    FROM items JOIN categories ON items.category_id = categories.id
";

/// SQL access to the `items` and `categories` tables
#[derive(Debug, Clone)]
pub struct ItemStore {
    pool: DbPool,
}

impl ItemStore {
    /// Create a store over an existing pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get the underlying pool
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Run the idempotent schema migration
    pub fn migrate(&self, source: &SchemaSource) -> Result<()> {
        let conn = self.pool.get()?;
        schema::migrate(&conn, source)
    }

    /// Insert an item, creating its category if needed, in one transaction.
    ///
    /// Either the category (when new) and the item both commit, or neither
    /// does: the transaction rolls back when dropped on any early return.
    /// `BEGIN IMMEDIATE` takes the write lock up front, so concurrent
    /// ingestions queue on the busy timeout instead of racing the lookup.
    pub fn insert(&self, name: &str, category: &str, image_key: &ImageKey) -> Result<ItemId> {
        let mut conn = self.pool.get()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| ListingError::persistence(PersistenceStep::Begin, e))?;

        let category_id = categories::resolve_or_create(&tx, category)?;

        tx.execute(
            "INSERT INTO items (name, category_id, image_name) VALUES (?1, ?2, ?3)",
            params![name, category_id.0, image_key],
        )
        .map_err(|e| ListingError::persistence(PersistenceStep::InsertItem, e))?;
        let id = ItemId(tx.last_insert_rowid());

        tx.commit()
            .map_err(|e| ListingError::persistence(PersistenceStep::Commit, e))?;

        debug!(id = %id, category_id = %category_id, "Inserted item");
        Ok(id)
    }

    /// All items in insertion order
    pub fn list_all(&self) -> Result<Vec<Item>> {
        let conn = self.pool.get()?;
        query_items(&conn, &format!("{} ORDER BY items.id", SELECT_ITEMS), params![])
    }

    /// Items whose name contains `keyword`.
    ///
    /// Uses `LIKE` with wildcards in the keyword escaped, so the match is a
    /// literal substring test that ignores ASCII case. An empty keyword
    /// matches every item.
    pub fn search(&self, keyword: &str) -> Result<Vec<Item>> {
        let conn = self.pool.get()?;
        let sql = format!(
            "{} WHERE items.name LIKE '%' || ?1 || '%' ESCAPE '\\' ORDER BY items.id",
            SELECT_ITEMS
        );
        query_items(&conn, &sql, params![escape_like(keyword)])
    }

    /// A single item
    pub fn get(&self, id: ItemId) -> Result<Item> {
        let conn = self.pool.get()?;
        conn.query_row(
            &format!("{} WHERE items.id = ?1", SELECT_ITEMS),
            params![id.0],
            item_from_row,
        )
        .optional()
        .map_err(|e| ListingError::persistence(PersistenceStep::Query, e))?
        .ok_or(ListingError::NotFound(id.0))
    }

    /// The image key stored for an item
    pub fn image_key(&self, id: ItemId) -> Result<ImageKey> {
        let conn = self.pool.get()?;
        conn.query_row(
            "SELECT image_name FROM items WHERE id = ?1",
            params![id.0],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| ListingError::persistence(PersistenceStep::Query, e))?
        .ok_or(ListingError::NotFound(id.0))
    }
}

fn query_items(conn: &Connection, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<Item>> {
    let run = || -> rusqlite::Result<Vec<Item>> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, item_from_row)?;
        rows.collect()
    };

    run().map_err(|e| ListingError::persistence(PersistenceStep::Query, e))
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<Item> {
    Ok(Item {
        id: ItemId(row.get(0)?),
        name: row.get(1)?,
        category: row.get(2)?,
        image_key: row.get(3)?,
    })
}

/// Escape `LIKE` wildcards so they match literally
fn escape_like(keyword: &str) -> String {
    let mut escaped = String::with_capacity(keyword.len());
    for c in keyword.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_store() -> (ItemStore, TempDir) {
        let temp = TempDir::new().unwrap();
        let pool = DbPool::open(temp.path().join("items.sqlite3"), 2).unwrap();
        let store = ItemStore::new(pool);
        store.migrate(&SchemaSource::default()).unwrap();
        (store, temp)
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%"), "50\\%");
        assert_eq!(escape_like("a_b"), "a\\_b");
        assert_eq!(escape_like("c:\\"), "c:\\\\");
        assert_eq!(escape_like("shirt"), "shirt");
    }

    #[test]
    fn test_insert_and_get() {
        let (store, _temp) = test_store();
        let key = ImageKey::from_bytes(b"img");

        let id = store.insert("shirt", "fashion", &key).unwrap();
        let item = store.get(id).unwrap();

        assert_eq!(item.name, "shirt");
        assert_eq!(item.category, "fashion");
        assert_eq!(item.image_key, key);
        assert_eq!(store.image_key(id).unwrap(), key);
    }

    #[test]
    fn test_missing_item_is_not_found() {
        let (store, _temp) = test_store();
        assert!(matches!(store.get(ItemId(99)), Err(ListingError::NotFound(99))));
        assert!(matches!(
            store.image_key(ItemId(99)),
            Err(ListingError::NotFound(99))
        ));
    }

    #[test]
    fn test_search_treats_wildcards_literally() {
        let (store, _temp) = test_store();
        let key = ImageKey::from_bytes(b"img");
        store.insert("100% cotton", "fashion", &key).unwrap();
        store.insert("1000 pieces", "toys", &key).unwrap();

        let hits = store.search("0%").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "100% cotton");

        assert!(store.search("_").unwrap().is_empty());
    }

    #[test]
    fn test_search_ignores_ascii_case() {
        let (store, _temp) = test_store();
        let key = ImageKey::from_bytes(b"img");
        store.insert("Red Shirt", "fashion", &key).unwrap();

        assert_eq!(store.search("red shirt").unwrap().len(), 1);
        assert_eq!(store.search("SHIRT").unwrap().len(), 1);
    }
}
