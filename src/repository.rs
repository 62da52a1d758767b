//! Item repository: the ingestion path and the read paths.
//!
//! Ingestion writes the image blob first, then resolves the category and
//! inserts the item in a single transaction. A failed transaction can
//! leave an orphan blob behind; that is harmless because blobs are
//! content-addressed and never collected.

use std::path::PathBuf;

use tracing::{info, instrument};

use crate::config::ResolvedConfig;
use crate::domain::{Item, ItemId, NewItem};
use crate::error::Result;
use crate::storage::{ContentStore, DbPool, ImageKey, ItemStore, SchemaSource};

/// Async facade over the content store and the item tables
#[derive(Debug, Clone)]
pub struct ItemRepository {
    content: ContentStore,
    items: ItemStore,
}

impl ItemRepository {
    /// Create a repository from already-opened stores
    pub fn new(content: ContentStore, items: ItemStore) -> Self {
        Self { content, items }
    }

    /// Open the pool, migrate the schema and prepare the image directory
    pub async fn open(config: &ResolvedConfig) -> Result<Self> {
        let db_path = config.db_path.clone();
        let pool_size = config.pool_size;
        let schema_dir = config.schema_dir.clone();

        let items = tokio::task::spawn_blocking(move || -> Result<ItemStore> {
            let source = match schema_dir {
                Some(dir) => SchemaSource::from_dir(&dir)?,
                None => SchemaSource::default(),
            };
            let store = ItemStore::new(DbPool::open(db_path, pool_size)?);
            store.migrate(&source)?;
            Ok(store)
        })
        .await??;

        let content = ContentStore::new(&config.image_dir)
            .with_default_image(&config.default_image);
        content.ensure_dir().await?;

        Ok(Self::new(content, items))
    }

    /// Get the content store
    pub fn content(&self) -> &ContentStore {
        &self.content
    }

    /// Get the SQL store
    pub fn items(&self) -> &ItemStore {
        &self.items
    }

    /// Store the image, then persist the item and its category atomically
    #[instrument(skip(self, item), fields(name = %item.name, category = %item.category))]
    pub async fn add_item(&self, item: NewItem) -> Result<Item> {
        let image_key = self.content.store(&item.image).await?;

        let NewItem { name, category, .. } = item;
        let key = image_key.clone();
        let (name, category, id) = self
            .blocking(move |store| {
                let id = store.insert(&name, &category, &key)?;
                Ok((name, category, id))
            })
            .await?;

        info!(id = %id, image = %image_key, "Receive item");
        Ok(Item {
            id,
            name,
            category,
            image_key,
        })
    }

    /// Every item, in insertion order
    pub async fn list_all(&self) -> Result<Vec<Item>> {
        self.blocking(|store| store.list_all()).await
    }

    /// Items whose name contains `keyword` (ASCII case-insensitive)
    pub async fn search(&self, keyword: &str) -> Result<Vec<Item>> {
        let keyword = keyword.to_string();
        self.blocking(move |store| store.search(&keyword)).await
    }

    /// A single item, or `NotFound`
    pub async fn get_by_id(&self, id: ItemId) -> Result<Item> {
        self.blocking(move |store| store.get(id)).await
    }

    /// The image key of an item, or `NotFound`
    pub async fn get_image_key_by_id(&self, id: ItemId) -> Result<ImageKey> {
        self.blocking(move |store| store.image_key(id)).await
    }

    /// Path of the image to serve for an item, falling back to the default
    /// image when the blob is gone
    pub async fn image_path(&self, id: ItemId) -> Result<PathBuf> {
        let key = self.get_image_key_by_id(id).await?;
        Ok(self.content.locate(&key).await)
    }

    /// Bytes of the image to serve for an item
    pub async fn image_bytes(&self, id: ItemId) -> Result<Vec<u8>> {
        let key = self.get_image_key_by_id(id).await?;
        self.content.load(&key).await
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(ItemStore) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.items.clone();
        tokio::task::spawn_blocking(move || f(store)).await?
    }
}
