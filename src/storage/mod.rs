//! Persistence for listings.
//!
//! Two backends live here:
//! - `content`: content-addressed image files on disk
//! - `pool`, `schema`, `categories`, `items`: the SQLite database
//!
//! # Database Layout
//!
//! ```text
//! categories(id PK, name UNIQUE)
//! items(id PK, name, category_id FK -> categories.id, image_name)
//! ```

pub mod categories;
pub mod content;
pub mod items;
pub mod pool;
pub mod schema;

pub use content::{ContentStore, ImageKey, DEFAULT_IMAGE_NAME, IMAGE_EXTENSION};
pub use items::ItemStore;
pub use pool::{DbPool, PooledConnection};
pub use schema::SchemaSource;
