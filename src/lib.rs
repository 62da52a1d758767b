//! listings - Marketplace listing service
//!
//! Clients upload an item (name, category, image); the service persists
//! it and serves it back individually, in bulk, or filtered by keyword.
//!
//! # Architecture
//!
//! - Images are content-addressed: the file name is the SHA-256 of the
//!   bytes, so identical uploads share one file
//! - Categories are created on first reference, inside the same
//!   transaction as the item that references them
//! - A missing image file degrades to a placeholder instead of failing
//!
//! # Modules
//!
//! - `domain`: Data structures (Item, NewItem, Category)
//! - `storage`: Content store, connection pool, schema, SQL
//! - `repository`: Async ingestion and read paths
//! - `server`: HTTP API (axum)
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Serve the HTTP API on :9000
//! listings serve
//!
//! # Add an item from the command line
//! listings add --name "red shirt" --category fashion --image shirt.jpg
//!
//! # Search by keyword
//! listings search shirt
//! ```

pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod repository;
pub mod server;
pub mod storage;

// Re-export main types at crate root for convenience
pub use domain::{Category, CategoryId, Item, ItemId, NewItem};
pub use error::{ListingError, PersistenceStep};
pub use repository::ItemRepository;
pub use storage::{ContentStore, DbPool, ImageKey, ItemStore};
