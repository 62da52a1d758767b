//! Domain types for the listing service.
//!
//! This module contains the core data structures:
//! - Item: A persisted listing joined with its category name
//! - NewItem: Validated input for ingestion
//! - Category: A lazily created reference row

pub mod category;
pub mod item;

// Re-export commonly used types
pub use category::{Category, CategoryId};
pub use item::{Item, ItemId, NewItem};
