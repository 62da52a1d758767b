//! Categories referenced by items.

use serde::{Deserialize, Serialize};

/// Generated category identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(pub i64);

impl std::fmt::Display for CategoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A category row. Created on first reference, never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

/// Normalize a category name for lookup and storage.
///
/// Surrounding whitespace is dropped; everything else, including case,
/// is kept so lookups stay exact.
pub fn normalize_name(name: &str) -> &str {
    name.trim()
}
