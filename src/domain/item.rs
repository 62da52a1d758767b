//! Marketplace items.

use serde::{Deserialize, Serialize};

use crate::error::{ListingError, Result};
use crate::storage::ImageKey;

use super::category::normalize_name;

/// Generated item identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub i64);

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ItemId {
    type Err = ListingError;

    fn from_str(s: &str) -> Result<Self> {
        s.trim()
            .parse::<i64>()
            .map(ItemId)
            .map_err(|_| ListingError::Validation(format!("item id must be an integer: {}", s)))
    }
}

/// A persisted item joined with its category name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Generated row id
    pub id: ItemId,

    /// Item name as submitted (trimmed)
    pub name: String,

    /// Category name resolved through `category_id`
    pub category: String,

    /// Content-addressed image file name
    #[serde(rename = "image_name")]
    pub image_key: ImageKey,
}

/// Validated ingestion input
#[derive(Debug, Clone)]
pub struct NewItem {
    pub name: String,
    pub category: String,
    pub image: Vec<u8>,
}

impl NewItem {
    /// Validate and normalize raw input.
    ///
    /// Name and category are trimmed and must not be empty; the image must
    /// carry at least one byte.
    pub fn new(
        name: impl AsRef<str>,
        category: impl AsRef<str>,
        image: impl Into<Vec<u8>>,
    ) -> Result<Self> {
        let name = name.as_ref().trim();
        if name.is_empty() {
            return Err(ListingError::Validation("name is required".into()));
        }

        let category = normalize_name(category.as_ref());
        if category.is_empty() {
            return Err(ListingError::Validation("category is required".into()));
        }

        let image = image.into();
        if image.is_empty() {
            return Err(ListingError::Validation("image is empty".into()));
        }

        Ok(Self {
            name: name.to_string(),
            category: category.to_string(),
            image,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_item_trims_fields() {
        let item = NewItem::new("  red shirt ", " fashion", vec![1, 2, 3]).unwrap();
        assert_eq!(item.name, "red shirt");
        assert_eq!(item.category, "fashion");
    }

    #[test]
    fn test_new_item_rejects_blank_input() {
        assert!(matches!(
            NewItem::new("", "fashion", vec![1]),
            Err(ListingError::Validation(_))
        ));
        assert!(matches!(
            NewItem::new("shirt", "  ", vec![1]),
            Err(ListingError::Validation(_))
        ));
        assert!(matches!(
            NewItem::new("shirt", "fashion", Vec::new()),
            Err(ListingError::Validation(_))
        ));
    }

    #[test]
    fn test_item_id_parse() {
        assert_eq!("42".parse::<ItemId>().unwrap(), ItemId(42));
        assert!("abc".parse::<ItemId>().is_err());
        assert!("1.jpg".parse::<ItemId>().is_err());
    }

    #[test]
    fn test_item_serializes_image_name() {
        let item = Item {
            id: ItemId(1),
            name: "shirt".into(),
            category: "fashion".into(),
            image_key: ImageKey::from_bytes(b"img"),
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["id"], 1);
        assert_eq!(json["category"], "fashion");
        assert!(json["image_name"].as_str().unwrap().ends_with(".jpeg"));
    }
}
