//! Catalog products and their per-size stock.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use common::CategoryId;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::value_objects::{Money, ProductId, Size};

/// Stock held for one size of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variation {
    pub size: Size,
    pub quantity: u32,
}

impl Variation {
    pub fn new(size: impl Into<Size>, quantity: u32) -> Self {
        Self {
            size: size.into(),
            quantity,
        }
    }
}

/// A product record as held by the catalog store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub price: Money,
    pub category_id: CategoryId,
    /// Stock per size; sizes are unique within a product.
    pub variations: Vec<Variation>,
    pub keywords: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Builds a product record from creation input with a fresh id.
    pub fn create(input: NewProduct) -> Result<Self, DomainError> {
        Self::create_with_id(ProductId::generate(), input)
    }

    /// Builds a product record from creation input with a caller-chosen id.
    pub fn create_with_id(id: ProductId, input: NewProduct) -> Result<Self, DomainError> {
        input.validate()?;
        let now = Utc::now();
        Ok(Self {
            id,
            slug: slugify(&input.name),
            name: input.name,
            description: input.description,
            price: input.price,
            category_id: input.category_id,
            variations: input.variations,
            keywords: input.keywords,
            created_at: now,
            updated_at: now,
        })
    }

    /// Replaces the editable fields, keeping id and creation time.
    pub fn update(&mut self, input: NewProduct) -> Result<(), DomainError> {
        input.validate()?;
        self.slug = slugify(&input.name);
        self.name = input.name;
        self.description = input.description;
        self.price = input.price;
        self.category_id = input.category_id;
        self.variations = input.variations;
        self.keywords = input.keywords;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Returns the variation for a size, if the product has it.
    pub fn variation(&self, size: &Size) -> Option<&Variation> {
        self.variations.iter().find(|v| &v.size == size)
    }

    /// Total units in stock across all sizes.
    pub fn total_stock(&self) -> u64 {
        self.variations.iter().map(|v| u64::from(v.quantity)).sum()
    }

    /// Adds `delta` to the quantity of `size`.
    ///
    /// Returns the new quantity, or `None` (leaving the product untouched)
    /// when the size does not exist or the result would be negative.
    pub fn adjust_variation(&mut self, size: &Size, delta: i64) -> Option<u32> {
        let variation = self.variations.iter_mut().find(|v| &v.size == size)?;
        let updated = i64::from(variation.quantity).checked_add(delta)?;
        let updated = u32::try_from(updated).ok()?;
        variation.quantity = updated;
        self.updated_at = Utc::now();
        Some(updated)
    }

    /// Case-insensitive match on name or description, or exact keyword match.
    pub fn matches_keyword(&self, keyword: &str) -> bool {
        let needle = keyword.to_lowercase();
        self.name.to_lowercase().contains(&needle)
            || self.description.to_lowercase().contains(&needle)
            || self.keywords.iter().any(|k| k == keyword)
    }
}

/// Input for creating or replacing a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: Money,
    pub category_id: CategoryId,
    pub variations: Vec<Variation>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl NewProduct {
    fn validate(&self) -> Result<(), DomainError> {
        if self.price.is_negative() {
            return Err(DomainError::NegativePrice {
                product_id: self.name.clone(),
                cents: self.price.cents(),
            });
        }
        let mut seen = HashSet::new();
        for variation in &self.variations {
            if !seen.insert(&variation.size) {
                return Err(DomainError::DuplicateSize(variation.size.to_string()));
            }
        }
        Ok(())
    }
}

/// Derives a URL slug from a product name.
///
/// Lowercases, keeps alphanumerics, and collapses every other run of
/// characters into a single `-`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_product(name: &str, variations: Vec<Variation>) -> NewProduct {
        NewProduct {
            name: name.to_string(),
            description: "Cotton shirt".to_string(),
            price: Money::from_cents(1000),
            category_id: CategoryId::new(),
            variations,
            keywords: vec!["shirt".to_string()],
        }
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Blue Shirt"), "blue-shirt");
        assert_eq!(slugify("  Polo -- Classic!! "), "polo-classic");
        assert_eq!(slugify("Camisa Niño"), "camisa-niño");
    }

    #[test]
    fn test_create_derives_slug() {
        let product = Product::create(new_product("Blue Shirt", vec![])).unwrap();
        assert_eq!(product.slug, "blue-shirt");
        assert_eq!(product.created_at, product.updated_at);
    }

    #[test]
    fn test_duplicate_sizes_rejected() {
        let result = Product::create(new_product(
            "Shirt",
            vec![Variation::new("M", 1), Variation::new("M", 2)],
        ));
        assert_eq!(result, Err(DomainError::DuplicateSize("M".to_string())));
    }

    #[test]
    fn test_adjust_variation_decrements() {
        let mut product =
            Product::create(new_product("Shirt", vec![Variation::new("M", 5)])).unwrap();
        assert_eq!(product.adjust_variation(&Size::from("M"), -2), Some(3));
        assert_eq!(product.variation(&Size::from("M")).unwrap().quantity, 3);
    }

    #[test]
    fn test_adjust_variation_never_goes_negative() {
        let mut product =
            Product::create(new_product("Shirt", vec![Variation::new("M", 1)])).unwrap();
        assert_eq!(product.adjust_variation(&Size::from("M"), -2), None);
        assert_eq!(product.variation(&Size::from("M")).unwrap().quantity, 1);
    }

    #[test]
    fn test_adjust_unknown_size_is_noop() {
        let mut product =
            Product::create(new_product("Shirt", vec![Variation::new("M", 1)])).unwrap();
        assert_eq!(product.adjust_variation(&Size::from("XL"), -1), None);
        assert_eq!(product.total_stock(), 1);
    }

    #[test]
    fn test_matches_keyword() {
        let product = Product::create(new_product("Blue Shirt", vec![])).unwrap();
        assert!(product.matches_keyword("blue"));
        assert!(product.matches_keyword("COTTON"));
        assert!(product.matches_keyword("shirt"));
        assert!(!product.matches_keyword("jeans"));
    }

    #[test]
    fn test_update_keeps_identity() {
        let mut product = Product::create(new_product("Shirt", vec![])).unwrap();
        let id = product.id.clone();
        let created = product.created_at;
        product
            .update(new_product("Long Shirt", vec![Variation::new("S", 3)]))
            .unwrap();
        assert_eq!(product.id, id);
        assert_eq!(product.created_at, created);
        assert_eq!(product.slug, "long-shirt");
        assert_eq!(product.total_stock(), 3);
    }
}
