//! Brand → category index.
//!
//! Unknown brands are an error, never mapped onto some default category.

use indexmap::IndexMap;

use crate::error::{AnalyticsError, Result};
use crate::record::PhoneRecord;

/// Brands observed in a catalog, numbered in first-seen order.
///
/// Uses `IndexMap` keyed by the lowercased brand so the category number is
/// the insertion position; values hold the display spelling.
#[derive(Debug, Clone, Default)]
pub struct BrandIndex {
    brands: IndexMap<String, String>,
}

impl BrandIndex {
    /// Build from a catalog. Matching is case-insensitive; the first spelling
    /// seen is kept as the display name.
    pub fn from_catalog(catalog: &[PhoneRecord]) -> Self {
        let mut brands = IndexMap::new();
        for record in catalog {
            brands
                .entry(normalize_key(&record.brand))
                .or_insert_with(|| record.brand.trim().to_owned());
        }
        Self { brands }
    }

    /// Category index for `brand`.
    pub fn category_of(&self, brand: &str) -> Result<usize> {
        self.brands
            .get_index_of(&normalize_key(brand))
            .ok_or_else(|| AnalyticsError::UnknownCategory(brand.to_owned()))
    }

    /// Canonical display name for `brand`.
    pub fn canonical(&self, brand: &str) -> Result<&str> {
        self.brands
            .get(&normalize_key(brand))
            .map(String::as_str)
            .ok_or_else(|| AnalyticsError::UnknownCategory(brand.to_owned()))
    }

    /// Display names in category order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.brands.values().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.brands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.brands.is_empty()
    }
}

fn normalize_key(brand: &str) -> String {
    brand.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phone(brand: &str) -> PhoneRecord {
        PhoneRecord {
            brand: brand.to_string(),
            ram_gb: 4.0,
            battery_mah: 4000.0,
            screen_in: 6.0,
            weight_g: 180.0,
            launch_year: 2022,
            price_usd: 300.0,
            front_camera_mp: None,
            back_camera_mp: None,
        }
    }

    #[test]
    fn first_seen_order() {
        let idx = BrandIndex::from_catalog(&[phone("Samsung"), phone("Apple"), phone("samsung")]);
        assert_eq!(idx.len(), 2);
        assert_eq!(idx.category_of("Samsung").unwrap(), 0);
        assert_eq!(idx.category_of("APPLE").unwrap(), 1);
        assert_eq!(idx.canonical("SAMSUNG ").unwrap(), "Samsung");
        assert_eq!(idx.names().collect::<Vec<_>>(), vec!["Samsung", "Apple"]);
    }

    #[test]
    fn category_matches_names_position() {
        let idx = BrandIndex::from_catalog(&[
            phone("Oppo"),
            phone(" Xiaomi"),
            phone("OPPO"),
            phone("Nokia"),
            phone("xiaomi"),
        ]);
        for (i, name) in idx.names().enumerate() {
            assert_eq!(idx.category_of(name).unwrap(), i);
        }
        assert_eq!(idx.canonical("XIAOMI").unwrap(), "Xiaomi");
        assert!(matches!(idx.canonical("Sony"), Err(AnalyticsError::UnknownCategory(_))));
    }

    #[test]
    fn unknown_brand_is_error() {
        let idx = BrandIndex::from_catalog(&[phone("Samsung")]);
        let err = idx.category_of("Motorola").unwrap_err();
        assert!(matches!(err, AnalyticsError::UnknownCategory(ref b) if b == "Motorola"));
    }
}
