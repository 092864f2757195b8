use crate::core::normalizer::canonical_barcode;
use crate::domain::model::{NormalizedProduct, ProductSource};
use crate::domain::ports::LocalProductStore;
use crate::utils::error::{LookupError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::sync::RwLock;

/// A product held by the local store together with its barcode and the
/// number of times it was logged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredProduct {
    #[serde(flatten)]
    pub product: NormalizedProduct,
    #[serde(default)]
    pub barcode: Option<String>,
    #[serde(default)]
    pub usage_count: u64,
}

/// Process-local implementation of [`LocalProductStore`]. Searches match
/// name or brand case-insensitively; frequently used products rank first.
#[derive(Debug, Default)]
pub struct InMemoryProductStore {
    products: RwLock<Vec<StoredProduct>>,
}

impl InMemoryProductStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store. Barcodes are brought to GTIN-13 so they match the
    /// codes lookups arrive with.
    pub fn with_products(products: Vec<StoredProduct>) -> Self {
        let products = products
            .into_iter()
            .map(|mut stored| {
                stored.barcode = stored.barcode.as_deref().and_then(stored_barcode);
                stored
            })
            .collect();
        Self {
            products: RwLock::new(products),
        }
    }

    /// Seeds the store from a JSON array of products.
    pub async fn load_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            LookupError::store(format!("cannot read {}: {}", path.display(), e))
        })?;
        let products: Vec<StoredProduct> = serde_json::from_str(&content)?;

        tracing::info!(path = %path.display(), products = products.len(), "local store loaded");
        Ok(Self::with_products(products))
    }

    pub async fn len(&self) -> usize {
        self.products.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.products.read().await.is_empty()
    }

    pub async fn usage_count(&self, source: ProductSource, source_id: &str) -> Option<u64> {
        self.products
            .read()
            .await
            .iter()
            .find(|s| s.product.source == source && s.product.source_id == source_id)
            .map(|s| s.usage_count)
    }
}

/// Canonical form when the code is a valid barcode, the trimmed raw value
/// otherwise.
fn stored_barcode(raw: &str) -> Option<String> {
    canonical_barcode(raw).or_else(|| {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn matches(stored: &StoredProduct, needle: &str) -> bool {
    stored.product.name.to_lowercase().contains(needle)
        || stored
            .product
            .brand
            .as_deref()
            .map(|b| b.to_lowercase().contains(needle))
            .unwrap_or(false)
}

#[async_trait]
impl LocalProductStore for InMemoryProductStore {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<NormalizedProduct>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let products = self.products.read().await;
        let mut hits: Vec<&StoredProduct> = products.iter().filter(|s| matches(s, &needle)).collect();
        // stable sort keeps insertion order among equal counts
        hits.sort_by(|a, b| b.usage_count.cmp(&a.usage_count));

        Ok(hits
            .into_iter()
            .take(limit)
            .map(|s| s.product.clone())
            .collect())
    }

    async fn find_by_barcode(&self, barcode: &str) -> Result<Option<NormalizedProduct>> {
        let Some(barcode) = stored_barcode(barcode) else {
            return Ok(None);
        };
        Ok(self
            .products
            .read()
            .await
            .iter()
            .find(|s| s.barcode.as_deref() == Some(barcode.as_str()))
            .map(|s| s.product.clone()))
    }

    async fn insert_if_absent(
        &self,
        product: &NormalizedProduct,
        barcode: Option<&str>,
    ) -> Result<bool> {
        let mut products = self.products.write().await;
        if let Some(existing) = products.iter_mut().find(|s| {
            s.product.source == product.source && s.product.source_id == product.source_id
        }) {
            if existing.barcode.is_none() {
                existing.barcode = barcode.and_then(stored_barcode);
            }
            return Ok(false);
        }

        products.push(StoredProduct {
            product: product.clone(),
            barcode: barcode.and_then(stored_barcode),
            usage_count: 0,
        });
        tracing::debug!(source = %product.source, source_id = %product.source_id, "product stored locally");
        Ok(true)
    }

    async fn increment_usage(&self, source: ProductSource, source_id: &str) -> Result<()> {
        let mut products = self.products.write().await;
        match products
            .iter_mut()
            .find(|s| s.product.source == source && s.product.source_id == source_id)
        {
            Some(stored) => {
                stored.usage_count += 1;
                Ok(())
            }
            None => Err(LookupError::store(format!(
                "no local product {}:{}",
                source, source_id
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn product(name: &str, brand: Option<&str>, id: &str) -> NormalizedProduct {
        NormalizedProduct {
            name: name.to_string(),
            brand: brand.map(str::to_string),
            calories_per_100g: 100.0,
            protein_per_100g: 1.0,
            fats_per_100g: 1.0,
            carbs_per_100g: 1.0,
            saturated_fat_per_100g: None,
            fiber_per_100g: None,
            sugar_per_100g: None,
            sodium_per_100g: None,
            source: ProductSource::User,
            source_id: id.to_string(),
            image_url: None,
        }
    }

    #[tokio::test]
    async fn test_search_matches_name_and_brand() {
        let store = InMemoryProductStore::new();
        store.insert_if_absent(&product("Greek Yogurt", None, "1"), None).await.unwrap();
        store.insert_if_absent(&product("Granola", Some("Yogurtland"), "2"), None).await.unwrap();
        store.insert_if_absent(&product("Apple", None, "3"), None).await.unwrap();

        let hits = store.search("YOGURT", 10).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(store.search("   ", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_ranks_by_usage() {
        let store = InMemoryProductStore::new();
        store.insert_if_absent(&product("Rice white", None, "1"), None).await.unwrap();
        store.insert_if_absent(&product("Rice brown", None, "2"), None).await.unwrap();
        store.increment_usage(ProductSource::User, "2").await.unwrap();

        let hits = store.search("rice", 1).await.unwrap();
        assert_eq!(hits[0].source_id, "2");
    }

    #[tokio::test]
    async fn test_insert_if_absent_is_idempotent() {
        let store = InMemoryProductStore::new();
        let p = product("Milk", None, "7");
        assert!(store.insert_if_absent(&p, None).await.unwrap());
        assert!(!store.insert_if_absent(&p, Some("0000000000017")).await.unwrap());
        assert_eq!(store.len().await, 1);

        // a later insert can attach the barcode
        let found = store.find_by_barcode("0000000000017").await.unwrap();
        assert_eq!(found.map(|p| p.source_id), Some("7".to_string()));
    }

    #[tokio::test]
    async fn test_increment_unknown_product_fails() {
        let store = InMemoryProductStore::new();
        let err = store.increment_usage(ProductSource::Primary, "404").await.unwrap_err();
        assert!(matches!(err, LookupError::Store { .. }));
    }

    #[tokio::test]
    async fn test_load_json_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"name":"Banana","calories_per_100g":89,"protein_per_100g":1.1,
                "fats_per_100g":0.3,"carbs_per_100g":22.8,"source":"user",
                "source_id":"b1","barcode":"0000000000123","usage_count":4}}]"#
        )
        .unwrap();

        let store = InMemoryProductStore::load_json_file(file.path()).await.unwrap();
        assert_eq!(store.usage_count(ProductSource::User, "b1").await, Some(4));
        let found = store.find_by_barcode("0000000000123").await.unwrap().unwrap();
        assert_eq!(found.name, "Banana");
    }

    #[tokio::test]
    async fn test_seeded_short_barcode_matches_padded_lookup() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"name":"Mints","calories_per_100g":390,"protein_per_100g":0,
                "fats_per_100g":0,"carbs_per_100g":97,"source":"user",
                "source_id":"m1","barcode":"96385074"}}]"#
        )
        .unwrap();

        let store = InMemoryProductStore::load_json_file(file.path()).await.unwrap();
        let found = store.find_by_barcode("0000096385074").await.unwrap();
        assert_eq!(found.map(|p| p.source_id), Some("m1".to_string()));
        // raw form still resolves
        assert!(store.find_by_barcode("9638-5074").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_load_missing_file_is_store_error() {
        let err = InMemoryProductStore::load_json_file("/nonexistent/products.json")
            .await
            .unwrap_err();
        assert!(matches!(err, LookupError::Store { .. }));
    }
}
