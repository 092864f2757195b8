use crate::domain::model::{NormalizedProduct, ProductSource};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Persisted products that were seen before or submitted by users.
#[async_trait]
pub trait LocalProductStore: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<NormalizedProduct>>;

    async fn find_by_barcode(&self, barcode: &str) -> Result<Option<NormalizedProduct>>;

    /// Stores the product unless an entry with the same source and source id
    /// exists. Returns `true` when a new entry was written.
    async fn insert_if_absent(
        &self,
        product: &NormalizedProduct,
        barcode: Option<&str>,
    ) -> Result<bool>;

    async fn increment_usage(&self, source: ProductSource, source_id: &str) -> Result<()>;
}

/// Read-only product database consulted when the primary source fails or
/// has nothing.
#[async_trait]
pub trait FallbackSource: Send + Sync {
    fn name(&self) -> &str;

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<NormalizedProduct>>;

    async fn find_by_barcode(&self, barcode: &str) -> Result<Option<NormalizedProduct>>;
}
