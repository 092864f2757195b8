use crate::domain::model::NormalizedProduct;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

pub const DEFAULT_TTL: Duration = Duration::from_secs(300);
pub const DEFAULT_CAPACITY: usize = 100;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub normalized_query_key: String,
    pub results: Vec<NormalizedProduct>,
    pub inserted_at: Instant,
}

/// Short-lived cache of free-text search results.
///
/// Expired entries are dropped when read. When full, the entry inserted
/// first is evicted; reads do not refresh an entry's position.
#[derive(Debug)]
pub struct SearchCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    ttl: Duration,
    capacity: usize,
}

impl Default for SearchCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_CAPACITY)
    }
}

impl SearchCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            capacity: capacity.max(1),
        }
    }

    pub fn normalize_key(query: &str) -> String {
        query.trim().to_lowercase()
    }

    pub async fn get(&self, query: &str) -> Option<Vec<NormalizedProduct>> {
        let key = Self::normalize_key(query);
        let mut entries = self.entries.lock().await;

        let expired = match entries.get(&key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => {
                return Some(entry.results.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            entries.remove(&key);
            tracing::debug!(query = %key, "search cache entry expired");
        }
        None
    }

    pub async fn set(&self, query: &str, results: Vec<NormalizedProduct>) {
        let key = Self::normalize_key(query);
        let mut entries = self.entries.lock().await;

        if !entries.contains_key(&key) && entries.len() >= self.capacity {
            let oldest = entries
                .values()
                .min_by_key(|entry| entry.inserted_at)
                .map(|entry| entry.normalized_query_key.clone());
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
                tracing::debug!(evicted = %oldest, "search cache at capacity");
            }
        }

        entries.insert(
            key.clone(),
            CacheEntry {
                normalized_query_key: key,
                results,
                inserted_at: Instant::now(),
            },
        );
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::ProductSource;

    fn product(name: &str) -> NormalizedProduct {
        NormalizedProduct {
            name: name.to_string(),
            brand: None,
            calories_per_100g: 100.0,
            protein_per_100g: 1.0,
            fats_per_100g: 1.0,
            carbs_per_100g: 1.0,
            saturated_fat_per_100g: None,
            fiber_per_100g: None,
            sugar_per_100g: None,
            sodium_per_100g: None,
            source: ProductSource::Primary,
            source_id: name.to_string(),
            image_url: None,
        }
    }

    #[tokio::test]
    async fn test_set_then_get_returns_results() {
        let cache = SearchCache::default();
        cache.set("Banana", vec![product("banana")]).await;

        let hit = cache.get("banana").await.unwrap();
        assert_eq!(hit.len(), 1);
        assert_eq!(hit[0].name, "banana");
    }

    #[tokio::test]
    async fn test_keys_are_case_folded_and_trimmed() {
        let cache = SearchCache::default();
        cache.set("  Peanut Butter ", vec![product("pb")]).await;

        assert!(cache.get("peanut butter").await.is_some());
        assert!(cache.get("PEANUT BUTTER   ").await.is_some());
        assert!(cache.get("peanut").await.is_none());
    }

    #[tokio::test]
    async fn test_entry_expires_after_ttl() {
        let cache = SearchCache::new(Duration::from_millis(30), 10);
        cache.set("rice", vec![product("rice")]).await;
        assert!(cache.get("rice").await.is_some());

        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(cache.get("rice").await.is_none());
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn test_oldest_inserted_is_evicted_first() {
        let cache = SearchCache::new(DEFAULT_TTL, 2);
        cache.set("first", vec![product("1")]).await;
        tokio::time::sleep(Duration::from_millis(2)).await;
        cache.set("second", vec![product("2")]).await;
        tokio::time::sleep(Duration::from_millis(2)).await;

        // reading does not protect an entry from eviction
        assert!(cache.get("first").await.is_some());

        cache.set("third", vec![product("3")]).await;

        assert_eq!(cache.len().await, 2);
        assert!(cache.get("first").await.is_none());
        assert!(cache.get("second").await.is_some());
        assert!(cache.get("third").await.is_some());
    }

    #[tokio::test]
    async fn test_overwrite_does_not_evict() {
        let cache = SearchCache::new(DEFAULT_TTL, 2);
        cache.set("a1", vec![product("1")]).await;
        cache.set("b2", vec![product("2")]).await;
        cache.set("a1", vec![product("1b")]).await;

        assert_eq!(cache.len().await, 2);
        assert_eq!(cache.get("a1").await.unwrap()[0].name, "1b");
        assert!(cache.get("b2").await.is_some());
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = SearchCache::default();
        cache.set("egg", vec![product("egg")]).await;
        cache.clear().await;
        assert!(cache.is_empty().await);
    }
}
