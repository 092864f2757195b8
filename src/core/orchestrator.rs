//! Entry point used by the rest of the application to resolve products.
//!
//! Each lookup walks the tiers in order:
//!
//! ```text
//! local store -> (search cache) -> primary source (retried) -> secondary source
//! ```
//!
//! Local results are always part of the answer. A tier that fails or comes
//! back empty records a fallback event and hands over to the next one; when
//! every external tier is down the caller still gets the local results. Only
//! construction can fail, on invalid configuration.

use crate::config::LookupConfig;
use crate::core::fallback::{FallbackEvent, FallbackLog, FallbackReason, Tier};
use crate::core::normalizer::canonical_barcode;
use crate::core::primary_client::{PrimarySourceClient, MIN_QUERY_LENGTH};
use crate::core::retry::RetryPolicy;
use crate::core::search_cache::SearchCache;
use crate::core::token_manager::TokenManager;
use crate::domain::model::{NormalizedProduct, ProductSource};
use crate::domain::ports::{FallbackSource, LocalProductStore};
use crate::utils::error::Result;
use crate::utils::validation::Validate;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

const PRIMARY_SOURCE_NAME: &str = "primary";
const LOCAL_SOURCE_NAME: &str = "local";

pub struct LookupOrchestrator<L: LocalProductStore, F: FallbackSource> {
    local: L,
    primary: Option<PrimarySourceClient>,
    secondary: Option<F>,
    cache: SearchCache,
    retry: RetryPolicy,
    fallback_log: FallbackLog,
}

impl<L: LocalProductStore, F: FallbackSource> LookupOrchestrator<L, F> {
    /// Composition root: builds the token manager, cache and primary client
    /// from configuration.
    ///
    /// # Errors
    /// Invalid configuration, e.g. an enabled primary source without
    /// credentials.
    pub fn new(config: &LookupConfig, local: L, secondary: F) -> Result<Self> {
        config.validate()?;

        let primary = if config.primary.enabled {
            let tokens = Arc::new(TokenManager::from_config(&config.primary)?);
            Some(PrimarySourceClient::new(config.primary.clone(), tokens)?)
        } else {
            tracing::info!("primary source disabled by configuration");
            None
        };

        let secondary = if config.fallback.enabled {
            Some(secondary)
        } else {
            tracing::info!("fallback source disabled by configuration");
            None
        };

        Ok(Self::from_parts(
            local,
            primary,
            secondary,
            SearchCache::new(
                Duration::from_secs(config.cache.ttl_seconds),
                config.cache.capacity,
            ),
            RetryPolicy::from_config(&config.retry),
        ))
    }

    pub fn from_parts(
        local: L,
        primary: Option<PrimarySourceClient>,
        secondary: Option<F>,
        cache: SearchCache,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            local,
            primary,
            secondary,
            cache,
            retry,
            fallback_log: FallbackLog::default(),
        }
    }

    pub fn local_store(&self) -> &L {
        &self.local
    }

    pub fn cache(&self) -> &SearchCache {
        &self.cache
    }

    pub async fn fallback_events(&self) -> Vec<FallbackEvent> {
        self.fallback_log.events().await
    }

    /// Clears the search cache, the cached token and the fallback log.
    pub async fn reset(&self) {
        self.cache.clear().await;
        if let Some(primary) = &self.primary {
            primary.token_manager().reset().await;
        }
        self.fallback_log.clear().await;
    }

    /// Free-text product search. Never fails: source outages degrade to
    /// whatever the local store returned. The local store is consulted for
    /// every query; queries shorter than [`MIN_QUERY_LENGTH`] stay local.
    pub async fn search_products(&self, query: &str, limit: usize) -> Vec<NormalizedProduct> {
        let query = query.trim();

        let mut local = match self.local.search(query, limit).await {
            Ok(products) => products,
            Err(e) => {
                self.record(
                    Tier::Local,
                    FallbackReason::from_error(&e),
                    LOCAL_SOURCE_NAME,
                    query,
                    Some(e.to_string()),
                )
                .await;
                Vec::new()
            }
        };

        if local.len() >= limit {
            local.truncate(limit);
            tracing::debug!(query, results = local.len(), "local store satisfied search");
            return local;
        }

        if query.chars().count() < MIN_QUERY_LENGTH {
            tracing::debug!(query, results = local.len(), "query too short for external sources");
            return local;
        }

        let external = self.search_external(query, limit).await;
        let merged = merge_results(local, external, limit);
        tracing::info!(query, results = merged.len(), "product search finished");
        merged
    }

    async fn search_external(&self, query: &str, limit: usize) -> Vec<NormalizedProduct> {
        match &self.primary {
            Some(primary) => {
                if let Some(mut cached) = self.cache.get(query).await {
                    tracing::debug!(query, "search cache hit");
                    cached.truncate(limit);
                    return cached;
                }

                // The cache key carries no limit, so always fetch a full page
                // and cut it down per caller.
                let page_size = primary.max_results();
                let outcome = self
                    .retry
                    .run("primary search", || primary.search_foods(query, page_size, 0))
                    .await;

                match outcome {
                    Ok(mut products) if !products.is_empty() => {
                        self.cache.set(query, products.clone()).await;
                        products.truncate(limit);
                        return products;
                    }
                    Ok(_) => {
                        self.record(
                            Tier::Primary,
                            FallbackReason::NoResults,
                            PRIMARY_SOURCE_NAME,
                            query,
                            None,
                        )
                        .await;
                    }
                    Err(e) => {
                        self.record(
                            Tier::Primary,
                            FallbackReason::from_error(&e),
                            PRIMARY_SOURCE_NAME,
                            query,
                            Some(e.to_string()),
                        )
                        .await;
                    }
                }
            }
            None => {
                self.record(
                    Tier::Primary,
                    FallbackReason::Disabled,
                    PRIMARY_SOURCE_NAME,
                    query,
                    None,
                )
                .await;
            }
        }

        let Some(secondary) = &self.secondary else {
            tracing::debug!(query, "fallback disabled, no external results");
            return Vec::new();
        };

        match secondary.search(query, limit).await {
            Ok(products) if !products.is_empty() => products,
            Ok(_) => {
                self.record(
                    Tier::Secondary,
                    FallbackReason::NoResults,
                    secondary.name(),
                    query,
                    None,
                )
                .await;
                Vec::new()
            }
            Err(e) => {
                self.record(
                    Tier::Secondary,
                    FallbackReason::ApiError,
                    secondary.name(),
                    query,
                    Some(e.to_string()),
                )
                .await;
                Vec::new()
            }
        }
    }

    /// Barcode lookup. Products found in an external tier are remembered in
    /// the local store.
    pub async fn get_product_by_barcode(&self, code: &str) -> Option<NormalizedProduct> {
        let Some(barcode) = canonical_barcode(code) else {
            tracing::debug!(code, "barcode rejected by input guard");
            return None;
        };

        match self.local.find_by_barcode(&barcode).await {
            Ok(Some(product)) => return Some(product),
            Ok(None) => {}
            Err(e) => {
                self.record(
                    Tier::Local,
                    FallbackReason::from_error(&e),
                    LOCAL_SOURCE_NAME,
                    &barcode,
                    Some(e.to_string()),
                )
                .await;
            }
        }

        let product = self.barcode_external(&barcode).await?;

        if let Err(e) = self.local.insert_if_absent(&product, Some(&barcode)).await {
            tracing::warn!(barcode = %barcode, error = %e, "could not remember product locally");
        }

        Some(product)
    }

    async fn barcode_external(&self, barcode: &str) -> Option<NormalizedProduct> {
        match &self.primary {
            Some(primary) => {
                let outcome = self
                    .retry
                    .run("primary barcode", || primary.find_food_by_barcode(barcode))
                    .await;

                match outcome {
                    Ok(Some(product)) => return Some(product),
                    Ok(None) => {
                        self.record(
                            Tier::Primary,
                            FallbackReason::NoResults,
                            PRIMARY_SOURCE_NAME,
                            barcode,
                            None,
                        )
                        .await;
                    }
                    Err(e) => {
                        self.record(
                            Tier::Primary,
                            FallbackReason::from_error(&e),
                            PRIMARY_SOURCE_NAME,
                            barcode,
                            Some(e.to_string()),
                        )
                        .await;
                    }
                }
            }
            None => {
                self.record(
                    Tier::Primary,
                    FallbackReason::Disabled,
                    PRIMARY_SOURCE_NAME,
                    barcode,
                    None,
                )
                .await;
            }
        }

        let secondary = self.secondary.as_ref()?;

        match secondary.find_by_barcode(barcode).await {
            Ok(Some(product)) => Some(product),
            Ok(None) => {
                self.record(
                    Tier::Secondary,
                    FallbackReason::NoResults,
                    secondary.name(),
                    barcode,
                    None,
                )
                .await;
                None
            }
            Err(e) => {
                self.record(
                    Tier::Secondary,
                    FallbackReason::ApiError,
                    secondary.name(),
                    barcode,
                    Some(e.to_string()),
                )
                .await;
                None
            }
        }
    }

    /// Inserts the product on first use and bumps its usage count. Store
    /// failures are logged, never returned.
    pub async fn record_usage(&self, product: &NormalizedProduct, barcode: Option<&str>) {
        let barcode = barcode.and_then(canonical_barcode);

        if let Err(e) = self.local.insert_if_absent(product, barcode.as_deref()).await {
            tracing::warn!(source_id = %product.source_id, error = %e, "could not store product");
            return;
        }
        if let Err(e) = self
            .local
            .increment_usage(product.source, &product.source_id)
            .await
        {
            tracing::warn!(source_id = %product.source_id, error = %e, "could not update usage count");
        }
    }

    async fn record(
        &self,
        tier: Tier,
        reason: FallbackReason,
        source: &str,
        subject: &str,
        detail: Option<String>,
    ) {
        self.fallback_log
            .record(tier, reason, source, subject, detail)
            .await;
    }
}

/// Local products first, then external ones not already present, capped at
/// `limit`. Two products are the same when they share source and id, or
/// name and brand.
fn merge_results(
    local: Vec<NormalizedProduct>,
    external: Vec<NormalizedProduct>,
    limit: usize,
) -> Vec<NormalizedProduct> {
    let mut seen_ids: HashSet<(ProductSource, String)> = HashSet::new();
    let mut seen_names: HashSet<String> = HashSet::new();
    let mut merged = Vec::with_capacity(limit.min(local.len() + external.len()));

    for product in local.into_iter().chain(external) {
        if merged.len() >= limit {
            break;
        }
        let id_key = (product.source, product.source_id.clone());
        let name_key = product.identity_key();
        if seen_ids.contains(&id_key) || seen_names.contains(&name_key) {
            continue;
        }
        seen_ids.insert(id_key);
        seen_names.insert(name_key);
        merged.push(product);
    }

    merged
}
