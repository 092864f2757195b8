//! Secondary source: an Open Food Facts compatible product database.
//! Read-only and unauthenticated; nutriments are already per 100 g.

use crate::config::FallbackConfig;
use crate::domain::model::{NormalizedProduct, ProductSource};
use crate::domain::ports::FallbackSource;
use crate::utils::error::{LookupError, Result};
use crate::utils::wire::value_as_f64;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

const SOURCE_NAME: &str = "open_food_facts";
const KJ_PER_KCAL: f64 = 4.184;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    products: Vec<OffProduct>,
}

#[derive(Debug, Deserialize)]
struct ProductResponse {
    #[serde(default)]
    status: Option<Value>,
    #[serde(default)]
    product: Option<OffProduct>,
}

#[derive(Debug, Deserialize)]
struct OffProduct {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    product_name: Option<String>,
    #[serde(default)]
    brands: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    nutriments: Option<Value>,
}

fn nutriment(nutriments: Option<&Value>, key: &str) -> Option<f64> {
    nutriments?
        .get(key)
        .and_then(value_as_f64)
        .map(|v| v.max(0.0))
}

impl OffProduct {
    fn into_product(self, fallback_code: Option<&str>) -> Option<NormalizedProduct> {
        let name = self
            .product_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())?;
        let source_id = self
            .code
            .or_else(|| fallback_code.map(str::to_string))
            .unwrap_or_default();
        // "Brand A, Brand B" -> "Brand A"
        let brand = self
            .brands
            .as_deref()
            .and_then(|b| b.split(',').next())
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(str::to_string);

        let n = self.nutriments.as_ref();
        let calories = nutriment(n, "energy-kcal_100g")
            .or_else(|| nutriment(n, "energy_100g").map(|kj| kj / KJ_PER_KCAL))
            .unwrap_or(0.0);

        Some(NormalizedProduct {
            name,
            brand,
            calories_per_100g: calories,
            protein_per_100g: nutriment(n, "proteins_100g").unwrap_or(0.0),
            fats_per_100g: nutriment(n, "fat_100g").unwrap_or(0.0),
            carbs_per_100g: nutriment(n, "carbohydrates_100g").unwrap_or(0.0),
            saturated_fat_per_100g: nutriment(n, "saturated-fat_100g"),
            fiber_per_100g: nutriment(n, "fiber_100g"),
            sugar_per_100g: nutriment(n, "sugars_100g"),
            sodium_per_100g: nutriment(n, "sodium_100g"),
            source: ProductSource::Secondary,
            source_id,
            image_url: self.image_url.filter(|u| !u.trim().is_empty()),
        })
    }
}

pub struct OpenFoodFactsClient {
    client: Client,
    base_url: String,
}

impl OpenFoodFactsClient {
    pub fn new(config: &FallbackConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| LookupError::config("fallback.timeout_ms", e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value> {
        let response = self.client.get(url).query(query).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(LookupError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl FallbackSource for OpenFoodFactsClient {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<NormalizedProduct>> {
        let query = query.trim();
        if query.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let url = format!("{}/cgi/search.pl", self.base_url);
        let body = self
            .get_json(
                &url,
                &[
                    ("search_terms", query.to_string()),
                    ("search_simple", "1".to_string()),
                    ("action", "process".to_string()),
                    ("json", "1".to_string()),
                    ("page_size", limit.to_string()),
                ],
            )
            .await?;

        let parsed: SearchResponse = serde_json::from_value(body)?;
        let products: Vec<NormalizedProduct> = parsed
            .products
            .into_iter()
            .filter_map(|p| p.into_product(None))
            .take(limit)
            .collect();

        tracing::debug!(query, results = products.len(), "secondary search finished");
        Ok(products)
    }

    async fn find_by_barcode(&self, barcode: &str) -> Result<Option<NormalizedProduct>> {
        let barcode = barcode.trim();
        if barcode.is_empty() {
            return Ok(None);
        }

        let url = format!("{}/api/v0/product/{}.json", self.base_url, barcode);
        let body = match self.get_json(&url, &[]).await {
            Err(LookupError::Api { status: 404, .. }) => return Ok(None),
            other => other?,
        };

        let parsed: ProductResponse = serde_json::from_value(body)?;
        let found = parsed
            .status
            .as_ref()
            .and_then(value_as_f64)
            .map(|s| s >= 1.0)
            .unwrap_or(parsed.product.is_some());
        if !found {
            return Ok(None);
        }

        Ok(parsed.product.and_then(|p| p.into_product(Some(barcode))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_product_conversion_parses_mixed_numbers() {
        let raw: OffProduct = serde_json::from_value(json!({
            "code": "3017620422003",
            "product_name": "Hazelnut spread",
            "brands": "Ferrero, Nutella",
            "image_url": "https://images.example/nutella.jpg",
            "nutriments": {
                "energy-kcal_100g": 539,
                "proteins_100g": "6.3",
                "fat_100g": 30.9,
                "carbohydrates_100g": "57.5",
                "sugars_100g": 56.3
            }
        }))
        .unwrap();

        let product = raw.into_product(None).unwrap();
        assert_eq!(product.brand.as_deref(), Some("Ferrero"));
        assert_eq!(product.calories_per_100g, 539.0);
        assert_eq!(product.protein_per_100g, 6.3);
        assert_eq!(product.carbs_per_100g, 57.5);
        assert_eq!(product.sugar_per_100g, Some(56.3));
        assert_eq!(product.fiber_per_100g, None);
        assert_eq!(product.source, ProductSource::Secondary);
        assert_eq!(product.source_id, "3017620422003");
    }

    #[test]
    fn test_energy_falls_back_to_kilojoules() {
        let raw: OffProduct = serde_json::from_value(json!({
            "product_name": "Crackers",
            "nutriments": {"energy_100g": 1841}
        }))
        .unwrap();

        let product = raw.into_product(Some("123")).unwrap();
        assert!((product.calories_per_100g - 1841.0 / KJ_PER_KCAL).abs() < 1e-9);
        assert_eq!(product.source_id, "123");
        assert_eq!(product.fats_per_100g, 0.0);
    }

    #[test]
    fn test_garbage_nutriments_read_as_zero() {
        let raw: OffProduct = serde_json::from_value(json!({
            "product_name": "Mystery",
            "nutriments": {"proteins_100g": "lots", "fat_100g": -3}
        }))
        .unwrap();

        let product = raw.into_product(None).unwrap();
        assert_eq!(product.protein_per_100g, 0.0);
        assert_eq!(product.fats_per_100g, 0.0);
    }

    #[test]
    fn test_unnamed_product_is_skipped() {
        let raw: OffProduct = serde_json::from_value(json!({"code": "1", "product_name": " "})).unwrap();
        assert!(raw.into_product(None).is_none());
    }
}
