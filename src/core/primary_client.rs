//! HTTP client for the primary (OAuth2-protected) food database.
//!
//! All calls go through the provider's `server.api` endpoint with a
//! `method` parameter and a bearer token from [`TokenManager`]. Responses are
//! coerced into lists at this boundary: the provider sends a bare object for a
//! single match, an array for several and `{}` for none.

use crate::config::PrimaryConfig;
use crate::core::normalizer::{canonical_barcode, normalize};
use crate::core::token_manager::TokenManager;
use crate::domain::model::{FoodKind, NormalizedProduct, ProviderFood, Serving};
use crate::utils::error::{LookupError, Result};
use crate::utils::wire::{into_list, string_or_number, value_as_f64, OneOrMany};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

/// Queries shorter than this never reach the network.
pub const MIN_QUERY_LENGTH: usize = 2;

/// Provider error codes meaning "nothing matches" rather than a failure:
/// unknown food id and unmatched barcode.
const NOT_FOUND_CODES: [i64; 2] = [106, 211];

#[derive(Debug, Deserialize)]
struct WireFood {
    #[serde(default, deserialize_with = "string_or_number")]
    food_id: Option<String>,
    #[serde(default)]
    food_name: Option<String>,
    #[serde(default)]
    brand_name: Option<String>,
    #[serde(default)]
    food_type: Option<String>,
    #[serde(default)]
    servings: Option<WireServings>,
    #[serde(default)]
    food_images: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct WireServings {
    #[serde(default)]
    serving: Option<OneOrMany<WireServing>>,
}

#[derive(Debug, Deserialize)]
struct WireServing {
    #[serde(default, deserialize_with = "string_or_number")]
    serving_id: Option<String>,
    #[serde(default)]
    serving_description: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    metric_serving_amount: Option<String>,
    #[serde(default)]
    metric_serving_unit: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    calories: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    carbohydrate: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    protein: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    fat: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    saturated_fat: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    fiber: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    sugar: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    sodium: Option<String>,
}

impl From<WireServing> for Serving {
    fn from(wire: WireServing) -> Self {
        Serving {
            id: wire.serving_id.unwrap_or_default(),
            description: wire.serving_description.unwrap_or_default(),
            metric_amount: wire.metric_serving_amount,
            metric_unit: wire.metric_serving_unit,
            calories: wire.calories,
            carbohydrate: wire.carbohydrate,
            protein: wire.protein,
            fat: wire.fat,
            saturated_fat: wire.saturated_fat,
            fiber: wire.fiber,
            sugar: wire.sugar,
            sodium: wire.sodium,
        }
    }
}

impl WireFood {
    /// Records without an id or a name are dropped.
    fn into_provider_food(self) -> Option<ProviderFood> {
        let id = self.food_id.filter(|id| !id.trim().is_empty())?;
        let name = self.food_name.filter(|name| !name.trim().is_empty())?;
        let servings = into_list(self.servings.and_then(|s| s.serving))
            .into_iter()
            .map(Serving::from)
            .collect();

        Some(ProviderFood {
            id,
            name,
            brand: self.brand_name,
            kind: FoodKind::from_provider(self.food_type.as_deref()),
            servings,
            images: self.food_images,
        })
    }
}

fn parse_food(value: &Value) -> Result<Option<ProviderFood>> {
    let wire: WireFood = serde_json::from_value(value.clone())?;
    Ok(wire.into_provider_food())
}

/// Food list from a search body; `{"foods": {}}` and a missing `foods`
/// both mean no matches. Records are decoded one by one and a malformed
/// record is skipped without discarding the rest of the page.
fn parse_food_list(body: &Value) -> Result<Vec<ProviderFood>> {
    let Some(food) = body.get("foods").and_then(|foods| foods.get("food")) else {
        return Ok(Vec::new());
    };
    if food.is_null() {
        return Ok(Vec::new());
    }

    let records: OneOrMany<Value> = serde_json::from_value(food.clone())?;
    Ok(records
        .into_vec()
        .into_iter()
        .filter_map(|record| match serde_json::from_value::<WireFood>(record) {
            Ok(wire) => wire.into_provider_food(),
            Err(e) => {
                tracing::debug!(error = %e, "skipping malformed food record");
                None
            }
        })
        .collect())
}

/// Food id from a barcode lookup: `{"food_id": {"value": "123"}}`, with the
/// id also accepted as a bare string or number. "0" means unresolved.
fn parse_barcode_food_id(body: &Value) -> Option<String> {
    let raw = body.get("food_id")?;
    let raw = raw.get("value").unwrap_or(raw);
    let id = match raw {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if id.is_empty() || id == "0" {
        None
    } else {
        Some(id)
    }
}

pub struct PrimarySourceClient {
    client: Client,
    config: PrimaryConfig,
    tokens: Arc<TokenManager>,
}

impl PrimarySourceClient {
    pub fn new(config: PrimaryConfig, tokens: Arc<TokenManager>) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| LookupError::config("primary.timeout_ms", e.to_string()))?;
        Ok(Self::with_client(client, config, tokens))
    }

    pub fn with_client(client: Client, config: PrimaryConfig, tokens: Arc<TokenManager>) -> Self {
        Self {
            client,
            config,
            tokens,
        }
    }

    pub fn token_manager(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    /// Largest page the provider is asked for.
    pub fn max_results(&self) -> usize {
        self.config.max_results.max(1)
    }

    pub async fn search_foods(
        &self,
        query: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<NormalizedProduct>> {
        let query = query.trim();
        if query.chars().count() < MIN_QUERY_LENGTH {
            tracing::debug!(query, "query below minimum length, skipping primary search");
            return Ok(Vec::new());
        }

        let limit = limit.clamp(1, self.max_results());
        let page_number = offset / limit;

        let Some(body) = self
            .call(
                "foods.search",
                vec![
                    ("search_expression", query.to_string()),
                    ("max_results", limit.to_string()),
                    ("page_number", page_number.to_string()),
                ],
            )
            .await?
        else {
            return Ok(Vec::new());
        };

        let products: Vec<NormalizedProduct> = parse_food_list(&body)?
            .iter()
            .take(limit)
            .map(normalize)
            .collect();

        tracing::debug!(query, results = products.len(), "primary search finished");
        Ok(products)
    }

    pub async fn get_food_by_id(&self, id: &str) -> Result<Option<NormalizedProduct>> {
        let id = id.trim();
        if id.is_empty() {
            return Ok(None);
        }

        let Some(body) = self
            .call("food.get.v2", vec![("food_id", id.to_string())])
            .await?
        else {
            return Ok(None);
        };

        match body.get("food") {
            Some(food) if !food.is_null() => Ok(parse_food(food)?.as_ref().map(normalize)),
            _ => Ok(None),
        }
    }

    /// Resolves the barcode to a provider food id, then fetches that food.
    /// An unresolved barcode is `Ok(None)`.
    pub async fn find_food_by_barcode(&self, code: &str) -> Result<Option<NormalizedProduct>> {
        let Some(barcode) = canonical_barcode(code) else {
            return Ok(None);
        };

        let Some(body) = self
            .call("food.find_id_for_barcode", vec![("barcode", barcode.clone())])
            .await?
        else {
            return Ok(None);
        };

        match parse_barcode_food_id(&body) {
            Some(food_id) => {
                tracing::debug!(barcode = %barcode, food_id = %food_id, "barcode resolved");
                self.get_food_by_id(&food_id).await
            }
            None => {
                tracing::debug!(barcode = %barcode, "barcode not known to primary source");
                Ok(None)
            }
        }
    }

    /// Authenticated GET against `server.api`. `Ok(None)` when the provider
    /// answers with a "not found" error envelope.
    async fn call(&self, method: &str, params: Vec<(&str, String)>) -> Result<Option<Value>> {
        let token = self.tokens.get_token().await?;
        let url = format!("{}/server.api", self.config.base_url.trim_end_matches('/'));

        let mut query: Vec<(&str, String)> = vec![
            ("method", method.to_string()),
            ("format", "json".to_string()),
        ];
        query.extend(params);
        if let Some(region) = &self.config.region {
            query.push(("region", region.clone()));
        }
        if let Some(language) = &self.config.language {
            query.push(("language", language.clone()));
        }

        tracing::debug!(method, url = %url, "calling primary source");
        let response = self
            .client
            .get(&url)
            .bearer_auth(&token)
            .query(&query)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::debug!(method, status = status.as_u16(), "primary source returned error status");
            return Err(LookupError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let value: Value = serde_json::from_str(&body)?;

        if let Some(error) = value.get("error") {
            let code = error.get("code").and_then(value_as_f64).map(|c| c as i64);
            if matches!(code, Some(c) if NOT_FOUND_CODES.contains(&c)) {
                return Ok(None);
            }
            return Err(LookupError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(Some(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_food_list_plural() {
        let body = json!({"foods": {"food": [
            {"food_id": "1", "food_name": "Apple", "food_type": "Generic"},
            {"food_id": 2, "food_name": "Apple Juice", "brand_name": "Tropicana", "food_type": "Brand"}
        ], "total_results": "2"}});

        let foods = parse_food_list(&body).unwrap();
        assert_eq!(foods.len(), 2);
        assert_eq!(foods[1].id, "2");
        assert_eq!(foods[1].kind, FoodKind::Branded);
    }

    #[test]
    fn test_parse_food_list_singular_object() {
        let body = json!({"foods": {"food": {"food_id": "7", "food_name": "Kiwi"}}});
        let foods = parse_food_list(&body).unwrap();
        assert_eq!(foods.len(), 1);
        assert_eq!(foods[0].name, "Kiwi");
    }

    #[test]
    fn test_parse_food_list_empty_shapes() {
        assert!(parse_food_list(&json!({"foods": {}})).unwrap().is_empty());
        assert!(parse_food_list(&json!({"foods": {"total_results": "0"}}))
            .unwrap()
            .is_empty());
        assert!(parse_food_list(&json!({})).unwrap().is_empty());
        assert!(parse_food_list(&json!({"foods": {"food": null}}))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_single_serving_object_becomes_list() {
        let food = json!({
            "food_id": "11",
            "food_name": "Butter",
            "servings": {"serving": {
                "serving_id": "1",
                "metric_serving_amount": "100.000",
                "metric_serving_unit": "g",
                "calories": "717",
                "protein": "0.85",
                "fat": "81.11",
                "carbohydrate": "0.06"
            }}
        });
        let parsed = parse_food(&food).unwrap().unwrap();
        assert_eq!(parsed.servings.len(), 1);
        assert_eq!(parsed.servings[0].calories.as_deref(), Some("717"));
    }

    #[test]
    fn test_nameless_records_are_dropped() {
        let body = json!({"foods": {"food": [
            {"food_id": "1"},
            {"food_name": "No id"},
            {"food_id": "3", "food_name": "Ok"}
        ]}});
        let foods = parse_food_list(&body).unwrap();
        assert_eq!(foods.len(), 1);
        assert_eq!(foods[0].id, "3");
    }

    #[test]
    fn test_malformed_record_does_not_sink_page() {
        let body = json!({"foods": {"food": [
            {"food_id": "1", "food_name": "Apple", "servings": ""},
            {"food_id": "2", "food_name": {"en": "Pear"}},
            {"food_id": "3", "food_name": "Plum"},
            "garbage"
        ]}});
        let foods = parse_food_list(&body).unwrap();
        let ids: Vec<&str> = foods.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["3"]);
    }

    #[test]
    fn test_parse_barcode_food_id_shapes() {
        assert_eq!(
            parse_barcode_food_id(&json!({"food_id": {"value": "4242"}})).as_deref(),
            Some("4242")
        );
        assert_eq!(
            parse_barcode_food_id(&json!({"food_id": 99})).as_deref(),
            Some("99")
        );
        assert_eq!(parse_barcode_food_id(&json!({"food_id": {"value": "0"}})), None);
        assert_eq!(parse_barcode_food_id(&json!({})), None);
    }
}
