//! Converts provider food records into the canonical per-100g product.
//!
//! The basis is chosen in priority order:
//! 1. a metric serving of exactly 100 g (or 100 ml) is used as-is,
//! 2. otherwise the first metric serving with a positive amount is scaled
//!    by `100 / amount`,
//! 3. otherwise every macro is zero.
//!
//! Nothing in here returns an error: malformed numbers read as zero.

use crate::domain::model::{NormalizedProduct, ProductSource, ProviderFood, Serving};
use serde_json::Value;

const REFERENCE_GRAMS: f64 = 100.0;

/// Parses a provider decimal string. Missing, non-numeric and non-finite
/// input reads as 0.
pub fn parse_decimal(raw: Option<&str>) -> f64 {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

fn is_metric_unit(unit: Option<&str>) -> bool {
    matches!(
        unit.map(|u| u.trim().to_ascii_lowercase()).as_deref(),
        Some("g" | "gram" | "grams" | "ml" | "milliliter" | "milliliters" | "millilitre" | "millilitres")
    )
}

/// Serving used as the per-100g basis and the factor that takes its values
/// to 100 g.
fn select_basis(servings: &[Serving]) -> Option<(&Serving, f64)> {
    let metric = || {
        servings
            .iter()
            .filter(|s| is_metric_unit(s.metric_unit.as_deref()))
            .map(|s| (s, parse_decimal(s.metric_amount.as_deref())))
    };

    if let Some((serving, _)) = metric().find(|(_, amount)| (amount - REFERENCE_GRAMS).abs() < 1e-9) {
        return Some((serving, 1.0));
    }

    metric()
        .find(|(_, amount)| *amount > 0.0)
        .map(|(serving, amount)| (serving, REFERENCE_GRAMS / amount))
}

fn per_100g(raw: Option<&str>, factor: f64) -> f64 {
    let value = parse_decimal(raw) * factor;
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

fn optional_per_100g(raw: Option<&str>, factor: f64) -> Option<f64> {
    raw.map(|r| per_100g(Some(r), factor))
}

pub fn normalize(food: &ProviderFood) -> NormalizedProduct {
    let brand = food
        .brand
        .as_deref()
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .map(str::to_string);

    let mut product = NormalizedProduct {
        name: food.name.trim().to_string(),
        brand,
        calories_per_100g: 0.0,
        protein_per_100g: 0.0,
        fats_per_100g: 0.0,
        carbs_per_100g: 0.0,
        saturated_fat_per_100g: None,
        fiber_per_100g: None,
        sugar_per_100g: None,
        sodium_per_100g: None,
        source: ProductSource::Primary,
        source_id: food.id.clone(),
        image_url: extract_image_url(food.images.as_ref()),
    };

    match select_basis(&food.servings) {
        Some((serving, factor)) => {
            product.calories_per_100g = per_100g(serving.calories.as_deref(), factor);
            product.protein_per_100g = per_100g(serving.protein.as_deref(), factor);
            product.fats_per_100g = per_100g(serving.fat.as_deref(), factor);
            product.carbs_per_100g = per_100g(serving.carbohydrate.as_deref(), factor);
            product.saturated_fat_per_100g =
                optional_per_100g(serving.saturated_fat.as_deref(), factor);
            product.fiber_per_100g = optional_per_100g(serving.fiber.as_deref(), factor);
            product.sugar_per_100g = optional_per_100g(serving.sugar.as_deref(), factor);
            product.sodium_per_100g = optional_per_100g(serving.sodium.as_deref(), factor);
        }
        None => {
            tracing::debug!(
                food_id = %food.id,
                servings = food.servings.len(),
                "no metric serving, macros default to zero"
            );
        }
    }

    product
}

/// Canonical barcode for lookups: separators dropped, digits only, left
/// padded to 13 digits (GTIN-13). `None` for empty or non-numeric input.
pub fn canonical_barcode(raw: &str) -> Option<String> {
    let digits: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();

    if digits.is_empty() || digits.len() > 14 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    Some(format!("{:0>13}", digits))
}

/// URL of the first image descriptor. Accepts a list of descriptors, a
/// `{"food_image": ...}` wrapper, or a single descriptor. Anything else is
/// `None`.
pub fn extract_image_url(descriptors: Option<&Value>) -> Option<String> {
    let first = match descriptors? {
        Value::Array(items) => items.first()?,
        Value::Object(map) => match map.get("food_image") {
            Some(inner) => return extract_image_url(Some(inner)),
            None => descriptors?,
        },
        _ => return None,
    };

    let url = match first {
        Value::String(s) => s.as_str(),
        Value::Object(map) => map
            .get("image_url")
            .or_else(|| map.get("url"))
            .and_then(Value::as_str)?,
        _ => return None,
    };

    let url = url.trim();
    if url.is_empty() {
        None
    } else {
        Some(url.to_string())
    }
}
