use serde::{Deserialize, Serialize};

/// Whether the provider describes a generic food or a branded product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FoodKind {
    Generic,
    Branded,
}

impl FoodKind {
    pub fn from_provider(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(kind) if kind.eq_ignore_ascii_case("brand") || kind.eq_ignore_ascii_case("branded") => {
                FoodKind::Branded
            }
            _ => FoodKind::Generic,
        }
    }
}

/// One serving as reported by the primary provider. Numeric fields stay in
/// their wire form until normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Serving {
    pub id: String,
    pub description: String,
    pub metric_amount: Option<String>,
    pub metric_unit: Option<String>,
    pub calories: Option<String>,
    pub carbohydrate: Option<String>,
    pub protein: Option<String>,
    pub fat: Option<String>,
    pub saturated_fat: Option<String>,
    pub fiber: Option<String>,
    pub sugar: Option<String>,
    pub sodium: Option<String>,
}

/// Raw food record from the primary provider, discarded after normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderFood {
    pub id: String,
    pub name: String,
    pub brand: Option<String>,
    pub kind: FoodKind,
    pub servings: Vec<Serving>,
    /// Image descriptors exactly as received.
    pub images: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductSource {
    Primary,
    Secondary,
    Local,
    User,
}

impl ProductSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductSource::Primary => "primary",
            ProductSource::Secondary => "secondary",
            ProductSource::Local => "local",
            ProductSource::User => "user",
        }
    }
}

impl std::fmt::Display for ProductSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical product, every nutrient expressed per 100 grams.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedProduct {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    pub calories_per_100g: f64,
    pub protein_per_100g: f64,
    pub fats_per_100g: f64,
    pub carbs_per_100g: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saturated_fat_per_100g: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fiber_per_100g: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sugar_per_100g: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sodium_per_100g: Option<f64>,
    pub source: ProductSource,
    pub source_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Nutrient amounts for a concrete portion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NutrientAmounts {
    pub calories: f64,
    pub protein: f64,
    pub fats: f64,
    pub carbs: f64,
}

impl NormalizedProduct {
    /// Nutrients for a portion of `grams`. Non-positive or non-finite
    /// weights give all-zero amounts.
    pub fn scaled(&self, grams: f64) -> NutrientAmounts {
        if !grams.is_finite() || grams <= 0.0 {
            return NutrientAmounts::default();
        }
        let factor = grams / 100.0;
        let scale = |per_100g: f64| {
            let value = per_100g * factor;
            if value.is_finite() && value > 0.0 {
                value
            } else {
                0.0
            }
        };
        NutrientAmounts {
            calories: scale(self.calories_per_100g),
            protein: scale(self.protein_per_100g),
            fats: scale(self.fats_per_100g),
            carbs: scale(self.carbs_per_100g),
        }
    }

    /// Case-folded `name|brand` used to spot the same product coming from
    /// two different sources.
    pub fn identity_key(&self) -> String {
        format!(
            "{}|{}",
            self.name.trim().to_lowercase(),
            self.brand.as_deref().unwrap_or("").trim().to_lowercase()
        )
    }
}
