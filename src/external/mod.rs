//! Outbound collaborators: food identification from a photo and per-100g
//! nutrient lookup. Each call is single-attempt; timeouts live in the HTTP
//! client of the implementation.

pub mod gemini;
pub mod usda;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::conversation::state::ImageRef;
use crate::errors::BotError;
use crate::nutrition::NutrientVector;

#[derive(Debug, Clone, PartialEq)]
pub struct FoodIdentification {
    pub food_name: String,
    /// Always > 0.
    pub estimated_grams: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NutrientProfile {
    /// Database description of the matched food; `None` when nothing matched.
    pub matched: Option<String>,
    pub per_100g: NutrientVector,
}

impl NutrientProfile {
    pub fn unmatched() -> Self {
        Self {
            matched: None,
            per_100g: NutrientVector::ZERO,
        }
    }
}

#[async_trait]
pub trait FoodIdentifier: Send + Sync {
    async fn identify(&self, description: &str, image: &ImageRef) -> Result<FoodIdentification, BotError>;
}

#[async_trait]
pub trait NutrientLookup: Send + Sync {
    /// A query with no match yields [`NutrientProfile::unmatched`], not an error.
    async fn lookup(&self, food_name: &str) -> Result<NutrientProfile, BotError>;
}

pub use gemini::GeminiIdentifier;
pub use usda::UsdaLookup;
