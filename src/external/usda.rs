use async_trait::async_trait;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use super::{NutrientLookup, NutrientProfile};
use crate::config::UsdaConfig;
use crate::errors::BotError;
use crate::nutrition::NutrientVector;

const SERVICE: &str = "usda";

/// USDA FoodData Central search; the first hit supplies the per-100g values.
pub struct UsdaLookup {
    config: UsdaConfig,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(default)]
    foods: Vec<SearchFood>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchFood {
    description: Option<String>,
    #[serde(default)]
    food_nutrients: Vec<SearchNutrient>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchNutrient {
    nutrient_name: Option<String>,
    unit_name: Option<String>,
    value: Option<f64>,
}

impl SearchNutrient {
    fn name(&self) -> String {
        self.nutrient_name.as_deref().unwrap_or_default().to_lowercase()
    }

    fn unit_is(&self, unit: &str) -> bool {
        self.unit_name
            .as_deref()
            .is_some_and(|u| u.eq_ignore_ascii_case(unit))
    }
}

impl UsdaLookup {
    pub fn new(config: UsdaConfig, http: reqwest::Client) -> Self {
        Self { config, http }
    }
}

#[async_trait]
impl NutrientLookup for UsdaLookup {
    #[instrument(skip(self))]
    async fn lookup(&self, food_name: &str) -> Result<NutrientProfile, BotError> {
        let url = format!("{}/foods/search", self.config.base_url.trim_end_matches('/'));
        let response = self
            .http
            .get(&url)
            .query(&[
                ("query", food_name),
                ("pageSize", "1"),
                ("api_key", self.config.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| BotError::external(SERVICE, e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            warn!(%status, "usda returned an error status");
            return Err(BotError::external(SERVICE, format!("HTTP {status}: {text}")));
        }

        let search: SearchResponse = response
            .json()
            .await
            .map_err(|e| BotError::external(SERVICE, format!("JSON parse error: {e}")))?;

        let profile = profile_from_search(search)?;
        match &profile.matched {
            Some(description) => debug!(%description, "nutrients found"),
            None => warn!("no food matched; using zero nutrients"),
        }
        Ok(profile)
    }
}

/// Picks energy (kcal), protein, total fat and carbohydrate out of the first
/// search hit. Nutrients the hit lacks count as zero.
pub(crate) fn profile_from_search(search: SearchResponse) -> Result<NutrientProfile, BotError> {
    let Some(food) = search.foods.into_iter().next() else {
        return Ok(NutrientProfile::unmatched());
    };
    let nutrients = &food.food_nutrients;

    let value_of = |pick: &dyn Fn(&SearchNutrient) -> bool| -> Result<Decimal, BotError> {
        match nutrients.iter().find(|n| pick(*n)).and_then(|n| n.value) {
            None => Ok(Decimal::ZERO),
            Some(v) => Decimal::from_f64(v)
                .ok_or_else(|| BotError::external(SERVICE, format!("unrepresentable amount {v}"))),
        }
    };

    let energy_kcal = |n: &SearchNutrient| n.name().contains("energy") && n.unit_is("kcal");
    let energy_any = |n: &SearchNutrient| n.name().contains("energy") && !n.unit_is("kj");
    let calories = if nutrients.iter().any(energy_kcal) {
        value_of(&energy_kcal)?
    } else {
        value_of(&energy_any)?
    };

    let protein = value_of(&|n: &SearchNutrient| n.name().contains("protein"))?;
    let total_lipid = |n: &SearchNutrient| n.name().contains("total lipid");
    let fat = if nutrients.iter().any(total_lipid) {
        value_of(&total_lipid)?
    } else {
        value_of(&|n: &SearchNutrient| n.name().contains("fat"))?
    };
    let carbs = value_of(&|n: &SearchNutrient| n.name().contains("carbohydrate"))?;

    let per_100g = NutrientVector::try_new(calories, protein, fat, carbs)
        .ok_or_else(|| BotError::external(SERVICE, "negative nutrient amount"))?;

    Ok(NutrientProfile {
        matched: Some(food.description.unwrap_or_default()),
        per_100g,
    })
}
