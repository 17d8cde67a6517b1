use std::str::FromStr;

use async_trait::async_trait;
use base64ct::{Base64, Encoding};
use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};

use super::{FoodIdentification, FoodIdentifier};
use crate::config::GeminiConfig;
use crate::conversation::quantity::{parse_grams, MAX_GRAMS};
use crate::conversation::state::ImageRef;
use crate::errors::BotError;

const SERVICE: &str = "gemini";

/// Vision model that names the food in a photo and estimates its weight.
pub struct GeminiIdentifier {
    config: GeminiConfig,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawIdentification {
    food: Option<String>,
    grams: Option<Value>,
}

impl GeminiIdentifier {
    pub fn new(config: GeminiConfig, http: reqwest::Client) -> Self {
        Self { config, http }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }
}

fn prompt(description: &str) -> String {
    format!(
        "Analise a imagem e o texto \"{description}\". \
         Retorne APENAS JSON no formato {{ \"food\": \"nome em inglês\", \"grams\": numero }}"
    )
}

#[async_trait]
impl FoodIdentifier for GeminiIdentifier {
    #[instrument(skip(self, image), fields(image = %image.path().display()))]
    async fn identify(&self, description: &str, image: &ImageRef) -> Result<FoodIdentification, BotError> {
        let bytes = tokio::fs::read(image.path())
            .await
            .map_err(|e| BotError::external(SERVICE, format!("read image: {e}")))?;

        let body = json!({
            "contents": [{
                "parts": [
                    { "text": prompt(description) },
                    { "inline_data": {
                        "mime_type": image.mime_type(),
                        "data": Base64::encode_string(&bytes),
                    }}
                ]
            }],
            "generationConfig": { "responseMimeType": "application/json" }
        });

        let response = self
            .http
            .post(self.endpoint())
            .query(&[("key", &self.config.api_key)])
            .json(&body)
            .send()
            .await
            .map_err(|e| BotError::external(SERVICE, e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            warn!(%status, "gemini returned an error status");
            return Err(BotError::external(SERVICE, format!("HTTP {status}: {text}")));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| BotError::external(SERVICE, format!("JSON parse error: {e}")))?;

        let text = parsed
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .find_map(|p| p.text)
            .ok_or_else(|| BotError::external(SERVICE, "response has no text part"))?;

        let identification = parse_identification(&text)?;
        debug!(food = %identification.food_name, grams = %identification.estimated_grams, "food identified");
        Ok(identification)
    }
}

/// Extracts `{"food": .., "grams": ..}` from model output, tolerating code
/// fences or prose around the object and grams written as text.
pub fn parse_identification(text: &str) -> Result<FoodIdentification, BotError> {
    lazy_static! {
        static ref OBJECT_RE: Regex = Regex::new(r"(?s)\{.*\}").unwrap();
    }
    let object = OBJECT_RE
        .find(text)
        .ok_or_else(|| BotError::external(SERVICE, "no JSON object in model output"))?;
    let raw: RawIdentification = serde_json::from_str(object.as_str())
        .map_err(|e| BotError::external(SERVICE, format!("malformed identification: {e}")))?;

    let food_name = raw
        .food
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty())
        .ok_or_else(|| BotError::external(SERVICE, "identification without food name"))?;

    let estimated_grams = match raw.grams {
        Some(Value::Number(n)) => Decimal::from_str(&n.to_string())
            .ok()
            .or_else(|| n.as_f64().and_then(Decimal::from_f64)),
        Some(Value::String(s)) => parse_grams(&s).ok(),
        _ => None,
    }
    .filter(|g| *g > Decimal::ZERO && *g <= MAX_GRAMS)
    .ok_or_else(|| BotError::external(SERVICE, "identification without a plausible weight"))?;

    Ok(FoodIdentification {
        food_name,
        estimated_grams,
    })
}
