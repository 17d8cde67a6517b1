use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;

use crate::errors::BotError;

/// Token that accepts the estimated weight as-is.
pub const CONFIRMATION_TOKEN: &str = "ok";

/// Largest single portion accepted, in grams.
pub const MAX_GRAMS: Decimal = Decimal::from_parts(10_000, 0, 0, false, 0);

pub fn is_confirmation(text: &str) -> bool {
    text.trim().eq_ignore_ascii_case(CONFIRMATION_TOKEN)
}

/// Parses a user-typed weight such as `180`, `180.5`, `180,5`, `180g` or
/// `180 gramas`. Zero, negatives, anything above [`MAX_GRAMS`] and anything
/// else are rejected.
pub fn parse_grams(text: &str) -> Result<Decimal, BotError> {
    lazy_static! {
        static ref GRAMS_RE: Regex =
            Regex::new(r"^(\d+(?:[.,]\d+)?)\s*(?:g|gr|grs|grama|gramas|grams?)?$").unwrap();
    }
    let normalized = text.trim().to_lowercase();
    let number = GRAMS_RE
        .captures(&normalized)
        .and_then(|caps| caps.get(1))
        .ok_or_else(|| BotError::InputParse(text.to_string()))?
        .as_str()
        .replace(',', ".");
    let grams = Decimal::from_str(&number).map_err(|_| BotError::InputParse(text.to_string()))?;
    if grams <= Decimal::ZERO || grams > MAX_GRAMS {
        return Err(BotError::InputParse(text.to_string()));
    }
    Ok(grams)
}
