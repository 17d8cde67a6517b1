use thiserror::Error;

/// Failures the conversation core knows how to recover from or report.
#[derive(Debug, Error)]
pub enum BotError {
    /// FoodIdentifier / NutrientLookup unreachable, timed out or answered garbage.
    #[error("{service} failed: {message}")]
    ExternalService {
        service: &'static str,
        message: String,
    },

    /// Quantity text that is not a positive number of grams.
    #[error("invalid quantity: {0:?}")]
    InputParse(String),

    #[error("persistence failure: {0}")]
    Persistence(#[from] std::io::Error),
}

impl BotError {
    pub fn external(service: &'static str, message: impl Into<String>) -> Self {
        Self::ExternalService {
            service,
            message: message.into(),
        }
    }
}
