use std::sync::Arc;

use rust_decimal::Decimal;
use time::Date;
use tracing::{debug, info};

use super::repo::StoreBackend;
use super::repo_types::LogBook;
use crate::errors::BotError;
use crate::nutrition::{aggregator, NutrientVector};

/// The Store: the in-memory log book plus its write-through backend.
///
/// Every mutation rewrites the whole book before returning. When the write
/// fails the in-memory book keeps the mutation and the error is returned, so
/// the next successful save persists it.
pub struct DailyLogStore {
    backend: Arc<dyn StoreBackend>,
    book: LogBook,
}

impl DailyLogStore {
    pub async fn open(backend: Arc<dyn StoreBackend>) -> Self {
        let book = backend.load().await;
        info!(users = book.user_count(), "daily logs loaded");
        Self { backend, book }
    }

    pub fn day(&self, user_id: &str, date: Date) -> Option<NutrientVector> {
        self.book.day(user_id, date)
    }

    /// Lazily creates the zero entry for (user, date). Saves only when created.
    pub async fn touch_day(&mut self, user_id: &str, date: Date) -> Result<NutrientVector, BotError> {
        let (value, created) = self.book.ensure_day(user_id, date);
        if created {
            debug!(user_id, %date, "daily log created");
            self.persist().await?;
        }
        Ok(value)
    }

    /// Adds `grams` of `base` (per 100g) to the day and returns the new total.
    /// A portion too large to add is an `InputParse` error and changes nothing.
    pub async fn commit(
        &mut self,
        user_id: &str,
        date: Date,
        base: NutrientVector,
        grams: Decimal,
    ) -> Result<NutrientVector, BotError> {
        let (current, _) = self.book.ensure_day(user_id, date);
        let updated = aggregator::accumulate(current, base, grams)?;
        self.book.set_day(user_id, date, updated);
        info!(user_id, %date, %grams, calories = %updated.calories(), "portion committed");
        self.persist().await?;
        Ok(updated)
    }

    /// Zeroes the day; the entry stays so it keeps counting for averages.
    pub async fn reset_day(&mut self, user_id: &str, date: Date) -> Result<(), BotError> {
        self.book.set_day(user_id, date, NutrientVector::ZERO);
        info!(user_id, %date, "daily log reset");
        self.persist().await
    }

    pub fn weekly_average(&self, user_id: &str, today: Date) -> Option<NutrientVector> {
        aggregator::weekly_average(&self.book, user_id, today)
    }

    async fn persist(&self) -> Result<(), BotError> {
        self.backend.save(&self.book).await
    }
}
