//! Pure arithmetic over the log book: accumulation, remaining budget and
//! the rolling weekly average.

use rust_decimal::Decimal;
use time::{Date, Duration};

use super::vector::{NutrientVector, TARGET};
use crate::errors::BotError;
use crate::logs::repo_types::LogBook;

/// Length of the rolling window used by [`weekly_average`], today included.
pub const WEEK_DAYS: i64 = 7;

/// Nutrients contained in `grams` of a food whose per-100g values are `base`.
/// `None` when the product does not fit in a decimal.
pub fn portion(base: NutrientVector, grams: Decimal) -> Option<NutrientVector> {
    base.checked_scaled(grams.checked_div(Decimal::ONE_HUNDRED)?)
}

/// `log + base * grams / 100`. Callers guarantee `grams > 0`.
///
/// An overflowing portion is an input error; `log` is left as it was.
pub fn accumulate(log: NutrientVector, base: NutrientVector, grams: Decimal) -> Result<NutrientVector, BotError> {
    debug_assert!(grams > Decimal::ZERO);
    portion(base, grams)
        .and_then(|p| log.checked_add(&p))
        .ok_or_else(|| BotError::InputParse(format!("{grams}g does not fit in the daily total")))
}

/// Calories left before the daily target; negative once it is exceeded.
pub fn remaining(log: NutrientVector) -> Decimal {
    TARGET.calories() - log.calories()
}

/// `today, today-1, ..., today-6`.
pub fn week_window(today: Date) -> impl Iterator<Item = Date> {
    (0..WEEK_DAYS).filter_map(move |i| today.checked_sub(Duration::days(i)))
}

/// Field-wise arithmetic mean, `None` for an empty slice.
pub fn mean(days: &[NutrientVector]) -> Option<NutrientVector> {
    if days.is_empty() {
        return None;
    }
    let count = Decimal::from(days.len());
    match sum(days.iter().copied()) {
        Some(total) => Some(total.divided(count)),
        // sum overflowed: divide first, at the cost of some rounding
        None => sum(days.iter().map(|day| day.divided(count))),
    }
}

fn sum(mut days: impl Iterator<Item = NutrientVector>) -> Option<NutrientVector> {
    days.try_fold(NutrientVector::ZERO, |acc, day| acc.checked_add(&day))
}

/// Mean over the days of the window that have an entry for `user_id`.
/// Missing days are skipped; a day reset to zero still counts.
pub fn weekly_average(book: &LogBook, user_id: &str, today: Date) -> Option<NutrientVector> {
    let present: Vec<NutrientVector> = week_window(today)
        .filter_map(|date| book.day(user_id, date))
        .collect();
    mean(&present)
}
