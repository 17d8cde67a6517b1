use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use time::Date;
use tracing::warn;

use crate::clock::day_key;
use crate::nutrition::NutrientVector;

/// Persisted shape: `{ user_id: { "YYYY-MM-DD": { calories, protein, fat, carbs } } }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct LogBook {
    users: BTreeMap<String, BTreeMap<String, NutrientVector>>,
}

/// Days that are not a valid vector (negative or missing values) are dropped
/// with a warning; the rest of the book still loads.
impl<'de> Deserialize<'de> for LogBook {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, BTreeMap<String, serde_json::Value>>::deserialize(deserializer)?;
        let users = raw
            .into_iter()
            .map(|(user_id, days)| {
                let days = days
                    .into_iter()
                    .filter_map(|(day, value)| match serde_json::from_value::<NutrientVector>(value) {
                        Ok(v) => Some((day, v)),
                        Err(e) => {
                            warn!(%user_id, %day, error = %e, "invalid daily log dropped");
                            None
                        }
                    })
                    .collect();
                (user_id, days)
            })
            .collect();
        Ok(Self { users })
    }
}

impl LogBook {
    pub fn day(&self, user_id: &str, date: Date) -> Option<NutrientVector> {
        self.users.get(user_id)?.get(&day_key(date)).copied()
    }

    /// Returns the entry for (user, date), creating a zero one if absent.
    /// The flag tells whether it was created.
    pub fn ensure_day(&mut self, user_id: &str, date: Date) -> (NutrientVector, bool) {
        let days = self.users.entry(user_id.to_string()).or_default();
        let mut created = false;
        let entry = days.entry(day_key(date)).or_insert_with(|| {
            created = true;
            NutrientVector::ZERO
        });
        (*entry, created)
    }

    pub fn set_day(&mut self, user_id: &str, date: Date, value: NutrientVector) {
        self.users
            .entry(user_id.to_string())
            .or_default()
            .insert(day_key(date), value);
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }
}
