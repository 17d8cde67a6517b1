use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One of the four tracked nutrients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NutrientField {
    Calories,
    Protein,
    Fat,
    Carbs,
}

impl NutrientField {
    pub const ALL: [NutrientField; 4] = [
        NutrientField::Calories,
        NutrientField::Protein,
        NutrientField::Fat,
        NutrientField::Carbs,
    ];

    pub fn unit(self) -> &'static str {
        match self {
            NutrientField::Calories => "kcal",
            _ => "g",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            NutrientField::Calories => "🔥",
            NutrientField::Protein => "🥩",
            NutrientField::Fat => "🥑",
            NutrientField::Carbs => "🍞",
        }
    }
}

/// Non-negative {calories, protein, fat, carbs} tuple.
///
/// Fields are private so every instance goes through [`NutrientVector::try_new`]
/// or the checked arithmetic below, which keeps all values >= 0. Deserialization
/// goes through `try_new` as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "RawNutrientVector")]
pub struct NutrientVector {
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    calories: Decimal,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    protein: Decimal,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    fat: Decimal,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    carbs: Decimal,
}

#[derive(Deserialize)]
struct RawNutrientVector {
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    calories: Decimal,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    protein: Decimal,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    fat: Decimal,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    carbs: Decimal,
}

impl TryFrom<RawNutrientVector> for NutrientVector {
    type Error = String;

    fn try_from(raw: RawNutrientVector) -> Result<Self, Self::Error> {
        NutrientVector::try_new(raw.calories, raw.protein, raw.fat, raw.carbs)
            .ok_or_else(|| "nutrient values must not be negative".to_string())
    }
}

/// Fixed daily goal.
pub const TARGET: NutrientVector = NutrientVector {
    calories: Decimal::from_parts(3300, 0, 0, false, 0),
    protein: Decimal::from_parts(175, 0, 0, false, 0),
    fat: Decimal::from_parts(95, 0, 0, false, 0),
    carbs: Decimal::from_parts(435, 0, 0, false, 0),
};

impl NutrientVector {
    pub const ZERO: NutrientVector = NutrientVector {
        calories: Decimal::ZERO,
        protein: Decimal::ZERO,
        fat: Decimal::ZERO,
        carbs: Decimal::ZERO,
    };

    /// Returns `None` when any component is negative.
    pub fn try_new(calories: Decimal, protein: Decimal, fat: Decimal, carbs: Decimal) -> Option<Self> {
        let v = Self {
            calories,
            protein,
            fat,
            carbs,
        };
        NutrientField::ALL
            .iter()
            .all(|f| v.get(*f) >= Decimal::ZERO)
            .then_some(v)
    }

    pub fn get(&self, field: NutrientField) -> Decimal {
        match field {
            NutrientField::Calories => self.calories,
            NutrientField::Protein => self.protein,
            NutrientField::Fat => self.fat,
            NutrientField::Carbs => self.carbs,
        }
    }

    pub fn calories(&self) -> Decimal {
        self.calories
    }

    /// Element-wise multiplication by a non-negative factor; `None` on overflow.
    pub fn checked_scaled(&self, factor: Decimal) -> Option<Self> {
        if factor < Decimal::ZERO {
            return None;
        }
        Some(Self {
            calories: self.calories.checked_mul(factor)?,
            protein: self.protein.checked_mul(factor)?,
            fat: self.fat.checked_mul(factor)?,
            carbs: self.carbs.checked_mul(factor)?,
        })
    }

    /// Element-wise sum; `None` on overflow.
    pub fn checked_add(&self, rhs: &NutrientVector) -> Option<Self> {
        Some(Self {
            calories: self.calories.checked_add(rhs.calories)?,
            protein: self.protein.checked_add(rhs.protein)?,
            fat: self.fat.checked_add(rhs.fat)?,
            carbs: self.carbs.checked_add(rhs.carbs)?,
        })
    }

    /// Element-wise division; `divisor` must be positive.
    pub fn divided(&self, divisor: Decimal) -> Self {
        debug_assert!(divisor > Decimal::ZERO);
        Self {
            calories: self.calories / divisor,
            protein: self.protein / divisor,
            fat: self.fat / divisor,
            carbs: self.carbs / divisor,
        }
    }

    #[cfg(test)]
    pub fn is_zero(&self) -> bool {
        NutrientField::ALL.iter().all(|f| self.get(*f).is_zero())
    }
}

#[cfg(test)]
pub(crate) fn nv(calories: &str, protein: &str, fat: &str, carbs: &str) -> NutrientVector {
    use std::str::FromStr;
    let d = |s: &str| Decimal::from_str(s).expect("decimal literal");
    NutrientVector::try_new(d(calories), d(protein), d(fat), d(carbs)).expect("non-negative")
}
