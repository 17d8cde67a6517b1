pub mod aggregator;
pub mod vector;

pub use vector::{NutrientField, NutrientVector, TARGET};
