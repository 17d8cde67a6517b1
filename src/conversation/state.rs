use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;

use crate::nutrition::NutrientVector;

/// Opaque handle to a downloaded meal photo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef(PathBuf);

impl ImageRef {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    /// MIME type guessed from the file extension; JPEG when unknown.
    pub fn mime_type(&self) -> &'static str {
        let ext = self
            .0
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("png") => "image/png",
            Some("webp") => "image/webp",
            Some("heic") => "image/heic",
            _ => "image/jpeg",
        }
    }
}

/// An in-progress meal logging conversation. Absence means the user is idle.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingOrder {
    AwaitingDescription {
        image: ImageRef,
    },
    AwaitingConfirmation {
        food_name: String,
        estimated_grams: Decimal,
        per_100g: NutrientVector,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    AwaitingDescription,
    AwaitingConfirmation,
}

impl PendingOrder {
    pub fn phase(&self) -> Phase {
        match self {
            PendingOrder::AwaitingDescription { .. } => Phase::AwaitingDescription,
            PendingOrder::AwaitingConfirmation { .. } => Phase::AwaitingConfirmation,
        }
    }
}

/// Per-user pending orders. Process memory only; lost on restart.
#[derive(Debug, Default)]
pub struct SessionTable {
    orders: HashMap<String, PendingOrder>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, user_id: &str) -> Option<&PendingOrder> {
        self.orders.get(user_id)
    }

    pub fn phase(&self, user_id: &str) -> Phase {
        self.get(user_id).map_or(Phase::Idle, PendingOrder::phase)
    }

    /// Replaces whatever the user had pending.
    pub fn put(&mut self, user_id: &str, order: PendingOrder) -> Option<PendingOrder> {
        self.orders.insert(user_id.to_string(), order)
    }

    pub fn take(&mut self, user_id: &str) -> Option<PendingOrder> {
        self.orders.remove(user_id)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.orders.len()
    }
}
