use std::sync::Arc;

use rust_decimal::Decimal;
use time::Date;
use tracing::{debug, error, info, instrument, warn};

use super::quantity::{is_confirmation, parse_grams};
use super::replies;
use super::state::{ImageRef, PendingOrder, Phase, SessionTable};
use crate::clock::Clock;
use crate::errors::BotError;
use crate::external::{FoodIdentifier, NutrientLookup};
use crate::logs::DailyLogStore;
use crate::nutrition::NutrientVector;

/// Per-user meal logging conversation.
///
/// Owns the pending orders and the daily log store; handles one event at a
/// time and returns the reply text for it. Nothing here fails: collaborator
/// and input errors turn into replies, persistence errors into warnings.
pub struct ConversationStateMachine {
    sessions: SessionTable,
    store: DailyLogStore,
    identifier: Arc<dyn FoodIdentifier>,
    lookup: Arc<dyn NutrientLookup>,
    clock: Arc<dyn Clock>,
}

impl ConversationStateMachine {
    pub fn new(
        sessions: SessionTable,
        store: DailyLogStore,
        identifier: Arc<dyn FoodIdentifier>,
        lookup: Arc<dyn NutrientLookup>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            sessions,
            store,
            identifier,
            lookup,
            clock,
        }
    }

    pub fn phase(&self, user_id: &str) -> Phase {
        self.sessions.phase(user_id)
    }

    #[cfg(test)]
    pub fn pending(&self, user_id: &str) -> Option<&PendingOrder> {
        self.sessions.get(user_id)
    }

    pub fn store(&self) -> &DailyLogStore {
        &self.store
    }

    pub fn today(&self) -> Date {
        self.clock.today()
    }

    /// Any phase -> AwaitingDescription. The newest photo always wins.
    #[instrument(skip(self, image), fields(phase = ?self.phase(user_id)))]
    pub async fn on_photo(&mut self, user_id: &str, image: ImageRef) -> String {
        self.touch_today(user_id).await;
        if let Some(previous) = self.sessions.put(user_id, PendingOrder::AwaitingDescription { image }) {
            debug!(replaced = ?previous.phase(), "pending order replaced by new photo");
        }
        replies::photo_received()
    }

    /// Non-command text: a description, a quantity, or nothing to do.
    #[instrument(skip(self, text), fields(phase = ?self.phase(user_id)))]
    pub async fn on_text(&mut self, user_id: &str, text: &str) -> String {
        self.touch_today(user_id).await;
        match self.sessions.get(user_id).cloned() {
            None => replies::idle_hint(),
            Some(PendingOrder::AwaitingDescription { image }) => {
                self.describe(user_id, text, &image).await
            }
            Some(PendingOrder::AwaitingConfirmation {
                estimated_grams,
                per_100g,
                ..
            }) => self.confirm(user_id, text, estimated_grams, per_100g).await,
        }
    }

    /// Any phase -> Idle, with today's log zeroed.
    #[instrument(skip(self), fields(phase = ?self.phase(user_id)))]
    pub async fn reset_day(&mut self, user_id: &str) -> String {
        if let Some(discarded) = self.sessions.take(user_id) {
            debug!(discarded = ?discarded.phase(), "pending order discarded by reset");
        }
        let today = self.today();
        match self.store.reset_day(user_id, today).await {
            Ok(()) => replies::day_reset(),
            Err(e) => {
                error!(error = %e, "reset not persisted");
                replies::day_reset_not_saved()
            }
        }
    }

    async fn describe(&mut self, user_id: &str, text: &str, image: &ImageRef) -> String {
        let identified = match self.identifier.identify(text, image).await {
            Ok(identified) => identified,
            Err(e) => {
                warn!(error = %e, "food identification failed");
                return replies::identification_failed();
            }
        };
        let profile = match self.lookup.lookup(&identified.food_name).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!(error = %e, food = %identified.food_name, "nutrient lookup failed");
                return replies::identification_failed();
            }
        };

        info!(
            food = %identified.food_name,
            grams = %identified.estimated_grams,
            matched = profile.matched.is_some(),
            "awaiting confirmation"
        );
        let reply = replies::identified(
            &identified.food_name,
            identified.estimated_grams,
            profile.matched.is_some(),
        );
        self.sessions.put(
            user_id,
            PendingOrder::AwaitingConfirmation {
                food_name: identified.food_name,
                estimated_grams: identified.estimated_grams,
                per_100g: profile.per_100g,
            },
        );
        reply
    }

    async fn confirm(
        &mut self,
        user_id: &str,
        text: &str,
        estimated_grams: Decimal,
        per_100g: NutrientVector,
    ) -> String {
        let grams = if is_confirmation(text) {
            estimated_grams
        } else {
            match parse_grams(text) {
                Ok(grams) => grams,
                Err(e) => {
                    debug!(error = %e, "quantity rejected");
                    return replies::not_a_quantity(text);
                }
            }
        };

        let today = self.today();
        let committed = self.store.commit(user_id, today, per_100g, grams).await;
        if let Err(BotError::InputParse(reason)) = &committed {
            debug!(%reason, "portion rejected");
            return replies::not_a_quantity(text);
        }
        // consumed even when the save failed: memory already holds the portion
        self.sessions.take(user_id);
        match committed {
            Ok(totals) => replies::day_totals(totals),
            Err(e) => {
                error!(error = %e, "commit not persisted");
                let totals = self.store.day(user_id, today).unwrap_or_default();
                replies::commit_not_saved(totals)
            }
        }
    }

    async fn touch_today(&mut self, user_id: &str) {
        let today = self.today();
        if let Err(e) = self.store.touch_day(user_id, today).await {
            warn!(error = %e, "lazy daily log creation not persisted");
        }
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::conversation::state::ImageRef;
    use crate::errors::BotError;
    use crate::external::{FoodIdentification, FoodIdentifier, NutrientLookup, NutrientProfile};

    /// Answers identify calls from a script; records what it was asked.
    #[derive(Default)]
    pub struct ScriptedIdentifier {
        pub answers: Mutex<VecDeque<Result<FoodIdentification, BotError>>>,
        pub calls: Mutex<Vec<(String, ImageRef)>>,
    }

    impl ScriptedIdentifier {
        pub fn push(&self, answer: Result<FoodIdentification, BotError>) {
            self.answers.lock().unwrap().push_back(answer);
        }
    }

    #[async_trait]
    impl FoodIdentifier for ScriptedIdentifier {
        async fn identify(&self, description: &str, image: &ImageRef) -> Result<FoodIdentification, BotError> {
            self.calls
                .lock()
                .unwrap()
                .push((description.to_string(), image.clone()));
            self.answers
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(BotError::external("gemini", "no scripted answer")))
        }
    }

    #[derive(Default)]
    pub struct ScriptedLookup {
        pub answers: Mutex<VecDeque<Result<NutrientProfile, BotError>>>,
    }

    impl ScriptedLookup {
        pub fn push(&self, answer: Result<NutrientProfile, BotError>) {
            self.answers.lock().unwrap().push_back(answer);
        }
    }

    #[async_trait]
    impl NutrientLookup for ScriptedLookup {
        async fn lookup(&self, _food_name: &str) -> Result<NutrientProfile, BotError> {
            self.answers
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(BotError::external("usda", "no scripted answer")))
        }
    }
}
