//! Routes inbound events: commands are answered here, everything else goes
//! through the conversation state machine. Events are handled strictly one
//! after another.

use std::time::Duration;

use tracing::{debug, error, info, instrument, warn};

use crate::conversation::{replies, ConversationStateMachine};
use crate::messenger::{EventPayload, InboundEvent, Messenger};

/// Phrase that starts a new day.
pub const RESET_PHRASE: &str = "primeira refeição";

const POLL_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Summary,
    ResetDay,
    Unknown(String),
}

impl Command {
    /// `None` for ordinary text. Telegram's `/cmd@botname` form is accepted.
    pub fn parse(text: &str) -> Option<Command> {
        let normalized = text.trim().to_lowercase();
        if normalized == RESET_PHRASE {
            return Some(Command::ResetDay);
        }
        let word = normalized.strip_prefix('/')?.split_whitespace().next().unwrap_or("");
        let name = word.split('@').next().unwrap_or(word);
        Some(match name {
            "start" => Command::Start,
            "resumo" => Command::Summary,
            _ => Command::Unknown(format!("/{name}")),
        })
    }
}

pub struct EventDispatcher<M: Messenger> {
    messenger: M,
    machine: ConversationStateMachine,
}

impl<M: Messenger> EventDispatcher<M> {
    pub fn new(messenger: M, machine: ConversationStateMachine) -> Self {
        Self { messenger, machine }
    }

    /// Handles one event to completion and returns the reply for it.
    #[instrument(skip(self, event), fields(user_id = %event.user_id))]
    pub async fn dispatch(&mut self, event: InboundEvent) -> String {
        let user_id = event.user_id.as_str();
        match &event.payload {
            EventPayload::Photo(media) => match self.messenger.fetch_media(user_id, media).await {
                Ok(image) => self.machine.on_photo(user_id, image).await,
                Err(e) => {
                    warn!(error = %e, "photo download failed");
                    replies::photo_download_failed()
                }
            },
            EventPayload::Text(text) => match Command::parse(text) {
                None => self.machine.on_text(user_id, text).await,
                Some(command) => {
                    debug!(?command, "command");
                    self.on_command(user_id, command).await
                }
            },
        }
    }

    async fn on_command(&mut self, user_id: &str, command: Command) -> String {
        match command {
            Command::Start => replies::help(),
            Command::Summary => {
                let today = self.machine.today();
                match self.machine.store().weekly_average(user_id, today) {
                    Some(average) => replies::weekly(average),
                    None => replies::no_data(),
                }
            }
            Command::ResetDay => self.machine.reset_day(user_id).await,
            Command::Unknown(name) => replies::unknown_command(&name),
        }
    }

    /// Polls until `shutdown` resolves. The event in hand always completes.
    pub async fn run(mut self, shutdown: impl std::future::Future<Output = ()>) -> anyhow::Result<()> {
        tokio::pin!(shutdown);
        info!("dispatcher started");
        loop {
            let batch = tokio::select! {
                _ = &mut shutdown => break,
                batch = self.messenger.poll() => batch,
            };
            let events = match batch {
                Ok(events) => events,
                Err(e) => {
                    error!(error = %e, "failed to fetch updates");
                    tokio::select! {
                        _ = &mut shutdown => break,
                        _ = tokio::time::sleep(POLL_BACKOFF) => continue,
                    }
                }
            };
            for event in events {
                let chat_id = event.chat_id;
                let reply = self.dispatch(event).await;
                if let Err(e) = self.messenger.send_reply(chat_id, &reply).await {
                    error!(%chat_id, error = %e, "failed to send reply");
                }
            }
        }
        info!("dispatcher stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use time::macros::date;
    use time::Date;

    use super::*;
    use crate::clock::FixedClock;
    use crate::conversation::services::fakes::{ScriptedIdentifier, ScriptedLookup};
    use crate::conversation::state::{ImageRef, PendingOrder, Phase, SessionTable};
    use crate::errors::BotError;
    use crate::external::{FoodIdentification, FoodIdentifier, NutrientProfile};
    use crate::logs::repo::MemoryStore;
    use crate::logs::repo_types::LogBook;
    use crate::logs::DailyLogStore;
    use crate::messenger::{ChatId, MediaRef};
    use crate::nutrition::vector::nv;
    use crate::nutrition::NutrientVector;

    const TODAY: Date = date!(2026 - 10 - 16);

    /// Serves scripted batches. Fetched media is written to `media_dir/tmp_<user>.<ext>`
    /// with the file id as content; the file id `broken` fails to download.
    #[derive(Default, Clone)]
    struct FakeMessenger {
        batches: Arc<Mutex<VecDeque<Vec<InboundEvent>>>>,
        sent: Arc<Mutex<Vec<(ChatId, String)>>>,
        media_dir: Option<PathBuf>,
    }

    #[async_trait]
    impl Messenger for FakeMessenger {
        async fn poll(&mut self) -> anyhow::Result<Vec<InboundEvent>> {
            let next = self.batches.lock().unwrap().pop_front();
            match next {
                Some(batch) => Ok(batch),
                None => std::future::pending().await,
            }
        }

        async fn fetch_media(&self, user_id: &str, media: &MediaRef) -> anyhow::Result<ImageRef> {
            if media.file_id == "broken" {
                anyhow::bail!("file expired");
            }
            let name = format!("tmp_{user_id}.{}", media.ext);
            match &self.media_dir {
                Some(dir) => {
                    let path = dir.join(name);
                    tokio::fs::write(&path, media.file_id.as_bytes()).await?;
                    Ok(ImageRef::new(path))
                }
                None => Ok(ImageRef::new(format!("media/{name}"))),
            }
        }

        async fn send_reply(&self, chat_id: ChatId, text: &str) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push((chat_id, text.to_string()));
            Ok(())
        }
    }

    /// Records the bytes of every image it is asked about.
    #[derive(Default)]
    struct ReadingIdentifier {
        seen: Mutex<Vec<Vec<u8>>>,
    }

    #[async_trait]
    impl FoodIdentifier for ReadingIdentifier {
        async fn identify(&self, _description: &str, image: &ImageRef) -> Result<FoodIdentification, BotError> {
            let bytes = tokio::fs::read(image.path()).await?;
            self.seen.lock().unwrap().push(bytes);
            Ok(FoodIdentification {
                food_name: "rice and beans".into(),
                estimated_grams: Decimal::from(250),
            })
        }
    }

    struct Setup {
        dispatcher: EventDispatcher<FakeMessenger>,
        messenger: FakeMessenger,
        identifier: Arc<ScriptedIdentifier>,
        lookup: Arc<ScriptedLookup>,
    }

    async fn machine(
        book: LogBook,
        identifier: Arc<dyn FoodIdentifier>,
        lookup: Arc<ScriptedLookup>,
    ) -> ConversationStateMachine {
        let store = DailyLogStore::open(Arc::new(MemoryStore::with(book))).await;
        ConversationStateMachine::new(
            SessionTable::new(),
            store,
            identifier,
            lookup,
            Arc::new(FixedClock::new(TODAY)),
        )
    }

    async fn setup(book: LogBook) -> Setup {
        let identifier = Arc::new(ScriptedIdentifier::default());
        let lookup = Arc::new(ScriptedLookup::default());
        let machine = machine(book, identifier.clone(), lookup.clone()).await;
        let messenger = FakeMessenger::default();
        Setup {
            dispatcher: EventDispatcher::new(messenger.clone(), machine),
            messenger,
            identifier,
            lookup,
        }
    }

    fn text(user: &str, body: &str) -> InboundEvent {
        InboundEvent {
            user_id: user.into(),
            chat_id: 100,
            payload: EventPayload::Text(body.into()),
        }
    }

    fn photo(user: &str) -> InboundEvent {
        photo_file(user, "photo-1")
    }

    fn photo_file(user: &str, file_id: &str) -> InboundEvent {
        InboundEvent {
            user_id: user.into(),
            chat_id: 100,
            payload: EventPayload::Photo(MediaRef {
                file_id: file_id.into(),
                ext: "jpg",
            }),
        }
    }

    fn rice_profile() -> NutrientProfile {
        NutrientProfile {
            matched: Some("Rice and beans".into()),
            per_100g: nv("130", "4.5", "0.5", "24"),
        }
    }

    #[test]
    fn parses_commands() {
        assert_eq!(Command::parse("/start"), Some(Command::Start));
        assert_eq!(Command::parse("/resumo"), Some(Command::Summary));
        assert_eq!(Command::parse("/resumo@nutri_bot"), Some(Command::Summary));
        assert_eq!(Command::parse("primeira refeição"), Some(Command::ResetDay));
        assert_eq!(Command::parse("  Primeira Refeição "), Some(Command::ResetDay));
        assert_eq!(Command::parse("/help"), Some(Command::Unknown("/help".into())));
        assert_eq!(Command::parse("primeira refeição do dia"), None);
        assert_eq!(Command::parse("ok"), None);
        assert_eq!(Command::parse("250"), None);
    }

    #[tokio::test]
    async fn summary_without_history_is_no_data() {
        let mut s = setup(LogBook::default()).await;
        let reply = s.dispatcher.dispatch(text("42", "/resumo")).await;
        assert_eq!(reply, replies::no_data());
        assert_eq!(s.dispatcher.machine.store().day("42", TODAY), None);
    }

    #[tokio::test]
    async fn summary_after_fresh_reset_is_zero() {
        let mut s = setup(LogBook::default()).await;
        s.dispatcher.dispatch(text("42", "primeira refeição")).await;

        let reply = s.dispatcher.dispatch(text("42", "/resumo")).await;

        assert_eq!(reply, replies::weekly(NutrientVector::ZERO));
        assert!(reply.contains("🔥 0 kcal"));
    }

    #[tokio::test]
    async fn summary_averages_present_days() {
        let mut book = LogBook::default();
        book.set_day("42", TODAY, nv("3000", "150", "90", "400"));
        book.set_day("42", date!(2026 - 10 - 12), nv("2000", "50", "30", "300"));
        let mut s = setup(book).await;

        let reply = s.dispatcher.dispatch(text("42", "/resumo")).await;

        assert!(reply.contains("🔥 2500 kcal"), "{reply}");
        assert!(reply.contains("🥩 100 g"));
        assert!(reply.contains("🥑 60 g"));
        assert!(reply.contains("🍞 350 g"));
    }

    #[tokio::test]
    async fn commands_leave_pending_orders_alone() {
        let mut s = setup(LogBook::default()).await;
        s.dispatcher.dispatch(photo("42")).await;

        s.dispatcher.dispatch(text("42", "/start")).await;
        s.dispatcher.dispatch(text("42", "/resumo")).await;
        s.dispatcher.dispatch(text("42", "/whatever")).await;

        assert_eq!(s.dispatcher.machine.phase("42"), Phase::AwaitingDescription);
    }

    #[tokio::test]
    async fn reset_phrase_reaches_the_state_machine() {
        let mut s = setup(LogBook::default()).await;
        s.dispatcher.dispatch(photo("42")).await;

        let reply = s.dispatcher.dispatch(text("42", "Primeira refeição")).await;

        assert_eq!(reply, replies::day_reset());
        assert_eq!(s.dispatcher.machine.phase("42"), Phase::Idle);
    }

    #[tokio::test]
    async fn description_is_matched_with_the_photo_before_it() {
        let dir = tempfile::tempdir().unwrap();
        let identifier = Arc::new(ReadingIdentifier::default());
        let lookup = Arc::new(ScriptedLookup::default());
        lookup.push(Ok(rice_profile()));
        let machine = machine(LogBook::default(), identifier.clone(), lookup).await;
        let messenger = FakeMessenger {
            media_dir: Some(dir.path().to_path_buf()),
            ..FakeMessenger::default()
        };
        let mut dispatcher = EventDispatcher::new(messenger, machine);

        // one poll batch: the second photo must not be fetched before the text is handled
        for event in [
            photo_file("42", "first-photo"),
            text("42", "arroz"),
            photo_file("42", "second-photo"),
        ] {
            dispatcher.dispatch(event).await;
        }

        assert_eq!(identifier.seen.lock().unwrap().clone(), vec![b"first-photo".to_vec()]);
        assert_eq!(dispatcher.machine.phase("42"), Phase::AwaitingDescription);
    }

    #[tokio::test]
    async fn failed_photo_download_leaves_the_order_untouched() {
        let mut s = setup(LogBook::default()).await;
        s.dispatcher.dispatch(photo("42")).await;

        let reply = s.dispatcher.dispatch(photo_file("42", "broken")).await;

        assert_eq!(reply, replies::photo_download_failed());
        assert_eq!(
            s.dispatcher.machine.pending("42"),
            Some(&PendingOrder::AwaitingDescription {
                image: ImageRef::new("media/tmp_42.jpg")
            })
        );
    }

    #[tokio::test]
    async fn run_replies_to_every_event_in_order() {
        let s = setup(LogBook::default()).await;
        s.identifier.push(Ok(FoodIdentification {
            food_name: "rice and beans".into(),
            estimated_grams: Decimal::from(250),
        }));
        s.lookup.push(Ok(rice_profile()));
        s.messenger
            .batches
            .lock()
            .unwrap()
            .push_back(vec![photo("42"), text("42", "arroz e feijão"), text("42", "ok")]);

        let sent = s.messenger.sent.clone();
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(s.dispatcher.run(async move {
            let _ = stop_rx.await;
        }));

        for _ in 0..100 {
            if sent.lock().unwrap().len() == 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        stop_tx.send(()).unwrap();
        handle.await.unwrap().unwrap();

        let sent = sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 3);
        assert!(sent[0].1.contains("Foto recebida"));
        assert!(sent[1].1.contains("250g"));
        assert!(sent[2].1.contains("325/3300"));
        assert!(sent.iter().all(|(chat, _)| *chat == 100));
    }
}
