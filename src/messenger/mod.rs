pub mod dto;
pub mod telegram;

use async_trait::async_trait;

use crate::conversation::state::ImageRef;

/// Where a reply goes back to.
pub type ChatId = i64;

/// Media announced by the transport but not downloaded yet.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaRef {
    pub file_id: String,
    pub ext: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    /// Fetched with [`Messenger::fetch_media`] when the event is handled, so
    /// a later photo in the same batch cannot replace it first.
    Photo(MediaRef),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    pub user_id: String,
    pub chat_id: ChatId,
    pub payload: EventPayload,
}

/// Chat transport: delivers inbound events and sends replies.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Waits for the next batch of events (possibly empty).
    async fn poll(&mut self) -> anyhow::Result<Vec<InboundEvent>>;
    /// Downloads `media` to a local file the identifier can read.
    async fn fetch_media(&self, user_id: &str, media: &MediaRef) -> anyhow::Result<ImageRef>;
    async fn send_reply(&self, chat_id: ChatId, text: &str) -> anyhow::Result<()>;
}

pub use telegram::TelegramMessenger;
