//! Telegram Bot API transport over long polling.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use super::dto::{ApiResponse, File, Message, SendMessageRequest, Update};
use super::{ChatId, EventPayload, InboundEvent, MediaRef, Messenger};
use crate::config::TelegramConfig;
use crate::conversation::state::ImageRef;

pub struct TelegramMessenger {
    config: TelegramConfig,
    http: reqwest::Client,
    media_dir: PathBuf,
    offset: i64,
}

impl TelegramMessenger {
    /// `request_timeout` bounds every call on top of the long-poll wait.
    pub fn new(config: TelegramConfig, media_dir: PathBuf, request_timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.poll_timeout_secs) + request_timeout)
            .build()
            .context("build telegram http client")?;
        Ok(Self {
            config,
            http,
            media_dir,
            offset: 0,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.token,
            method
        )
    }

    fn file_url(&self, file_path: &str) -> String {
        format!(
            "{}/file/bot{}/{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.token,
            file_path
        )
    }

    async fn call<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder, method: &str) -> anyhow::Result<T> {
        let response: ApiResponse<T> = request
            .send()
            .await
            .with_context(|| format!("telegram {method}"))?
            .json()
            .await
            .with_context(|| format!("telegram {method} response"))?;
        if !response.ok {
            anyhow::bail!(
                "telegram {method} returned ok=false: {}",
                response.description.unwrap_or_default()
            );
        }
        response
            .result
            .with_context(|| format!("telegram {method} returned no result"))
    }

    async fn get_updates(&self) -> anyhow::Result<Vec<Update>> {
        let request = self.http.get(self.method_url("getUpdates")).query(&[
            ("offset", self.offset.to_string()),
            ("timeout", self.config.poll_timeout_secs.to_string()),
        ]);
        self.call(request, "getUpdates").await
    }

    async fn download(&self, file_id: &str, user_id: &str, ext: &str) -> anyhow::Result<ImageRef> {
        let request = self
            .http
            .get(self.method_url("getFile"))
            .query(&[("file_id", file_id)]);
        let file: File = self.call(request, "getFile").await?;
        let file_path = file
            .file_path
            .with_context(|| format!("file {} has no download path", file.file_id))?;

        let response = self
            .http
            .get(self.file_url(&file_path))
            .send()
            .await
            .context("telegram file download")?
            .error_for_status()
            .context("telegram file download status")?;
        let body = response.bytes().await.context("telegram file body")?;
        self.store_media(user_id, ext, body).await
    }

    /// One file per user; a newer photo overwrites the older one.
    async fn store_media(&self, user_id: &str, ext: &str, body: Bytes) -> anyhow::Result<ImageRef> {
        tokio::fs::create_dir_all(&self.media_dir)
            .await
            .with_context(|| format!("create media dir {}", self.media_dir.display()))?;
        let path = media_path(&self.media_dir, user_id, ext);
        tokio::fs::write(&path, &body)
            .await
            .with_context(|| format!("write {}", path.display()))?;
        debug!(path = %path.display(), bytes = body.len(), "photo stored");
        Ok(ImageRef::new(path))
    }
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn poll(&mut self) -> anyhow::Result<Vec<InboundEvent>> {
        let updates = self.get_updates().await?;
        let mut events = Vec::with_capacity(updates.len());

        for update in updates {
            self.offset = self.offset.max(update.update_id + 1);
            let Some(message) = update.message else {
                continue;
            };
            let Some(from) = message.from.as_ref() else {
                warn!(update_id = update.update_id, "message without sender; ignoring");
                continue;
            };
            let user_id = from.id.to_string();
            let chat_id = message.chat.id;

            let Some(payload) = classify(&message) else {
                debug!(%user_id, "unsupported message kind; ignoring");
                continue;
            };
            events.push(InboundEvent {
                user_id,
                chat_id,
                payload,
            });
        }
        Ok(events)
    }

    async fn fetch_media(&self, user_id: &str, media: &MediaRef) -> anyhow::Result<ImageRef> {
        self.download(&media.file_id, user_id, media.ext).await
    }

    async fn send_reply(&self, chat_id: ChatId, text: &str) -> anyhow::Result<()> {
        let request = self
            .http
            .post(self.method_url("sendMessage"))
            .json(&SendMessageRequest { chat_id, text });
        let _: serde_json::Value = self.call(request, "sendMessage").await?;
        info!(%chat_id, "reply sent");
        Ok(())
    }
}

/// Text, photo (largest size) or an image sent as a document.
pub(crate) fn classify(message: &Message) -> Option<EventPayload> {
    if let Some(largest) = message.photo.as_ref().and_then(|sizes| sizes.last()) {
        return Some(EventPayload::Photo(MediaRef {
            file_id: largest.file_id.clone(),
            ext: "jpg",
        }));
    }
    if let Some(doc) = &message.document {
        let ext = doc.mime_type.as_deref().and_then(ext_from_mime)?;
        return Some(EventPayload::Photo(MediaRef {
            file_id: doc.file_id.clone(),
            ext,
        }));
    }
    message.text.clone().map(EventPayload::Text)
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}

fn media_path(dir: &Path, user_id: &str, ext: &str) -> PathBuf {
    dir.join(format!("tmp_{user_id}.{ext}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(json: &str) -> Message {
        serde_json::from_str(json).expect("valid message json")
    }

    fn messenger(media_dir: PathBuf) -> TelegramMessenger {
        TelegramMessenger::new(
            TelegramConfig {
                token: "123:abc".into(),
                api_base: "https://api.telegram.org/".into(),
                poll_timeout_secs: 30,
            },
            media_dir,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn classifies_text() {
        let m = message(r#"{"chat": {"id": 1}, "from": {"id": 2}, "text": "arroz"}"#);
        assert_eq!(classify(&m), Some(EventPayload::Text("arroz".into())));
    }

    #[test]
    fn picks_the_largest_photo_size() {
        let m = message(
            r#"{"chat": {"id": 1}, "from": {"id": 2}, "caption": "lunch", "photo": [
                {"file_id": "small", "width": 90, "height": 90},
                {"file_id": "big", "width": 1280, "height": 1280}
            ]}"#,
        );
        assert_eq!(
            classify(&m),
            Some(EventPayload::Photo(MediaRef {
                file_id: "big".into(),
                ext: "jpg"
            }))
        );
    }

    #[test]
    fn image_documents_are_photos_other_documents_are_ignored() {
        let png = message(
            r#"{"chat": {"id": 1}, "from": {"id": 2},
                "document": {"file_id": "doc1", "mime_type": "image/png"}}"#,
        );
        assert_eq!(
            classify(&png),
            Some(EventPayload::Photo(MediaRef {
                file_id: "doc1".into(),
                ext: "png"
            }))
        );

        let pdf = message(
            r#"{"chat": {"id": 1}, "from": {"id": 2},
                "document": {"file_id": "doc2", "mime_type": "application/pdf"}}"#,
        );
        assert_eq!(classify(&pdf), None);

        let sticker = message(r#"{"chat": {"id": 1}, "from": {"id": 2}}"#);
        assert_eq!(classify(&sticker), None);
    }

    #[test]
    fn test_ext_from_mime() {
        assert_eq!(ext_from_mime("image/jpeg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/jpg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/webp"), Some("webp"));
        assert_eq!(ext_from_mime("application/octet-stream"), None);
    }

    #[test]
    fn urls_embed_the_token() {
        let m = messenger(PathBuf::from("media"));
        assert_eq!(m.method_url("getUpdates"), "https://api.telegram.org/bot123:abc/getUpdates");
        assert_eq!(
            m.file_url("photos/file_1.jpg"),
            "https://api.telegram.org/file/bot123:abc/photos/file_1.jpg"
        );
    }

    #[tokio::test]
    async fn stored_media_is_one_file_per_user() {
        let dir = tempfile::tempdir().unwrap();
        let m = messenger(dir.path().join("media"));

        let first = m.store_media("42", "jpg", Bytes::from_static(b"first")).await.unwrap();
        let second = m.store_media("42", "jpg", Bytes::from_static(b"second")).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(second.path(), dir.path().join("media").join("tmp_42.jpg"));
        assert_eq!(std::fs::read(second.path()).unwrap(), b"second");
    }
}
