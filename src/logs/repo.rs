use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, error, warn};

use super::repo_types::LogBook;
use crate::errors::BotError;

/// Durable home of the log book. Always read and written whole.
#[async_trait]
pub trait StoreBackend: Send + Sync {
    /// Never fails: a missing or unreadable state yields an empty book.
    async fn load(&self) -> LogBook;
    /// Replaces the persisted state with `book` atomically.
    async fn save(&self, book: &LogBook) -> Result<(), BotError>;
}

/// Pretty-printed JSON file, rewritten through a sibling temp file + rename.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "data.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl StoreBackend for JsonFileStore {
    async fn load(&self) -> LogBook {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no saved state; starting empty");
                return LogBook::default();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "state file unreadable; starting empty");
                return LogBook::default();
            }
        };
        match serde_json::from_slice::<LogBook>(&raw) {
            Ok(book) => {
                debug!(path = %self.path.display(), users = book.user_count(), "state loaded");
                book
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "state file malformed; starting empty");
                LogBook::default()
            }
        }
    }

    async fn save(&self, book: &LogBook) -> Result<(), BotError> {
        let body = serde_json::to_vec_pretty(book).map_err(std::io::Error::other)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.temp_path();
        let written: std::io::Result<()> = async {
            tokio::fs::write(&tmp, &body).await?;
            tokio::fs::rename(&tmp, &self.path).await
        }
        .await;
        if let Err(e) = written {
            error!(path = %self.path.display(), error = %e, "state save failed");
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        debug!(path = %self.path.display(), bytes = body.len(), "state saved");
        Ok(())
    }
}

/// In-memory backend for tests; can be told to fail every save.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct MemoryStore {
    pub saved: std::sync::Mutex<Option<LogBook>>,
    pub saves: std::sync::atomic::AtomicUsize,
    pub fail_saves: std::sync::atomic::AtomicBool,
}

#[cfg(test)]
impl MemoryStore {
    pub fn with(book: LogBook) -> Self {
        let store = Self::default();
        *store.saved.lock().unwrap() = Some(book);
        store
    }

    pub fn snapshot(&self) -> Option<LogBook> {
        self.saved.lock().unwrap().clone()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
#[async_trait]
impl StoreBackend for MemoryStore {
    async fn load(&self) -> LogBook {
        self.snapshot().unwrap_or_default()
    }

    async fn save(&self, book: &LogBook) -> Result<(), BotError> {
        use std::sync::atomic::Ordering;
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(std::io::Error::other("simulated write failure").into());
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        *self.saved.lock().unwrap() = Some(book.clone());
        Ok(())
    }
}
