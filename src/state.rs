use std::sync::Arc;

use time::OffsetDateTime;

use crate::config::AppConfig;

/// Shared by the HTTP side of the process.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub started_at: OffsetDateTime,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self {
            config,
            started_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn uptime_secs(&self) -> i64 {
        (OffsetDateTime::now_utc() - self.started_at).whole_seconds().max(0)
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        use crate::config::{GeminiConfig, TelegramConfig, UsdaConfig};

        let config = Arc::new(AppConfig {
            telegram: TelegramConfig {
                token: "test".into(),
                api_base: "http://telegram.local".into(),
                poll_timeout_secs: 1,
            },
            gemini: GeminiConfig {
                api_key: "test".into(),
                base_url: "http://gemini.local".into(),
                model: "test".into(),
            },
            usda: UsdaConfig {
                api_key: "test".into(),
                base_url: "http://usda.local".into(),
            },
            data_file: "data.json".into(),
            media_dir: "media".into(),
            http_timeout_secs: 5,
            utc_offset_hours: 0,
            host: "127.0.0.1".into(),
            port: 0,
        });
        Self::new(config)
    }
}
