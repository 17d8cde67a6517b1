use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    pub token: String,
    pub api_base: String,
    pub poll_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UsdaConfig {
    pub api_key: String,
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub telegram: TelegramConfig,
    pub gemini: GeminiConfig,
    pub usda: UsdaConfig,
    pub data_file: PathBuf,
    pub media_dir: PathBuf,
    pub http_timeout_secs: u64,
    pub utc_offset_hours: i8,
    pub host: String,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            telegram: TelegramConfig {
                token: required("TELEGRAM_BOT_TOKEN")?,
                api_base: optional("TELEGRAM_API_BASE", "https://api.telegram.org"),
                poll_timeout_secs: parsed("TELEGRAM_POLL_TIMEOUT_SECS", 30)?,
            },
            gemini: GeminiConfig {
                api_key: required("GEMINI_API_KEY")?,
                base_url: optional(
                    "GEMINI_BASE_URL",
                    "https://generativelanguage.googleapis.com/v1beta",
                ),
                model: optional("GEMINI_MODEL", "gemini-1.5-flash"),
            },
            usda: UsdaConfig {
                api_key: required("USDA_API_KEY")?,
                base_url: optional("USDA_BASE_URL", "https://api.nal.usda.gov/fdc/v1"),
            },
            data_file: optional("DATA_FILE", "data.json").into(),
            media_dir: optional("MEDIA_DIR", "media").into(),
            http_timeout_secs: parsed("HTTP_TIMEOUT_SECS", 30)?,
            utc_offset_hours: parsed("BOT_UTC_OFFSET_HOURS", 0)?,
            host: optional("APP_HOST", "0.0.0.0"),
            port: parsed("APP_PORT", 8080)?,
        })
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

fn required(key: &str) -> anyhow::Result<String> {
    std::env::var(key).with_context(|| format!("missing required env var {key}"))
}

fn optional(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

fn parsed<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("invalid value for {key}: {raw:?}")),
        Err(_) => Ok(default),
    }
}
