use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;

mod app;
mod clock;
mod config;
mod conversation;
mod dispatcher;
mod errors;
mod external;
mod logs;
mod messenger;
mod nutrition;
mod state;

use crate::clock::SystemClock;
use crate::config::AppConfig;
use crate::conversation::{ConversationStateMachine, SessionTable};
use crate::dispatcher::EventDispatcher;
use crate::external::{GeminiIdentifier, UsdaLookup};
use crate::logs::{DailyLogStore, JsonFileStore};
use crate::messenger::TelegramMessenger;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "nutrilog=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = Arc::new(AppConfig::from_env()?);

    let http = reqwest::Client::builder()
        .timeout(config.http_timeout())
        .build()
        .context("build http client")?;
    let identifier = Arc::new(GeminiIdentifier::new(config.gemini.clone(), http.clone()));
    let lookup = Arc::new(UsdaLookup::new(config.usda.clone(), http));
    let clock = Arc::new(SystemClock::with_offset_hours(config.utc_offset_hours)?);

    let backend = Arc::new(JsonFileStore::new(config.data_file.clone()));
    let store = DailyLogStore::open(backend).await;

    let machine = ConversationStateMachine::new(SessionTable::new(), store, identifier, lookup, clock);
    let messenger = TelegramMessenger::new(
        config.telegram.clone(),
        config.media_dir.clone(),
        config.http_timeout(),
    )?;

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            return;
        }
        tracing::info!("shutdown requested");
        let _ = stop_tx.send(true);
    });

    let state = AppState::new(config);
    let server = tokio::spawn(app::serve(
        app::build_app(state.clone()),
        state.config.host.clone(),
        state.config.port,
        stopped(stop_rx.clone()),
    ));

    EventDispatcher::new(messenger, machine)
        .run(stopped(stop_rx))
        .await?;

    match server.await {
        Ok(Err(e)) => tracing::error!(error = %e, "health server failed"),
        Err(e) => tracing::error!(error = %e, "health server task panicked"),
        Ok(Ok(())) => {}
    }
    Ok(())
}

/// Resolves once the stop flag flips or its sender is gone.
async fn stopped(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}
