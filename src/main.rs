use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

mod config;
mod dashboard;
mod error;
mod hltv;
mod scoring;
mod session;
mod telegram;

use config::{Config, RuleKind};
use dashboard::AppState;
use hltv::{HltvSource, MatchSource};
use session::{Dispatcher, SessionRegistry};
use telegram::{Notifier, TelegramClient};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    let settings = config.session_settings();
    if config.scoring_rule == RuleKind::Legacy {
        warn!(
            "Legacy scoring rule selected ({:?}); it disagrees with the standard rule on \
             one-round leads and overtime totals",
            settings.rule
        );
    }
    info!(
        "Polling every {:?}, giving up after {} failed polls, scoring rule: {}",
        settings.poll_interval,
        settings.max_consecutive_failures,
        config.scoring_rule.name()
    );

    let source: Arc<dyn MatchSource> = Arc::new(HltvSource::new(
        &config.hltv_base_url,
        config.http_timeout(),
        config.lookup_timeout(),
    )?);
    let telegram = TelegramClient::new(
        &config.telegram_api_url,
        &config.telegram_bot_token,
        config.http_timeout(),
    )?;
    let notifier: Arc<dyn Notifier> = Arc::new(telegram.clone());

    let registry = SessionRegistry::new();
    let shutdown = CancellationToken::new();

    // Optional status dashboard
    if let Some(addr) = &config.status_addr {
        let addr: SocketAddr = addr.parse()?;
        let app = dashboard::router(AppState {
            registry: registry.clone(),
            scoring_rule: config.scoring_rule.name().to_string(),
        });
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("Status dashboard listening on http://{}", addr);

        let dashboard_shutdown = shutdown.clone();
        tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async move { dashboard_shutdown.cancelled().await })
                .await;
            if let Err(e) = served {
                error!("Status dashboard stopped: {}", e);
            }
        });
    }

    let (tx, rx) = mpsc::channel(64);
    let commands = tokio::spawn(telegram::run_command_source(telegram, tx, shutdown.clone()));

    let dispatcher = Dispatcher::new(registry, source, notifier, settings);
    let dispatch = tokio::spawn(dispatcher.run(rx, shutdown.clone()));

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    shutdown.cancel();

    if let Err(e) = dispatch.await {
        error!("Dispatcher task failed: {}", e);
    }
    if let Err(e) = commands.await {
        error!("Command source task failed: {}", e);
    }

    info!("Bye");
    Ok(())
}
