use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::controller::{SessionSettings, WatchSession};
use super::registry::SessionRegistry;
use super::render;
use super::SubscriberKey;
use crate::hltv::MatchSource;
use crate::telegram::Notifier;

/// Requests coming in from the chat side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Watch { key: SubscriberKey, match_id: String },
    Stop { key: SubscriberKey },
}

/// Single consumer of the command queue. Commands are handled one at a time
/// and in arrival order.
pub struct Dispatcher {
    registry: SessionRegistry,
    source: Arc<dyn MatchSource>,
    notifier: Arc<dyn Notifier>,
    settings: SessionSettings,
}

impl Dispatcher {
    pub fn new(
        registry: SessionRegistry,
        source: Arc<dyn MatchSource>,
        notifier: Arc<dyn Notifier>,
        settings: SessionSettings,
    ) -> Self {
        Dispatcher {
            registry,
            source,
            notifier,
            settings,
        }
    }

    /// Consume commands until the channel closes or `shutdown` fires, then
    /// stop every session.
    pub async fn run(self, mut rx: mpsc::Receiver<Command>, shutdown: CancellationToken) {
        info!("Dispatcher started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                cmd = rx.recv() => match cmd {
                    Some(cmd) => self.handle(cmd).await,
                    None => break,
                },
            }
        }
        self.registry.shutdown().await;
        info!("Dispatcher stopped");
    }

    pub async fn handle(&self, cmd: Command) {
        match cmd {
            Command::Watch { key, match_id } => {
                if self.registry.is_active(key) {
                    info!("Chat {} switches to match {}", key, match_id);
                } else {
                    info!("Watch request for match {} from chat {}", match_id, key);
                }
                let source = Arc::clone(&self.source);
                let notifier = Arc::clone(&self.notifier);
                let settings = self.settings;
                let id = match_id.clone();
                self.registry
                    .start(key, &match_id, move |control| {
                        WatchSession::new(key, &id, source, notifier, settings, control).run()
                    })
                    .await;
            }
            Command::Stop { key } => {
                if !self.registry.stop(key).await {
                    info!("Stop request from chat {} with nothing running", key);
                }
                if let Err(e) = self.notifier.send(key, render::STOPPED).await {
                    warn!("Failed to confirm stop in chat {}: {:#}", key, e);
                }
            }
        }
    }
}
