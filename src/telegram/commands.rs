//! Command source: turns Telegram chat messages into dispatcher commands.

use rand::Rng;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::client::TelegramClient;
use super::models::Update;
use crate::session::{Command, SubscriberKey};

const LONG_POLL: Duration = Duration::from_secs(30);

/// Extract a command from a chat message. Accepts `/watch <matchId>` and
/// `/stop`, optionally addressed as `/watch@SomeBot`.
pub fn parse_command(key: SubscriberKey, text: &str) -> Option<Command> {
    let mut parts = text.split_whitespace();
    let head = parts.next()?;
    let name = head.strip_prefix('/')?;
    let name = name.split('@').next().unwrap_or(name);

    match name {
        "watch" => {
            let match_id = parts.next()?.to_string();
            Some(Command::Watch { key, match_id })
        }
        "stop" => Some(Command::Stop { key }),
        _ => None,
    }
}

fn commands_from_updates(updates: &[Update]) -> Vec<Command> {
    updates
        .iter()
        .filter_map(|u| {
            let msg = u.message.as_ref()?;
            let text = msg.text.as_deref()?;
            parse_command(SubscriberKey(msg.chat.id), text)
        })
        .collect()
}

/// Long-poll `getUpdates` and forward every recognised command until
/// cancelled or the dispatcher goes away. Failures back off exponentially
/// with jitter.
pub async fn run_command_source(
    client: TelegramClient,
    tx: mpsc::Sender<Command>,
    cancel: CancellationToken,
) {
    let mut offset = 0i64;
    let mut backoff_secs = 1u64;
    let max_backoff = 30u64;

    info!("Command source started");

    loop {
        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            r = client.get_updates(offset, LONG_POLL) => r,
        };

        match result {
            Ok(updates) => {
                backoff_secs = 1;
                if let Some(last) = updates.iter().map(|u| u.update_id).max() {
                    offset = last + 1;
                }
                for cmd in commands_from_updates(&updates) {
                    debug!("Received command {:?}", cmd);
                    if tx.send(cmd).await.is_err() {
                        warn!("Dispatcher channel closed, stopping command source");
                        return;
                    }
                }
            }
            Err(e) => {
                let jitter_ms = rand::thread_rng().gen_range(0..500);
                let delay = Duration::from_secs(backoff_secs) + Duration::from_millis(jitter_ms);
                warn!("getUpdates failed: {:#}. Retrying in {:?}", e, delay);
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
                backoff_secs = (backoff_secs * 2).min(max_backoff);
            }
        }
    }

    info!("Command source stopped");
}
