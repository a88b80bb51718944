use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use super::models::{ApiResponse, Message, Update};
use super::notifier::{MessageId, Notifier};
use crate::session::SubscriberKey;

/// Thin client for the Telegram Bot HTTP API.
#[derive(Clone)]
pub struct TelegramClient {
    http: Client,
    api_url: String,
    token: String,
}

impl TelegramClient {
    pub fn new(api_url: &str, token: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(TelegramClient {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_url, self.token, method)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &serde_json::Value,
        timeout: Option<Duration>,
    ) -> Result<T> {
        // The URL embeds the bot token, so only the method name is logged.
        debug!("Telegram call {}", method);

        let mut req = self.http.post(self.method_url(method)).json(body);
        if let Some(t) = timeout {
            req = req.timeout(t);
        }
        let resp = req
            .send()
            .await
            .with_context(|| format!("Telegram {} request failed", method))?;

        let status = resp.status();
        let parsed: ApiResponse<T> = resp
            .json()
            .await
            .with_context(|| format!("Failed to parse Telegram {} response ({})", method, status))?;

        unwrap_response(method, parsed)
    }

    /// Long-poll for new updates after `offset`.
    pub async fn get_updates(&self, offset: i64, poll_timeout: Duration) -> Result<Vec<Update>> {
        let body = serde_json::json!({
            "offset": offset,
            "timeout": poll_timeout.as_secs(),
            "allowed_updates": ["message"],
        });
        // Leave headroom over the server-side long-poll window.
        let http_timeout = poll_timeout + Duration::from_secs(10);
        self.call("getUpdates", &body, Some(http_timeout)).await
    }
}

fn unwrap_response<T>(method: &str, resp: ApiResponse<T>) -> Result<T> {
    if !resp.ok {
        anyhow::bail!(
            "Telegram {} failed ({}): {}",
            method,
            resp.error_code.unwrap_or_default(),
            resp.description.unwrap_or_default()
        );
    }
    resp.result
        .with_context(|| format!("Telegram {} returned no result", method))
}

/// Telegram answers an edit with identical text with an error; that is not a
/// real failure for us.
fn is_not_modified(err: &anyhow::Error) -> bool {
    err.to_string().contains("message is not modified")
}

#[async_trait]
impl Notifier for TelegramClient {
    async fn send(&self, key: SubscriberKey, text: &str) -> Result<MessageId> {
        let body = serde_json::json!({
            "chat_id": key.0,
            "text": text,
        });
        let msg: Message = self.call("sendMessage", &body, None).await?;
        Ok(msg.message_id)
    }

    async fn edit(&self, key: SubscriberKey, message_id: MessageId, text: &str) -> Result<()> {
        let body = serde_json::json!({
            "chat_id": key.0,
            "message_id": message_id,
            "text": text,
        });
        match self
            .call::<serde_json::Value>("editMessageText", &body, None)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_not_modified(&e) => {
                debug!("Edit of message {} in {} was a no-op", message_id, key);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
