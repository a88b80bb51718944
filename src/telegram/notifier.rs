use anyhow::Result;
use async_trait::async_trait;

use crate::session::SubscriberKey;

/// Id of a message already posted to a subscriber.
pub type MessageId = i64;

/// Trait that every outgoing chat channel must implement.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Post a new message and return its id.
    async fn send(&self, key: SubscriberKey, text: &str) -> Result<MessageId>;

    /// Replace the text of a message posted earlier.
    async fn edit(&self, key: SubscriberKey, message_id: MessageId, text: &str) -> Result<()>;
}
