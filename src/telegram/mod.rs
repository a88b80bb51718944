pub mod client;
pub mod commands;
pub mod models;
pub mod notifier;

pub use client::TelegramClient;
pub use commands::run_command_source;
pub use notifier::{MessageId, Notifier};
