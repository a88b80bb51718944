pub mod client;
pub mod parser;
pub mod provider;

pub use client::HltvSource;
pub use provider::{MatchFeed, MatchSource};
