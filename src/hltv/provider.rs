use async_trait::async_trait;

use crate::error::WatchError;
use crate::scoring::{MapScore, MatchState};

/// Opens live match documents. One implementation per scoreboard website.
#[async_trait]
pub trait MatchSource: Send + Sync {
    /// Acquire a live handle on the match page.
    async fn open(&self, match_id: &str) -> Result<Box<dyn MatchFeed>, WatchError>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}

/// A live handle on one match. Must be closed by whoever opened it.
#[async_trait]
pub trait MatchFeed: Send {
    /// Wait for the match to show up and read teams, format and initial maps.
    async fn load_match(&mut self) -> Result<MatchState, WatchError>;

    /// Read the current per-map scores.
    async fn map_scores(&mut self) -> Result<Vec<MapScore>, WatchError>;

    /// Release whatever the handle holds.
    async fn close(self: Box<Self>);
}
