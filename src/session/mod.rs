pub mod controller;
pub mod dispatch;
pub mod registry;
pub mod render;

#[cfg(test)]
mod testing;

pub use controller::{SessionSettings, WatchSession};
pub use dispatch::{Command, Dispatcher};
pub use registry::{SessionInfo, SessionRegistry};

use serde::Serialize;
use std::fmt;

use crate::error::WatchError;

/// Identifies whoever asked for updates (a Telegram chat id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SubscriberKey(pub i64);

impl fmt::Display for SubscriberKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a watch session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Starting,
    Polling,
    Ended,
    Cancelled,
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Ended | SessionState::Cancelled | SessionState::Failed
        )
    }
}

/// How a watch session finished.
#[derive(Debug)]
pub enum SessionOutcome {
    /// The series was clinched
    Ended,
    /// Stopped on request
    Cancelled,
    Failed(WatchError),
}

impl SessionOutcome {
    pub fn state(&self) -> SessionState {
        match self {
            SessionOutcome::Ended => SessionState::Ended,
            SessionOutcome::Cancelled => SessionState::Cancelled,
            SessionOutcome::Failed(_) => SessionState::Failed,
        }
    }
}
