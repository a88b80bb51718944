use thiserror::Error;

/// Failures a watch session can run into while talking to its collaborators.
#[derive(Debug, Error)]
pub enum WatchError {
    /// Match, page or element absent within the lookup timeout
    #[error("not found: {0}")]
    NotFound(String),

    /// Expected text field missing or non-numeric
    #[error("could not parse: {0}")]
    ParseFailure(String),

    /// Cooperative cancellation observed; not a real failure
    #[error("session terminated")]
    Terminated,

    /// Network or upstream HTTP error
    #[error("transport error: {0}")]
    Transport(String),
}

impl WatchError {
    /// Whether a steady-state poll may skip this tick and try again.
    pub fn is_transient(&self) -> bool {
        matches!(self, WatchError::ParseFailure(_) | WatchError::Transport(_))
    }
}

impl From<reqwest::Error> for WatchError {
    fn from(e: reqwest::Error) -> Self {
        WatchError::Transport(e.to_string())
    }
}
