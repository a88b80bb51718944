pub mod change;
pub mod models;
pub mod rules;

pub use change::{classify_change, has_changed};
pub use models::{MapScore, MatchState, SeriesScore, Side};
pub use rules::{active_map, ScoringRule};
