use crate::scoring::{MapScore, MatchState, SeriesScore, Side};

pub const LOADING: &str = "Loading a new game...";
pub const NOT_FOUND: &str = "Match not found.";
pub const STOPPED: &str = "Game stopped.";
pub const LOST_TRACK: &str = "Lost track of the match, stopping.";

const SEPARATOR: &str = "------------------------------";

/// Series header, e.g. `Natus Vincere 1 : 0 Vitality (BO3)`.
pub fn render_match(state: &MatchState, score: &SeriesScore) -> String {
    format!(
        "{} {} : {} {} (BO{})",
        state.left_team, score.left_wins, score.right_wins, state.right_team, state.best_of
    )
}

/// Current map line, e.g. `Mirage: 7 : 4`.
pub fn render_map(map: &MapScore) -> String {
    format!(
        "{}: {} : {}",
        map.map_name,
        map.left_score.map_or_else(|| "-".to_string(), |s| s.to_string()),
        map.right_score.map_or_else(|| "-".to_string(), |s| s.to_string()),
    )
}

/// Body of the tracked message while a map is live.
pub fn render_update(state: &MatchState, score: &SeriesScore, map: &MapScore) -> String {
    format!(
        "{}\n{}\n{}",
        render_match(state, score),
        SEPARATOR,
        render_map(map)
    )
}

pub fn render_ended(state: &MatchState, score: &SeriesScore) -> String {
    let winner = match score.leader() {
        Some(Side::Left) => &state.left_team,
        Some(Side::Right) => &state.right_team,
        None => return "Game ended.".to_string(),
    };
    format!(
        "Game ended. {} wins {}:{}.",
        winner,
        score.left_wins.max(score.right_wins),
        score.left_wins.min(score.right_wins)
    )
}
