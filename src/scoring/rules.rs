//! Map and series win conditions.
//!
//! A map is won by reaching `min_win_score` rounds with at least `min_margin`
//! rounds to spare. Past regulation the winning total only lands on the end
//! of an overtime period, so `score - min_win_score` must be a multiple of
//! `overtime_period_length`. A series is won by the first side to take
//! `best_of / 2 + 1` maps.

use super::models::{MapScore, MatchState, SeriesScore};

/// Parameters of the per-map win condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringRule {
    /// Rounds needed to close out a map in regulation
    pub min_win_score: u32,
    /// Minimum lead over the opponent at the final round
    pub min_margin: u32,
    /// Rounds per side in one overtime period; 0 disables overtime wins
    pub overtime_period_length: u32,
}

impl ScoringRule {
    /// MR12 with win-by-two and 3-round overtime halves.
    pub const STANDARD: ScoringRule = ScoringRule {
        min_win_score: 13,
        min_margin: 2,
        overtime_period_length: 3,
    };

    /// Superseded rule: scores only need to differ and overtime wins recur every
    /// 4 rounds. Kept selectable for parity with older deployments.
    pub const LEGACY: ScoringRule = ScoringRule {
        min_win_score: 13,
        min_margin: 1,
        overtime_period_length: 4,
    };

    /// Whether `score` is a finished, winning map total against `opponent`.
    ///
    /// A missing score stands in for a non-numeric scoreboard value and never
    /// wins.
    pub fn is_winning_score(&self, score: Option<u32>, opponent: Option<u32>) -> bool {
        let (Some(score), Some(opponent)) = (score, opponent) else {
            return false;
        };

        if score < self.min_win_score {
            return false;
        }

        if i64::from(score) - i64::from(opponent) < i64::from(self.min_margin) {
            return false;
        }

        let overtime = score - self.min_win_score;
        if overtime == 0 {
            return true;
        }

        self.overtime_period_length > 0 && overtime % self.overtime_period_length == 0
    }

    /// Count decided maps per side. Maps that have not started add nothing.
    pub fn series_score(&self, state: &MatchState) -> SeriesScore {
        state
            .maps
            .iter()
            .filter(|m| m.is_started())
            .fold(SeriesScore::default(), |mut acc, m| {
                if self.is_winning_score(m.left_score, m.right_score) {
                    acc.left_wins += 1;
                } else if self.is_winning_score(m.right_score, m.left_score) {
                    acc.right_wins += 1;
                }
                acc
            })
    }

    /// True once either side has clinched the series.
    pub fn is_match_end(&self, state: &MatchState) -> bool {
        let needed = wins_needed(state.best_of);
        let score = self.series_score(state);
        score.left_wins >= needed || score.right_wins >= needed
    }
}

impl Default for ScoringRule {
    fn default() -> Self {
        ScoringRule::STANDARD
    }
}

/// Map wins needed to take a best-of-`best_of` series.
pub fn wins_needed(best_of: u32) -> u32 {
    best_of / 2 + 1
}

/// The most recent map with both scores present.
pub fn active_map(maps: &[MapScore]) -> Option<&MapScore> {
    maps.iter().rev().find(|m| m.is_started())
}
