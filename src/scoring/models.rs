use tracing::warn;

/// One map of a series as scraped from the scoreboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapScore {
    pub map_name: String,
    /// Rounds won by the left team; `None` until the map starts
    pub left_score: Option<u32>,
    /// Rounds won by the right team; `None` until the map starts
    pub right_score: Option<u32>,
}

impl MapScore {
    pub fn played(map_name: impl Into<String>, left: u32, right: u32) -> Self {
        MapScore {
            map_name: map_name.into(),
            left_score: Some(left),
            right_score: Some(right),
        }
    }

    pub fn not_started(map_name: impl Into<String>) -> Self {
        MapScore {
            map_name: map_name.into(),
            left_score: None,
            right_score: None,
        }
    }

    /// Both scores are known, i.e. the map is in progress or finished.
    pub fn is_started(&self) -> bool {
        self.left_score.is_some() && self.right_score.is_some()
    }
}

/// Full state of a best-of-N series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchState {
    pub best_of: u32,
    pub left_team: String,
    pub right_team: String,
    pub maps: Vec<MapScore>,
}

impl MatchState {
    pub fn new(
        best_of: u32,
        left_team: impl Into<String>,
        right_team: impl Into<String>,
        maps: Vec<MapScore>,
    ) -> Self {
        let mut state = MatchState {
            best_of,
            left_team: left_team.into(),
            right_team: right_team.into(),
            maps: Vec::new(),
        };
        state.set_maps(maps);
        state
    }

    /// Replace the map list, dropping anything past `best_of` entries.
    pub fn set_maps(&mut self, mut maps: Vec<MapScore>) {
        let limit = self.best_of as usize;
        if maps.len() > limit {
            warn!(
                "Scoreboard listed {} maps for a best-of-{}, ignoring the extra ones",
                maps.len(),
                self.best_of
            );
            maps.truncate(limit);
        }
        self.maps = maps;
    }
}

/// Aggregate map wins per side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeriesScore {
    pub left_wins: u32,
    pub right_wins: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl SeriesScore {
    /// The side currently ahead, if any.
    pub fn leader(&self) -> Option<Side> {
        match self.left_wins.cmp(&self.right_wins) {
            std::cmp::Ordering::Greater => Some(Side::Left),
            std::cmp::Ordering::Less => Some(Side::Right),
            std::cmp::Ordering::Equal => None,
        }
    }
}
