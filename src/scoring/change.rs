use super::models::MapScore;

/// Kind of difference between two consecutive scoreboard snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapChange {
    /// A new map showed up in the veto list
    MapAdded(String),
    /// A map went from no scores to scores
    MapStarted(String),
    /// Rounds were played on an already started map
    RoundsPlayed { map_name: String, left: u32, right: u32 },
    /// Anything else: maps renamed, removed or reordered, scores going backwards
    Reset,
}

/// True when the map list differs in any way (order, names or scores).
pub fn has_changed(previous: &[MapScore], current: &[MapScore]) -> bool {
    previous != current
}

/// Name the change between two snapshots for logging.
/// Returns `None` when nothing changed.
pub fn classify_change(previous: &[MapScore], current: &[MapScore]) -> Option<MapChange> {
    if !has_changed(previous, current) {
        return None;
    }

    if current.len() > previous.len() && current.starts_with(previous) {
        return Some(MapChange::MapAdded(current[previous.len()].map_name.clone()));
    }

    if current.len() != previous.len() {
        return Some(MapChange::Reset);
    }

    let mut diffs = previous.iter().zip(current).filter(|(p, c)| p != c);
    let (Some((prev, curr)), None) = (diffs.next(), diffs.next()) else {
        return Some(MapChange::Reset);
    };

    if prev.map_name != curr.map_name {
        return Some(MapChange::Reset);
    }

    match (prev.is_started(), curr.left_score, curr.right_score) {
        (false, Some(_), Some(_)) => Some(MapChange::MapStarted(curr.map_name.clone())),
        (true, Some(left), Some(right))
            if prev.left_score <= Some(left) && prev.right_score <= Some(right) =>
        {
            Some(MapChange::RoundsPlayed {
                map_name: curr.map_name.clone(),
                left,
                right,
            })
        }
        _ => Some(MapChange::Reset),
    }
}
