//! Scraping helpers for the HLTV match page.
//!
//! Only a handful of leaf elements are needed, so this works on the raw
//! markup with string scanning instead of a DOM:
//!
//! ```text
//! .teamName               ×2   left / right team
//! .preformatted-text            "Best of 3 (LAN) ..."
//! .mapholder              ×N   one block per map
//!   .mapname                    map name ("TBA" before the veto)
//!   .results-team-score   ×2   rounds, "-" before the map starts
//! ```

use crate::error::WatchError;
use crate::scoring::{MapScore, MatchState};

/// Marker that only exists once the match page has rendered its header.
pub const MATCH_CONTAINER_CLASS: &str = "teamsBox";

const TEAM_NAME_CLASS: &str = "teamName";
const FORMAT_CLASS: &str = "preformatted-text";
const MAP_HOLDER_CLASS: &str = "mapholder";
const MAP_NAME_CLASS: &str = "mapname";
const MAP_SCORE_CLASS: &str = "results-team-score";

/// Whether the page already contains the match header.
pub fn has_match_container(html: &str) -> bool {
    find_class(html, MATCH_CONTAINER_CLASS, 0).is_some()
}

/// Parse teams, series format and maps from a match page.
pub fn parse_match(html: &str) -> Result<MatchState, WatchError> {
    let teams = texts_of_class(html, TEAM_NAME_CLASS);
    let (left_team, right_team) = match teams.as_slice() {
        [left, right, ..] if !left.is_empty() && !right.is_empty() => {
            (left.clone(), right.clone())
        }
        _ => return Err(WatchError::ParseFailure("team names not found".into())),
    };

    let format = text_of_class(html, FORMAT_CLASS, 0)
        .ok_or_else(|| WatchError::ParseFailure("series format not found".into()))?;
    let best_of = parse_best_of(&format)?;

    let maps = parse_maps(html)?;
    Ok(MatchState::new(best_of, left_team, right_team, maps))
}

/// Parse the per-map scores from a match page.
pub fn parse_maps(html: &str) -> Result<Vec<MapScore>, WatchError> {
    let mut starts = Vec::new();
    let mut from = 0;
    while let Some(pos) = find_class(html, MAP_HOLDER_CLASS, from) {
        starts.push(pos);
        from = end_of_open_tag(html, pos);
    }

    if starts.is_empty() {
        return Err(WatchError::ParseFailure("no map holders on page".into()));
    }

    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = starts.get(i + 1).copied().unwrap_or(html.len());
            parse_map_block(&html[start..end])
        })
        .collect()
}

fn parse_map_block(block: &str) -> Result<MapScore, WatchError> {
    let map_name = text_of_class(block, MAP_NAME_CLASS, 0)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| WatchError::ParseFailure("map name not found".into()))?;

    let scores = texts_of_class(block, MAP_SCORE_CLASS);
    let (left, right) = match scores.as_slice() {
        [] => (None, None),
        [left, right, ..] => (parse_score(left)?, parse_score(right)?),
        [_] => {
            return Err(WatchError::ParseFailure(format!(
                "only one score listed for {}",
                map_name
            )))
        }
    };

    match (left, right) {
        (Some(l), Some(r)) => Ok(MapScore::played(map_name, l, r)),
        (None, None) => Ok(MapScore::not_started(map_name)),
        _ => Err(WatchError::ParseFailure(format!(
            "half-filled score for {}",
            map_name
        ))),
    }
}

fn parse_score(text: &str) -> Result<Option<u32>, WatchError> {
    let text = text.trim();
    if text.is_empty() || text == "-" {
        return Ok(None);
    }
    text.parse::<u32>()
        .map(Some)
        .map_err(|_| WatchError::ParseFailure(format!("non-numeric score '{}'", text)))
}

fn parse_best_of(format: &str) -> Result<u32, WatchError> {
    let lower = format.to_lowercase();
    let rest = lower
        .find("best of")
        .map(|i| &lower[i + "best of".len()..])
        .ok_or_else(|| WatchError::ParseFailure(format!("no 'Best of' in '{}'", format)))?;

    let digits: String = rest
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();

    // Even series (bo2) can finish level and never produce a winner.
    match digits.parse::<u32>() {
        Ok(n) if n % 2 == 1 => Ok(n),
        _ => Err(WatchError::ParseFailure(format!("bad series length in '{}'", format))),
    }
}

// ── Markup scanning ─────────────────────────────────────────────────────────

/// Byte offset of the `<` opening the first element at or after `from` whose
/// class list contains `class`.
fn find_class(html: &str, class: &str, from: usize) -> Option<usize> {
    const ATTR: &str = "class=\"";
    let mut cursor = from;
    loop {
        let attr = html.get(cursor..)?.find(ATTR)? + cursor;
        let value_start = attr + ATTR.len();
        let value_end = html[value_start..].find('"')? + value_start;
        if html[value_start..value_end]
            .split_whitespace()
            .any(|c| c == class)
        {
            return html[..attr].rfind('<');
        }
        cursor = value_end + 1;
    }
}

/// Offset just past the `>` of the tag opening at `start`.
fn end_of_open_tag(html: &str, start: usize) -> usize {
    html[start..].find('>').map_or(html.len(), |i| start + i + 1)
}

/// Text directly inside the first element with `class`, trimmed and unescaped.
fn text_of_class(html: &str, class: &str, from: usize) -> Option<String> {
    let start = find_class(html, class, from)?;
    let open_end = end_of_open_tag(html, start);
    let close = html[open_end..].find('<').map_or(html.len(), |i| i + open_end);
    Some(unescape(html[open_end..close].trim()))
}

fn texts_of_class(html: &str, class: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut from = 0;
    while let Some(start) = find_class(html, class, from) {
        if let Some(text) = text_of_class(html, class, start) {
            out.push(text);
        }
        from = end_of_open_tag(html, start);
    }
    out
}

fn unescape(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}
