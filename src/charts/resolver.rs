//! Matching a noisy reading to a chart.
//!
//! Solo readings go through a cascade where the first decisive step wins:
//!
//! 1. exact name or alias plus difficulty
//! 2. total note count (and difficulty when known), if exactly one survives
//! 3. caller-supplied candidate names, if exactly one survivor contains one
//! 4. punctuation- and case-insensitive name equality
//! 5. smallest edit distance between the whitespace-stripped names
//!
//! Coop readings share one chart across players, so the name sets matched
//! by each player's note count are intersected instead.

use tracing::{debug, info};

use super::{ChartEntry, Difficulty};
use crate::error::{ScoreError, ScoreResult};

/// What is known about a solo reading.
#[derive(Clone, Copy, Debug, Default)]
pub struct ChartQuery<'a> {
    pub title: Option<&'a str>,
    pub difficulty: Option<Difficulty>,
    pub note_count: Option<u32>,
    /// Candidate song names, matched as substrings of names and aliases
    pub hints: &'a [String],
}

/// Splits a `;`-separated candidate list.
pub fn parse_hints(raw: &str) -> Vec<String> {
    raw.split(';')
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(str::to_string)
        .collect()
}

fn strip_whitespace(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn mentions_hint(chart: &ChartEntry, hints: &[String]) -> bool {
    hints.iter().any(|hint| {
        chart.name.contains(hint.as_str()) || chart.aliases.iter().any(|a| a.contains(hint.as_str()))
    })
}

/// Runs the cascade. Ties on edit distance go to the earlier chart.
pub fn resolve(charts: &[ChartEntry], query: &ChartQuery<'_>) -> ScoreResult<ChartEntry> {
    if let (Some(title), Some(difficulty)) = (query.title, query.difficulty) {
        if let Some(chart) = super::find(charts, title.trim(), difficulty) {
            info!("Chart by name: {} [{}]", chart.name, chart.difficulty);
            return Ok(chart.clone());
        }
    }

    let Some(note_count) = query.note_count else {
        debug!("No exact name match and no note count");
        return Err(ScoreError::ChartNotFound);
    };

    let mut survivors: Vec<&ChartEntry> = charts
        .iter()
        .filter(|c| c.total_notes == note_count)
        .filter(|c| query.difficulty.is_none_or(|d| c.difficulty == d))
        .collect();
    debug!("{} charts with {} notes", survivors.len(), note_count);

    match survivors.as_slice() {
        [] => return Err(ScoreError::ChartNotFound),
        [only] => {
            info!("Chart by note count: {} [{}]", only.name, only.difficulty);
            return Ok((*only).clone());
        }
        _ => {}
    }

    if !query.hints.is_empty() {
        survivors.retain(|c| mentions_hint(c, query.hints));
        debug!("{} charts left after hints", survivors.len());
        match survivors.as_slice() {
            [] => return Err(ScoreError::ChartNotFound),
            [only] => {
                info!("Chart by hint: {} [{}]", only.name, only.difficulty);
                return Ok((*only).clone());
            }
            _ => {}
        }
    }

    let Some(title) = query.title.filter(|t| !t.trim().is_empty()) else {
        debug!("{} candidates and no title to choose with", survivors.len());
        return Err(ScoreError::ChartNotFound);
    };

    let wanted = normalize(title);
    if !wanted.is_empty() {
        if let Some(chart) = survivors
            .iter()
            .find(|c| normalize(&c.name) == wanted || c.aliases.iter().any(|a| normalize(a) == wanted))
        {
            info!("Chart by normalized name: {} [{}]", chart.name, chart.difficulty);
            return Ok((*chart).clone());
        }
    }

    let prepared = strip_whitespace(title);
    let mut best: Option<(&ChartEntry, usize)> = None;
    for &chart in &survivors {
        let distance = strsim::levenshtein(&prepared, &strip_whitespace(&chart.name));
        debug!("distance({:?}, {:?}) = {}", prepared, chart.name, distance);
        if best.is_none_or(|(_, d)| distance < d) {
            best = Some((chart, distance));
        }
    }

    let (chart, distance) = best.ok_or(ScoreError::ChartNotFound)?;
    info!(
        "Chart by edit distance {}: {} [{}]",
        distance, chart.name, chart.difficulty
    );
    Ok(chart.clone())
}

/// The shared chart of a coop match.
#[derive(Clone, Debug, PartialEq)]
pub struct CoopResolution {
    pub song: String,
    /// Per input player: their chart, or `None` when their reading matched nothing
    pub charts: Vec<Option<ChartEntry>>,
}

fn player_matches(chart: &ChartEntry, difficulty: Option<Difficulty>, note_count: u32) -> bool {
    chart.total_notes == note_count && difficulty.is_none_or(|d| chart.difficulty == d)
}

/// Finds the song every player played.
///
/// `players` holds each player's difficulty (if read) and note count.
/// A player whose reading matches no chart is voided and takes no part in
/// the intersection. `hints` must equal a song name exactly here.
pub fn resolve_coop(
    charts: &[ChartEntry],
    players: &[(Option<Difficulty>, u32)],
    hints: &[String],
) -> ScoreResult<CoopResolution> {
    let mut common: Option<Vec<&str>> = None;

    for (index, &(difficulty, note_count)) in players.iter().enumerate() {
        let mut names: Vec<&str> = Vec::new();
        for chart in charts.iter().filter(|c| player_matches(c, difficulty, note_count)) {
            if !names.contains(&chart.name.as_str()) {
                names.push(chart.name.as_str());
            }
        }
        debug!("Player {}: {} candidate songs", index, names.len());

        if names.is_empty() {
            continue;
        }
        common = Some(match common {
            None => names,
            Some(previous) => previous.into_iter().filter(|n| names.contains(n)).collect(),
        });
    }

    let common = common.unwrap_or_default();
    let song = match common.as_slice() {
        [] => return Err(ScoreError::ChartNotFound),
        [only] => *only,
        [first, ..] if hints.is_empty() => *first,
        many => {
            let hinted: Vec<&str> = many
                .iter()
                .copied()
                .filter(|n| hints.iter().any(|h| h == n))
                .collect();
            match hinted.as_slice() {
                [only] => *only,
                _ => {
                    debug!("{} songs remain after hints", hinted.len());
                    return Err(ScoreError::ChartNotFound);
                }
            }
        }
    };
    info!("Coop song: {}", song);

    let resolved = players
        .iter()
        .map(|&(difficulty, note_count)| {
            charts
                .iter()
                .find(|c| c.name == song && player_matches(c, difficulty, note_count))
                .cloned()
        })
        .collect();

    Ok(CoopResolution {
        song: song.to_string(),
        charts: resolved,
    })
}
