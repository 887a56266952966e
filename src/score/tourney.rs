//! Tourney lobbies: up to five players, scores typed in round by round.
//!
//! A round names one song and gives each player an entry such as
//! `MAS 950/2/0/0/1` or `ex 3/0/1`. Entries that don't parse leave that
//! player without a score for the round. Sessions are kept as JSON files,
//! one per owner, so a lobby survives between invocations.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};

use super::calc::{Calculation, calculate, parse_score};
use crate::charts::{self, ChartEntry, Difficulty};
use crate::error::{ScoreError, ScoreResult};

pub const MAX_PLAYERS: usize = 5;

/// One rated play inside a tourney.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TourneyScore {
    pub song: String,
    pub difficulty: Difficulty,
    pub calculation: Calculation,
}

impl TourneyScore {
    /// Points short of an all-perfect play.
    pub fn to_all_perfect(&self) -> u64 {
        self.calculation.judgements.penalty()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TourneyPlayer {
    pub name: String,
    /// In the order the rounds were entered
    pub scores: Vec<TourneyScore>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TourneySession {
    players: Vec<TourneyPlayer>,
}

impl TourneySession {
    /// Opens a lobby from `;`-separated player names. Blank names are dropped.
    pub fn start(player_names: &str) -> ScoreResult<Self> {
        let slots: Vec<&str> = player_names.split(';').collect();
        if slots.len() > MAX_PLAYERS {
            return Err(ScoreError::InvalidScoreInput(format!(
                "at most {} players, got {}",
                MAX_PLAYERS,
                slots.len()
            )));
        }

        let players: Vec<TourneyPlayer> = slots
            .into_iter()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| TourneyPlayer {
                name: name.to_string(),
                scores: Vec::new(),
            })
            .collect();
        if players.is_empty() {
            return Err(ScoreError::InvalidScoreInput("no player names given".to_string()));
        }

        info!("Tourney started with {} players", players.len());
        Ok(Self { players })
    }

    pub fn players(&self) -> &[TourneyPlayer] {
        &self.players
    }

    /// Adds one round, slot by slot. Returns how many scores were counted.
    pub fn add_scores(&mut self, round: &[Option<TourneyScore>]) -> usize {
        let mut counted = 0;
        for (player, score) in self.players.iter_mut().zip(round) {
            if let Some(score) = score {
                player.scores.push(score.clone());
                counted += 1;
            }
        }
        debug!("Round counted {} of {} scores", counted, round.len());
        counted
    }

    /// Ends the session, handing back every player's results.
    pub fn finish(self) -> Vec<TourneyPlayer> {
        self.players
    }
}

/// Parses one player's entry, `<difficulty> <score>`, against `song`.
///
/// `None` when the entry is malformed, the chart doesn't exist or the
/// score doesn't fit it.
pub fn parse_entry(charts: &[ChartEntry], song: &str, entry: &str) -> Option<TourneyScore> {
    let parts: Vec<&str> = entry.split_whitespace().collect();
    let [difficulty, score] = parts.as_slice() else {
        debug!("Tourney entry {:?} is not '<difficulty> <score>'", entry);
        return None;
    };

    let difficulty = Difficulty::from_prefix(difficulty)?;
    let chart = charts::find(charts, song.trim(), difficulty)?;
    let judgements = parse_score(score, chart.total_notes).ok()?;
    let calculation = calculate(chart.rating_constant, judgements).ok()?;

    Some(TourneyScore {
        song: chart.name.clone(),
        difficulty,
        calculation,
    })
}

/// Parses a round of up to five entries; missing and unparsable entries become `None`.
pub fn parse_round(charts: &[ChartEntry], song: &str, entries: &[Option<String>]) -> Vec<Option<TourneyScore>> {
    entries
        .iter()
        .take(MAX_PLAYERS)
        .map(|entry| entry.as_deref().and_then(|e| parse_entry(charts, song, e)))
        .collect()
}

/// Sessions on disk, one JSON file per owner.
pub struct TourneyStore {
    dir: PathBuf,
}

impl TourneyStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, owner: &str) -> PathBuf {
        let file: String = owner
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", file))
    }

    /// Starts (or restarts) `owner`'s session.
    pub fn start(&self, owner: &str, player_names: &str) -> Result<TourneySession> {
        let session = TourneySession::start(player_names)?;
        self.save(owner, &session)?;
        Ok(session)
    }

    pub fn load(&self, owner: &str) -> Result<Option<TourneySession>> {
        let path = self.path_for(owner);
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let session = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(Some(session))
    }

    fn save(&self, owner: &str, session: &TourneySession) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create {}", self.dir.display()))?;
        let path = self.path_for(owner);
        let json = serde_json::to_string_pretty(session)?;
        fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))
    }

    /// Adds a round to `owner`'s session. Returns how many scores were counted.
    pub fn add_round(&self, owner: &str, round: &[Option<TourneyScore>]) -> Result<usize> {
        let mut session = self
            .load(owner)?
            .ok_or_else(|| ScoreError::NoTourneySession(owner.to_string()))?;
        let counted = session.add_scores(round);
        self.save(owner, &session)?;
        Ok(counted)
    }

    /// Ends `owner`'s session and removes it from disk.
    pub fn finish(&self, owner: &str) -> Result<Vec<TourneyPlayer>> {
        let session = self
            .load(owner)?
            .ok_or_else(|| ScoreError::NoTourneySession(owner.to_string()))?;
        let path = self.path_for(owner);
        fs::remove_file(&path).with_context(|| format!("failed to remove {}", path.display()))?;
        Ok(session.finish())
    }
}
