//! The chart database: entries, where they come from, and how a reading is matched to one.

pub mod resolver;
pub mod sheets;

pub use resolver::{ChartQuery, CoopResolution, parse_hints, resolve, resolve_coop};
pub use sheets::{SheetCharts, SheetsApi, parse_assignment};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Normal,
    Hard,
    Expert,
    Master,
    Append,
}

impl Difficulty {
    /// Difficulties that carry a rating constant.
    pub const RATED: [Difficulty; 4] = [
        Difficulty::Hard,
        Difficulty::Expert,
        Difficulty::Master,
        Difficulty::Append,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Normal => "Normal",
            Difficulty::Hard => "Hard",
            Difficulty::Expert => "Expert",
            Difficulty::Master => "Master",
            Difficulty::Append => "Append",
        }
    }

    /// Resolves an abbreviation such as `mas`, `ex`, `h` or `hrd`.
    pub fn from_prefix(abbrev: &str) -> Option<Self> {
        let abbrev = abbrev.trim().to_lowercase();
        if abbrev.is_empty() {
            return None;
        }
        if abbrev == "hrd" {
            return Some(Difficulty::Hard);
        }
        [
            Difficulty::Master,
            Difficulty::Expert,
            Difficulty::Hard,
            Difficulty::Append,
        ]
        .into_iter()
        .find(|d| d.label().to_lowercase().starts_with(&abbrev))
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Difficulty {
    type Err = String;

    /// Full name, any case.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        [
            Difficulty::Easy,
            Difficulty::Normal,
            Difficulty::Hard,
            Difficulty::Expert,
            Difficulty::Master,
            Difficulty::Append,
        ]
        .into_iter()
        .find(|d| d.label().to_lowercase() == lower)
        .ok_or_else(|| format!("unknown difficulty: {}", s.trim()))
    }
}

/// One song at one difficulty.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChartEntry {
    pub name: String,
    pub difficulty: Difficulty,
    pub rating_constant: f64,
    pub total_notes: u32,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl ChartEntry {
    /// Exact match on the name or any alias.
    pub fn is_named(&self, name: &str) -> bool {
        self.name == name || self.aliases.iter().any(|a| a == name)
    }
}

/// Supplies chart snapshots. Each call's result is fixed for the request that asked.
pub trait ChartSource: Send + Sync {
    /// Charts for `server`, or for the default server when `None` or unknown.
    fn charts(&self, server: Option<&str>) -> Arc<[ChartEntry]>;

    /// Song names of the assignment currently running on `server`, used as
    /// candidate names when a reading comes without any.
    fn assignment(&self, _server: Option<&str>) -> Vec<String> {
        Vec::new()
    }
}

/// A fixed chart list, e.g. loaded from a JSON file.
#[derive(Clone, Debug)]
pub struct StaticCharts {
    charts: Arc<[ChartEntry]>,
}

impl StaticCharts {
    pub fn new(charts: Vec<ChartEntry>) -> Self {
        Self {
            charts: charts.into(),
        }
    }

    /// Reads a JSON array of chart entries.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let charts: Vec<ChartEntry> = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        info!("Loaded {} charts from {}", charts.len(), path.display());
        Ok(Self::new(charts))
    }
}

impl ChartSource for StaticCharts {
    fn charts(&self, _server: Option<&str>) -> Arc<[ChartEntry]> {
        Arc::clone(&self.charts)
    }
}

/// Distinct song names and aliases, in first-seen order.
pub fn song_names(charts: &[ChartEntry]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let all = charts
        .iter()
        .map(|c| &c.name)
        .chain(charts.iter().flat_map(|c| c.aliases.iter()));
    for name in all {
        if !names.contains(name) {
            names.push(name.clone());
        }
    }
    names
}

/// Names containing `query` (case-insensitive), or `None` when more than `limit` match.
pub fn search_names(charts: &[ChartEntry], query: &str, limit: usize) -> Option<Vec<String>> {
    let query = query.to_lowercase();
    let matches: Vec<String> = song_names(charts)
        .into_iter()
        .filter(|name| name.to_lowercase().contains(&query))
        .collect();
    (matches.len() <= limit).then_some(matches)
}

pub fn difficulties() -> [Difficulty; 4] {
    Difficulty::RATED
}

/// All difficulties of the song called `name` (or aliased so).
pub fn find_by_name<'a>(charts: &'a [ChartEntry], name: &str) -> Vec<&'a ChartEntry> {
    charts.iter().filter(|c| c.is_named(name)).collect()
}

pub fn find<'a>(charts: &'a [ChartEntry], name: &str, difficulty: Difficulty) -> Option<&'a ChartEntry> {
    charts
        .iter()
        .find(|c| c.difficulty == difficulty && c.is_named(name))
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_difficulty_prefix() {
        assert_eq!(Difficulty::from_prefix("mas"), Some(Difficulty::Master));
        assert_eq!(Difficulty::from_prefix("M"), Some(Difficulty::Master));
        assert_eq!(Difficulty::from_prefix("ex"), Some(Difficulty::Expert));
        assert_eq!(Difficulty::from_prefix("h"), Some(Difficulty::Hard));
        assert_eq!(Difficulty::from_prefix("hrd"), Some(Difficulty::Hard));
        assert_eq!(Difficulty::from_prefix("app"), Some(Difficulty::Append));
        assert_eq!(Difficulty::from_prefix(""), None);
        assert_eq!(Difficulty::from_prefix("maxx"), None);
    }

    #[test]
    fn test_difficulty_from_str() {
        assert_eq!("EXPERT".parse::<Difficulty>(), Ok(Difficulty::Expert));
        assert_eq!(" master ".parse::<Difficulty>(), Ok(Difficulty::Master));
        assert!("mas".parse::<Difficulty>().is_err());
    }

    #[test]
    fn test_song_names_dedup_with_aliases() {
        let names = song_names(&catalogue());
        assert_eq!(names.iter().filter(|n| *n == "Tell Your World").count(), 1);
        assert!(names.contains(&"TYW".to_string()));
        assert_eq!(names.iter().filter(|n| *n == "ロキ").count(), 1);
    }

    #[test]
    fn test_search_names_limit() {
        let charts = catalogue();
        assert_eq!(search_names(&charts, "verd", 25), Some(vec!["Verd ele".to_string()]));
        assert_eq!(search_names(&charts, "", 3), None);
    }

    #[test]
    fn test_find_by_alias() {
        let charts = catalogue();
        let found = find(&charts, "TYW", Difficulty::Master).unwrap();
        assert_eq!(found.total_notes, 804);
        assert!(find(&charts, "TYW", Difficulty::Expert).is_none());
        assert_eq!(find_by_name(&charts, "ロキ").len(), 2);
    }

    #[test]
    fn test_static_charts_from_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("charts.json");
        std::fs::write(
            &path,
            r#"[{ "name": "Hibana", "difficulty": "Master", "rating_constant": 31.5, "total_notes": 1021 }]"#,
        )
        .unwrap();

        let source = StaticCharts::load(&path).unwrap();
        let charts = source.charts(Some("any"));
        assert_eq!(charts.len(), 1);
        assert!(charts[0].aliases.is_empty());
        assert_eq!(charts[0].difficulty, Difficulty::Master);
    }
}
