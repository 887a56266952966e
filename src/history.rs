//! Score history CSV.
//!
//! One row per scored play, appended with a fresh open for every write so
//! completed rows survive a crash mid-run.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use crate::charts::Difficulty;
use crate::score::{Calculation, ResolvedScore};

const CSV_HEADER: &str =
    "timestamp,player,chart,difficulty,perfect,great,good,bad,miss,constant,delta,rating,accuracy";

/// One history row.
#[derive(Clone, Debug, PartialEq)]
pub struct HistoryRecord {
    pub timestamp: DateTime<Local>,
    pub player: String,
    pub chart: String,
    pub difficulty: Option<Difficulty>,
    pub calculation: Calculation,
}

impl HistoryRecord {
    pub fn new(player: &str, chart: &str, difficulty: Option<Difficulty>, calculation: &Calculation) -> Self {
        Self {
            timestamp: Local::now(),
            player: player.to_string(),
            chart: chart.to_string(),
            difficulty,
            calculation: calculation.clone(),
        }
    }

    pub fn resolved(player: &str, resolved: &ResolvedScore) -> Self {
        Self::new(
            player,
            &resolved.chart.name,
            Some(resolved.chart.difficulty),
            &resolved.score,
        )
    }

    fn to_row(&self) -> String {
        let calc = &self.calculation;
        let j = &calc.judgements;
        format!(
            "{},{},{},{},{},{},{},{},{},{:.1},{:.2},{:.2},{:.4}",
            self.timestamp.format("%Y-%m-%dT%H:%M:%S"),
            escape(&self.player),
            escape(&self.chart),
            self.difficulty.map(|d| d.label()).unwrap_or(""),
            j.perfect,
            j.great,
            j.good,
            j.bad,
            j.miss,
            calc.rating_constant,
            calc.delta,
            calc.rating,
            calc.accuracy,
        )
    }
}

/// Quotes a field if it holds a separator, quote or line break.
fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Initializes CSV file with header if it doesn't exist or is empty.
///
/// If the file exists and has content, this does nothing (preserves existing data).
pub fn init_csv(path: &Path) -> Result<()> {
    if path.exists() {
        let file = File::open(path).context("Failed to open existing CSV")?;
        let reader = BufReader::new(file);
        if reader.lines().next().is_some() {
            return Ok(());
        }
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let mut file = File::create(path).context("Failed to create CSV file")?;
    writeln!(file, "{}", CSV_HEADER).context("Failed to write CSV header")?;
    Ok(())
}

/// Appends one row, writing the header first if the file is new.
pub fn append_record(path: &Path, record: &HistoryRecord) -> Result<()> {
    init_csv(path)?;

    let mut file = OpenOptions::new()
        .append(true)
        .open(path)
        .context("Failed to open CSV for append")?;
    writeln!(file, "{}", record.to_row()).context("Failed to write CSV row")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::{Judgements, calculate};
    use tempfile::tempdir;

    fn record(chart: &str) -> HistoryRecord {
        let calc = calculate(25.0, Judgements::from_counts([950, 2, 0, 0, 1])).unwrap();
        HistoryRecord::new("miku", chart, Some(Difficulty::Expert), &calc)
    }

    #[test]
    fn test_init_csv_creates_header() {
        let dir = tempdir().unwrap();
        let csv_path = dir.path().join("history").join("scores.csv");

        init_csv(&csv_path).unwrap();

        let content = std::fs::read_to_string(&csv_path).unwrap();
        assert!(content.starts_with(CSV_HEADER));
    }

    #[test]
    fn test_init_csv_preserves_existing() {
        let dir = tempdir().unwrap();
        let csv_path = dir.path().join("scores.csv");
        std::fs::write(&csv_path, "existing,data\n1,2,3\n").unwrap();

        init_csv(&csv_path).unwrap();

        let content = std::fs::read_to_string(&csv_path).unwrap();
        assert!(content.starts_with("existing,data"));
    }

    #[test]
    fn test_append_rows() {
        let dir = tempdir().unwrap();
        let csv_path = dir.path().join("scores.csv");

        append_record(&csv_path, &record("Verd ele")).unwrap();
        append_record(&csv_path, &record("Hello, Worker")).unwrap();

        let content = std::fs::read_to_string(&csv_path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains(",miku,Verd ele,Expert,950,2,0,0,1,25.0,3.65,28.65,0.9983"));
        assert!(lines[2].contains(",\"Hello, Worker\",Expert,"));
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("plain"), "plain");
        assert_eq!(escape("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
