//! Chart tables kept in a remote spreadsheet, one per server.
//!
//! Each server's table is cached and fetched again once it is older than
//! the configured refresh interval. A refresh that fails or comes back
//! empty leaves the previous table in place.

use anyhow::{Context, Result, anyhow};
use reqwest::Url;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::{ChartEntry, ChartSource, Difficulty, parse_hints};
use crate::config::{AppConfig, SheetLocation};

const SHEETS_ENDPOINT: &str = "https://sheets.googleapis.com/v4/spreadsheets/";

// Column layout of a chart row
const COL_NAME: usize = 0;
const COL_CONSTANT: usize = 1;
const COL_DIFFICULTY: usize = 3;
const COL_NOTES: usize = 4;
const COL_ALIASES: usize = 6;

/// Reads the raw cells of a spreadsheet range.
pub trait RangeReader: Send + Sync {
    fn read(&self, location: &SheetLocation) -> Result<Vec<Vec<Value>>>;
}

/// Sheets v4 `values.get` with an API key.
pub struct SheetsApi {
    client: Client,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

impl SheetsApi {
    pub fn new(client: Client, api_key: Option<String>) -> Self {
        Self { client, api_key }
    }
}

impl RangeReader for SheetsApi {
    fn read(&self, location: &SheetLocation) -> Result<Vec<Vec<Value>>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("no API key configured for spreadsheet access"))?;

        let mut url = Url::parse(SHEETS_ENDPOINT)?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("invalid spreadsheet endpoint"))?
            .pop_if_empty()
            .extend([location.spreadsheet_id.as_str(), "values", location.range.as_str()]);

        let response = self
            .client
            .get(url)
            .query(&[("key", api_key)])
            .send()
            .with_context(|| format!("failed to read spreadsheet {}", location.spreadsheet_id))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "spreadsheet {} returned HTTP {}",
                location.spreadsheet_id,
                response.status()
            ));
        }

        let range: ValueRange = response.json().context("unexpected spreadsheet response")?;
        Ok(range.values)
    }
}

fn cell(row: &[Value], index: usize) -> Option<String> {
    match row.get(index)? {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Converts spreadsheet rows to charts, skipping rows that don't parse.
pub fn parse_rows(rows: &[Vec<Value>]) -> Vec<ChartEntry> {
    let mut charts = Vec::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        match parse_row(row) {
            Some(chart) => charts.push(chart),
            None => debug!("Skipping chart row {}: {:?}", index, row),
        }
    }
    charts
}

fn parse_row(row: &[Value]) -> Option<ChartEntry> {
    let name = cell(row, COL_NAME).filter(|n| !n.is_empty())?;
    let rating_constant = cell(row, COL_CONSTANT)?.parse::<f64>().ok()?;
    let difficulty = cell(row, COL_DIFFICULTY)?.parse::<Difficulty>().ok()?;
    let total_notes = cell(row, COL_NOTES)?.parse::<u32>().ok()?;
    let aliases = cell(row, COL_ALIASES)
        .map(|raw| {
            raw.split(';')
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Some(ChartEntry {
        name,
        difficulty,
        rating_constant,
        total_notes,
        aliases,
    })
}

struct Cached<T> {
    fetched_at: Instant,
    value: T,
}

/// Per-server values fetched again once older than `refresh`.
struct RefreshCache<T> {
    refresh: Duration,
    entries: Mutex<HashMap<String, Cached<T>>>,
}

impl<T: Clone> RefreshCache<T> {
    fn new(refresh: Duration) -> Self {
        Self {
            refresh,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Cached value while fresh, else `fetch`. A failed or empty fetch keeps the previous value.
    fn get_or_refresh(
        &self,
        key: &str,
        what: &str,
        fetch: impl FnOnce() -> Result<T>,
        is_empty: impl Fn(&T) -> bool,
    ) -> Option<T> {
        let mut entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(cached) = entries.get(key) {
            if cached.fetched_at.elapsed() < self.refresh {
                return Some(cached.value.clone());
            }
        }

        info!("Refreshing {} for server {}", what, key);
        match fetch() {
            Ok(value) if !is_empty(&value) => {
                entries.insert(
                    key.to_string(),
                    Cached {
                        fetched_at: Instant::now(),
                        value: value.clone(),
                    },
                );
                Some(value)
            }
            Ok(_) => {
                warn!("Spreadsheet for server {} has no {}, keeping previous", key, what);
                entries.get(key).map(|c| c.value.clone())
            }
            Err(e) => {
                warn!("Failed to refresh {} for server {}: {:#}", what, key, e);
                entries.get(key).map(|c| c.value.clone())
            }
        }
    }
}

/// Song names of the current assignment, one or more `;`-separated names per cell.
pub fn parse_assignment(rows: &[Vec<Value>]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for value in rows.iter().flatten() {
        let Value::String(raw) = value else {
            continue;
        };
        for name in parse_hints(raw) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    names
}

pub struct SheetCharts<R: RangeReader = SheetsApi> {
    reader: R,
    sheets: HashMap<String, SheetLocation>,
    default_server: String,
    assignment_range: Option<String>,
    charts: RefreshCache<Arc<[ChartEntry]>>,
    assignments: RefreshCache<Vec<String>>,
}

impl SheetCharts<SheetsApi> {
    pub fn from_config(config: &AppConfig, client: Client) -> Self {
        Self::new(SheetsApi::new(client, config.api_key()), config)
    }
}

impl<R: RangeReader> SheetCharts<R> {
    pub fn new(reader: R, config: &AppConfig) -> Self {
        Self {
            reader,
            sheets: config.sheets.clone(),
            default_server: config.default_server.clone(),
            assignment_range: config.assignment_range.clone(),
            charts: RefreshCache::new(config.chart_refresh()),
            assignments: RefreshCache::new(config.chart_refresh()),
        }
    }

    fn location(&self, server: Option<&str>) -> Option<(&str, &SheetLocation)> {
        if let Some((key, location)) = server.and_then(|s| self.sheets.get_key_value(s)) {
            return Some((key.as_str(), location));
        }
        self.sheets
            .get_key_value(&self.default_server)
            .map(|(key, location)| (key.as_str(), location))
    }

    /// Song names of the assignment currently running on `server`'s spreadsheet.
    ///
    /// Empty when no assignment range is configured or nothing could be read.
    pub fn current_assignment(&self, server: Option<&str>) -> Vec<String> {
        let Some(range) = self.assignment_range.as_deref() else {
            return Vec::new();
        };
        let Some((key, sheet)) = self.location(server) else {
            return Vec::new();
        };

        let location = SheetLocation {
            spreadsheet_id: sheet.spreadsheet_id.clone(),
            range: range.to_string(),
        };
        let names = self
            .assignments
            .get_or_refresh(
                key,
                "assignment",
                || self.reader.read(&location).map(|rows| parse_assignment(&rows)),
                Vec::is_empty,
            )
            .unwrap_or_default();
        debug!("Current assignment for server {}: {:?}", key, names);
        names
    }
}

impl<R: RangeReader> ChartSource for SheetCharts<R> {
    fn charts(&self, server: Option<&str>) -> Arc<[ChartEntry]> {
        let Some((key, location)) = self.location(server) else {
            warn!("No spreadsheet configured for server {:?}", server);
            return Arc::from(Vec::new());
        };

        self.charts
            .get_or_refresh(
                key,
                "charts",
                || {
                    let charts = parse_rows(&self.reader.read(location)?);
                    info!("Read {} charts for server {}", charts.len(), key);
                    Ok(charts.into())
                },
                |charts: &Arc<[ChartEntry]>| charts.is_empty(),
            )
            .unwrap_or_else(|| Arc::from(Vec::new()))
    }

    fn assignment(&self, server: Option<&str>) -> Vec<String> {
        self.current_assignment(server)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeReader {
        calls: AtomicUsize,
        responses: Mutex<Vec<Result<Vec<Vec<Value>>>>>,
    }

    impl FakeReader {
        fn new(responses: Vec<Result<Vec<Vec<Value>>>>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                responses: Mutex::new(responses),
            }
        }
    }

    impl RangeReader for FakeReader {
        fn read(&self, _location: &SheetLocation) -> Result<Vec<Vec<Value>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Err(anyhow!("no more responses"));
            }
            responses.remove(0)
        }
    }

    fn rows() -> Vec<Vec<Value>> {
        vec![
            vec![json!("Hibana"), json!("31.5"), json!(""), json!("Master"), json!("1021")],
            vec![
                json!("Roki"),
                json!("28"),
                json!(""),
                json!("Master"),
                json!("1026"),
                json!(""),
                json!(" ロキ ; roki ;"),
            ],
            vec![json!("Broken"), json!("n/a"), json!(""), json!("Master"), json!("10")],
        ]
    }

    fn config(refresh_secs: u64) -> AppConfig {
        AppConfig {
            chart_refresh_secs: refresh_secs,
            ..AppConfig::default()
        }
    }

    #[test]
    fn test_parse_rows() {
        let charts = parse_rows(&rows());
        assert_eq!(charts.len(), 2);
        assert_eq!(charts[0].rating_constant, 31.5);
        assert!(charts[0].aliases.is_empty());
        assert_eq!(charts[1].aliases, vec!["ロキ".to_string(), "roki".to_string()]);
        assert_eq!(charts[1].total_notes, 1026);
    }

    #[test]
    fn test_parse_numeric_cells() {
        let charts = parse_rows(&[vec![json!("X"), json!(30.5), json!(null), json!("Expert"), json!(700)]]);
        assert_eq!(charts[0].rating_constant, 30.5);
        assert_eq!(charts[0].total_notes, 700);
    }

    #[test]
    fn test_cached_within_refresh_interval() {
        let source = SheetCharts::new(FakeReader::new(vec![Ok(rows())]), &config(1800));
        assert_eq!(source.charts(None).len(), 2);
        assert_eq!(source.charts(Some("unknown")).len(), 2);
        assert_eq!(source.reader.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_refresh_keeps_previous() {
        let reader = FakeReader::new(vec![Ok(rows()), Ok(Vec::new()), Err(anyhow!("offline"))]);
        let source = SheetCharts::new(reader, &config(0));

        assert_eq!(source.charts(None).len(), 2);
        assert_eq!(source.charts(None).len(), 2);
        assert_eq!(source.charts(None).len(), 2);
        assert_eq!(source.reader.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_first_fetch_failure_gives_empty_snapshot() {
        let source = SheetCharts::new(FakeReader::new(vec![Err(anyhow!("offline"))]), &config(1800));
        assert!(source.charts(None).is_empty());
    }

    fn assignment_config() -> AppConfig {
        AppConfig {
            assignment_range: Some("Assignment!A2:A10".to_string()),
            ..config(1800)
        }
    }

    #[test]
    fn test_parse_assignment() {
        let rows = vec![
            vec![json!("Hibana; Roki")],
            vec![json!(""), json!(3)],
            vec![json!("Roki"), json!(" Lost and Found ")],
        ];
        assert_eq!(parse_assignment(&rows), vec!["Hibana", "Roki", "Lost and Found"]);
    }

    #[test]
    fn test_current_assignment_cached() {
        let reader = FakeReader::new(vec![Ok(vec![vec![json!("Hibana;Roki")]])]);
        let source = SheetCharts::new(reader, &assignment_config());

        assert_eq!(source.current_assignment(None), vec!["Hibana", "Roki"]);
        assert_eq!(source.assignment(Some("unknown")), vec!["Hibana", "Roki"]);
        assert_eq!(source.reader.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_assignment_and_charts_cached_apart() {
        let reader = FakeReader::new(vec![Ok(rows()), Ok(vec![vec![json!("Roki")]])]);
        let source = SheetCharts::new(reader, &assignment_config());

        assert_eq!(source.charts(None).len(), 2);
        assert_eq!(source.current_assignment(None), vec!["Roki"]);
        assert_eq!(source.charts(None).len(), 2);
        assert_eq!(source.reader.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_no_assignment_range_reads_nothing() {
        let source = SheetCharts::new(FakeReader::new(Vec::new()), &config(1800));
        assert!(source.current_assignment(None).is_empty());
        assert_eq!(source.reader.calls.load(Ordering::SeqCst), 0);
    }
}
