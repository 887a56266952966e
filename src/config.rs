//! Runtime configuration.
//!
//! Loads settings from config.json at startup. Every field has a default,
//! so a missing or partial file still yields a usable configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use tracing::{info, warn};

use crate::screenshot::variant::VariantSignatures;

/// Global configuration instance, initialized once at startup.
static CONFIG: OnceLock<AppConfig> = OnceLock::new();

/// Where a server's chart table lives in the remote spreadsheet.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SheetLocation {
    pub spreadsheet_id: String,
    /// A1-notation range, e.g. `Constants!A2:G5000`
    pub range: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Timeout for every outbound HTTP request (image fetch, cloud OCR, sheets)
    pub http_timeout_ms: u64,
    /// Completed jobs after which the OCR engines are torn down and restarted
    pub engine_recycle_quota: u64,
    /// Luma cut-off used when binarizing cropped regions
    pub binarize_threshold: u8,
    /// Width the solo accuracy column is scaled to before recognition
    pub accuracy_resize_width: u32,
    /// Border added around each region handed to an engine
    pub region_padding: u32,
    /// DPI hint passed to Tesseract
    pub tesseract_dpi: u32,
    /// Explicit Tesseract executable, otherwise searched for
    pub tesseract_path: Option<PathBuf>,
    /// Explicit tessdata directory, otherwise searched for
    pub tessdata_path: Option<PathBuf>,
    /// Reference colours of the sample pixel for each layout
    pub variant_signatures: VariantSignatures,
    /// Age after which a cached chart table is fetched again
    pub chart_refresh_secs: u64,
    /// Server whose sheet is used when none (or an unknown one) is requested
    pub default_server: String,
    /// Server id -> spreadsheet location
    pub sheets: HashMap<String, SheetLocation>,
    /// Range of the current assignment's song list, in each server's spreadsheet
    pub assignment_range: Option<String>,
    /// Name of the environment variable holding the cloud API key
    pub api_key_env: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        let mut sheets = HashMap::new();
        sheets.insert(
            "default".to_string(),
            SheetLocation {
                spreadsheet_id: String::new(),
                range: "Constants!A2:G5000".to_string(),
            },
        );

        Self {
            http_timeout_ms: 15_000,
            engine_recycle_quota: 5000,
            binarize_threshold: 128,
            accuracy_resize_width: 600,
            region_padding: 4,
            tesseract_dpi: 71,
            tesseract_path: None,
            tessdata_path: None,
            variant_signatures: VariantSignatures::default(),
            chart_refresh_secs: 30 * 60,
            default_server: "default".to_string(),
            sheets,
            assignment_range: None,
            api_key_env: "GOOGLE_API_KEY".to_string(),
        }
    }
}

impl AppConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    pub fn chart_refresh(&self) -> Duration {
        Duration::from_secs(self.chart_refresh_secs)
    }

    /// Sheet for `server`, falling back to the default server's sheet.
    pub fn sheet_for(&self, server: Option<&str>) -> Option<(&str, &SheetLocation)> {
        if let Some(server) = server {
            if let Some((key, location)) = self.sheets.get_key_value(server) {
                return Some((key.as_str(), location));
            }
        }
        self.sheets
            .get_key_value(&self.default_server)
            .map(|(key, location)| (key.as_str(), location))
    }

    /// Reads the cloud API key from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

/// Loads configuration from `path`, or returns defaults.
pub fn load_config(path: &Path) -> AppConfig {
    info!("Looking for config at: {}", path.display());

    if !path.exists() {
        info!("config.json not found. Using default config.");
        return AppConfig::default();
    }

    match fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(config) => {
                info!("Config loaded from {}", path.display());
                config
            }
            Err(e) => {
                warn!("Failed to parse config.json: {}. Using defaults.", e);
                AppConfig::default()
            }
        },
        Err(e) => {
            warn!("Failed to read config.json: {}. Using defaults.", e);
            AppConfig::default()
        }
    }
}

/// Initializes the global configuration from config.json next to the executable.
pub fn init_config() {
    let path = crate::paths::get_exe_dir().join("config.json");
    let _ = CONFIG.set(load_config(&path));
}

/// Returns the global configuration, defaults if `init_config` was never called.
pub fn get_config() -> &'static AppConfig {
    CONFIG.get_or_init(AppConfig::default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = load_config(&dir.path().join("config.json"));
        assert_eq!(config.engine_recycle_quota, 5000);
        assert_eq!(config.binarize_threshold, 128);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "engine_recycle_quota": 10, "tesseract_dpi": 300 }"#).unwrap();

        let config = load_config(&path);
        assert_eq!(config.engine_recycle_quota, 10);
        assert_eq!(config.tesseract_dpi, 300);
        assert_eq!(config.http_timeout_ms, 15_000);
    }

    #[test]
    fn test_malformed_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        let config = load_config(&path);
        assert_eq!(config.engine_recycle_quota, 5000);
    }

    #[test]
    fn test_sheet_for_unknown_server_falls_back() {
        let mut config = AppConfig::default();
        config.sheets.insert(
            "39s".to_string(),
            SheetLocation {
                spreadsheet_id: "abc".to_string(),
                range: "Constants!A2:G5000".to_string(),
            },
        );

        let (key, location) = config.sheet_for(Some("39s")).unwrap();
        assert_eq!(key, "39s");
        assert_eq!(location.spreadsheet_id, "abc");

        let (key, _) = config.sheet_for(Some("nope")).unwrap();
        assert_eq!(key, "default");
    }
}
