use std::path::PathBuf;
use std::sync::OnceLock;

static EXE_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Returns the directory containing the executable.
pub fn get_exe_dir() -> &'static PathBuf {
    EXE_DIR.get_or_init(|| {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."))
    })
}

/// Returns the logs directory: `<exe_dir>/logs/`
pub fn get_logs_dir() -> PathBuf {
    get_exe_dir().join("logs")
}

/// Returns the score history file: `<exe_dir>/history/scores.csv`
pub fn get_history_path() -> PathBuf {
    get_exe_dir().join("history").join("scores.csv")
}

/// Returns the tourney session directory: `<exe_dir>/tourney/`
pub fn get_tourney_dir() -> PathBuf {
    get_exe_dir().join("tourney")
}

/// Returns the per-user directory for Tesseract data: `<data_local>/sekai-score-reader/tesseract/`
pub fn get_tesseract_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sekai-score-reader")
        .join("tesseract")
}

/// Ensures all output directories exist. Call at startup.
pub fn ensure_directories() -> std::io::Result<()> {
    std::fs::create_dir_all(get_logs_dir())?;
    if let Some(parent) = get_history_path().parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}
