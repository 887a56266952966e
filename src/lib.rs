//! Score reader for rhythm-game result screenshots.
//!
//! Reads a result screen (solo or coop), recognizes its text with a cloud
//! or local OCR engine, matches the play to a chart and works out the
//! rating it is worth.

pub mod charts;
pub mod classify;
pub mod config;
pub mod error;
pub mod history;
pub mod logging;
pub mod ocr;
pub mod paths;
pub mod pipeline;
pub mod score;
pub mod screenshot;

pub use charts::{ChartEntry, ChartSource, Difficulty, SheetCharts, StaticCharts};
pub use config::{AppConfig, get_config, init_config};
pub use error::{ScoreError, ScoreResult};
pub use pipeline::{
    CoopOutcome, CoopPlayerScore, LocalOutcome, ScorePipeline, ScreenshotOutcome, calculate_custom,
    calculate_manual,
};
pub use score::{Calculation, Judgements, Rank, ResolvedScore, ScoreRecord};
pub use screenshot::ImageVariant;
