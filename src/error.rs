//! Failure taxonomy for one screenshot or one manual score request.
//!
//! Every variant is local to the request that raised it; nothing here
//! invalidates the engine pool or the chart cache.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScoreError {
    /// The sample pixel matched none of the known layouts.
    #[error("unrecognized screenshot layout (sample colour rgb({r}, {g}, {b}))")]
    UnrecognizedVariant { r: u8, g: u8, b: u8 },

    #[error("region extraction failed: {0}")]
    RegionExtraction(String),

    #[error("OCR engine failure: {0}")]
    OcrEngine(String),

    #[error("score fields incomplete: {0}")]
    FieldClassificationIncomplete(String),

    #[error("chart unavailable")]
    ChartNotFound,

    #[error("invalid score input: {0}")]
    InvalidScoreInput(String),

    #[error("failed to fetch image: {0}")]
    ImageFetch(String),

    #[error("malformed image: {0}")]
    MalformedImage(String),

    #[error("no tourney session running for {0}")]
    NoTourneySession(String),
}

impl ScoreError {
    /// Wraps an engine-side error chain into `OcrEngine`, keeping the context messages.
    pub fn engine(err: anyhow::Error) -> Self {
        ScoreError::OcrEngine(format!("{:#}", err))
    }
}

pub type ScoreResult<T> = std::result::Result<T, ScoreError>;
