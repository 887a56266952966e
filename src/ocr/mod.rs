pub mod engine;
pub mod pool;
pub mod setup;
pub mod vision;

pub use engine::{TesseractEngine, TesseractFactory};
pub use pool::{EnginePool, PoolGuard};
pub use vision::VisionClient;

use anyhow::Result;
use image::GrayImage;
use serde::{Deserialize, Serialize};

/// The three local engines, one per character set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EngineKind {
    Latin,
    Japanese,
    /// Restricted to 0-9
    Digits,
}

impl EngineKind {
    pub fn label(self) -> &'static str {
        match self {
            EngineKind::Latin => "latin",
            EngineKind::Japanese => "japanese",
            EngineKind::Digits => "digits",
        }
    }
}

/// Text read from one cropped region.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Recognition {
    pub text: String,
    /// 0-100
    pub confidence: f32,
}

impl Recognition {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }
}

/// Pixel box of a token: top-left and bottom-right corners.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl BoundingBox {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }
}

/// One text fragment from full-frame cloud OCR.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecognizedToken {
    pub text: String,
    pub bbox: BoundingBox,
    pub confidence: Option<f32>,
}

impl RecognizedToken {
    pub fn new(text: impl Into<String>, bbox: BoundingBox) -> Self {
        Self {
            text: text.into(),
            bbox,
            confidence: None,
        }
    }
}

/// A live, stateful recognizer. Not safe to drive from two jobs at once.
pub trait RecognitionEngine: Send {
    fn kind(&self) -> EngineKind;

    fn recognize(&mut self, img: &GrayImage) -> Result<Recognition>;

    /// Releases whatever the engine holds. Called before a recycle.
    fn shutdown(self: Box<Self>) -> Result<()>;
}

/// Creates engines for the pool.
pub trait EngineFactory: Send + Sync {
    fn start(&self, kind: EngineKind) -> Result<Box<dyn RecognitionEngine>>;
}
