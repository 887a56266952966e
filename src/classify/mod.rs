//! Turns recognized text into score fields.
//!
//! `solo` works on positioned full-frame tokens, `coop` on pre-cropped
//! per-player blocks. Both share the row matching and number parsing here.

pub mod coop;
pub mod solo;

pub use coop::{CoopBlocks, CoopPlayer, classify_coop};
pub use solo::{SoloFields, classify_solo, read_local_solo};

use std::fmt;

use crate::ocr::BoundingBox;

/// Pixel tolerance when comparing rows and column edges.
pub const ROW_TOLERANCE: i32 = 20;

/// Hit-quality tiers, in display order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Judgement {
    Perfect,
    Great,
    Good,
    Bad,
    Miss,
}

impl Judgement {
    pub const ALL: [Judgement; 5] = [
        Judgement::Perfect,
        Judgement::Great,
        Judgement::Good,
        Judgement::Bad,
        Judgement::Miss,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Judgement::Perfect => "perfect",
            Judgement::Great => "great",
            Judgement::Good => "good",
            Judgement::Bad => "bad",
            Judgement::Miss => "miss",
        }
    }

    /// Case-insensitive match on the on-screen label.
    pub fn from_label(text: &str) -> Option<Self> {
        let lower = text.trim().to_lowercase();
        Self::ALL.into_iter().find(|j| j.label() == lower)
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Judgement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub fn within(value: i32, target: i32, range: i32) -> bool {
    value >= target - range && value <= target + range
}

/// Vertical span of a text row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RowBand {
    pub top: i32,
    pub bottom: i32,
}

impl RowBand {
    pub fn of(bbox: &BoundingBox) -> Self {
        Self {
            top: bbox.top,
            bottom: bbox.bottom,
        }
    }

    /// Both edges of `bbox` lie within [`ROW_TOLERANCE`] of this row's edges.
    pub fn matches(&self, bbox: &BoundingBox) -> bool {
        within(bbox.top, self.top, ROW_TOLERANCE) && within(bbox.bottom, self.bottom, ROW_TOLERANCE)
    }
}

/// Leading unsigned integer of `text`, ignoring leading whitespace and any trailing garbage.
///
/// `"950"` and `" 12x"` parse, `"x12"` and `"-3"` don't.
pub fn leading_int(text: &str) -> Option<u32> {
    let trimmed = text.trim_start();
    let end = trimmed
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(trimmed.len());
    trimmed[..end].parse().ok()
}

/// Integer value of every line of a digits-engine result that starts with a number.
pub fn line_ints(text: &str) -> Vec<u32> {
    text.lines().filter_map(|line| leading_int(line.trim())).collect()
}
