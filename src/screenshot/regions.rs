//! Region templates for each layout and framing.
//!
//! Rectangles are fractions of the image size and are turned into pixel
//! rectangles by flooring each product against the real dimensions.

use serde::{Deserialize, Serialize};

use super::variant::ImageVariant;
use crate::error::{ScoreError, ScoreResult};

/// Width/height ratio above which a screenshot is treated as phone-framed.
pub const PHONE_ASPECT_THRESHOLD: f64 = 1.667;

/// Number of player slots on a coop result screen.
pub const COOP_SLOTS: usize = 5;

/// Start offset and width of each coop accuracy column, as fractions of the band width.
/// The in-game digit columns are not evenly spaced, so these are not equal fifths.
pub const COOP_ACCURACY_SLOTS: [(f64, f64); COOP_SLOTS] = [
    (0.055, 0.105),
    (0.255, 0.105),
    (0.452, 0.105),
    (0.650, 0.105),
    (0.847, 0.105),
];

/// A rectangle in relative coordinates (0.0 to 1.0).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RelativeRect {
    /// X position of top-left corner (0.0 = left edge, 1.0 = right edge)
    pub x: f64,
    /// Y position of top-left corner (0.0 = top edge, 1.0 = bottom edge)
    pub y: f64,
    /// Width as fraction of image width
    pub width: f64,
    /// Height as fraction of image height
    pub height: f64,
}

impl RelativeRect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Floors every offset against `(w, h)` and clamps the result to the image.
    pub fn to_pixels(&self, w: u32, h: u32) -> PixelRect {
        let left = ((self.x * w as f64).floor() as u32).min(w);
        let top = ((self.y * h as f64).floor() as u32).min(h);
        let width = ((self.width * w as f64).floor() as u32).min(w - left);
        let height = ((self.height * h as f64).floor() as u32).min(h - top);
        PixelRect { left, top, width, height }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AspectClass {
    Phone,
    Tablet,
}

impl AspectClass {
    pub fn of(width: u32, height: u32) -> ScoreResult<Self> {
        if width == 0 || height == 0 {
            return Err(ScoreError::RegionExtraction(format!(
                "image has zero dimension ({}x{})",
                width, height
            )));
        }
        if width as f64 / height as f64 > PHONE_ASPECT_THRESHOLD {
            Ok(AspectClass::Phone)
        } else {
            Ok(AspectClass::Tablet)
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RegionTemplate {
    Solo {
        title: RelativeRect,
        accuracy: RelativeRect,
    },
    Coop {
        names: RelativeRect,
        difficulties: RelativeRect,
        accuracies: RelativeRect,
    },
}

/// Selects the template for a layout and framing.
pub fn template_for(variant: ImageVariant, aspect: AspectClass) -> RegionTemplate {
    use AspectClass::*;
    use ImageVariant::*;

    match (variant, aspect) {
        (SoloEn, Phone) => RegionTemplate::Solo {
            title: RelativeRect::new(0.16, 0.0, 0.5, 0.06),
            accuracy: RelativeRect::new(0.45, 0.55, 0.08, 0.3),
        },
        (SoloEn, Tablet) => RegionTemplate::Solo {
            title: RelativeRect::new(0.08, 0.0, 0.5, 0.05),
            accuracy: RelativeRect::new(0.45, 0.55, 0.08, 0.22),
        },
        (SoloJp, Phone) => RegionTemplate::Solo {
            title: RelativeRect::new(0.25, 0.02, 0.25, 0.06),
            accuracy: RelativeRect::new(0.28, 0.55, 0.08, 0.35),
        },
        (SoloJp, Tablet) => RegionTemplate::Solo {
            title: RelativeRect::new(0.19, 0.02, 0.4, 0.05),
            accuracy: RelativeRect::new(0.22, 0.55, 0.08, 0.3),
        },
        (CoopJp, Phone) => RegionTemplate::Coop {
            names: RelativeRect::new(0.1, 0.42, 0.8, 0.05),
            difficulties: RelativeRect::new(0.1, 0.48, 0.8, 0.05),
            accuracies: RelativeRect::new(0.1, 0.54, 0.8, 0.28),
        },
        (CoopJp, Tablet) => RegionTemplate::Coop {
            names: RelativeRect::new(0.0, 0.45, 1.0, 0.04),
            difficulties: RelativeRect::new(0.0, 0.48, 1.0, 0.04),
            accuracies: RelativeRect::new(0.0, 0.52, 1.0, 0.25),
        },
    }
}

/// Five equal-width slots across a band, in band-local pixel coordinates.
pub fn equal_slots(band_width: u32, band_height: u32) -> [PixelRect; COOP_SLOTS] {
    let slot_width = band_width / COOP_SLOTS as u32;
    std::array::from_fn(|i| PixelRect {
        left: slot_width * i as u32,
        top: 0,
        width: slot_width,
        height: band_height,
    })
}

/// Accuracy columns across a band, using the fixed column offsets.
pub fn accuracy_slots(band_width: u32, band_height: u32) -> [PixelRect; COOP_SLOTS] {
    COOP_ACCURACY_SLOTS.map(|(start, width)| {
        RelativeRect::new(start, 0.0, width, 1.0).to_pixels(band_width, band_height)
    })
}
