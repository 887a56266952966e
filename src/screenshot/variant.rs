//! Layout detection from a single sample pixel.
//!
//! The top edge of every result screen is painted in a layout-specific
//! colour. The pixel at `(width / 2, 0)` is compared channel by channel
//! against a reference colour per layout.

use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

use crate::error::{ScoreError, ScoreResult};

/// The three result-screen layouts this crate can read.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageVariant {
    SoloEn,
    SoloJp,
    CoopJp,
}

impl ImageVariant {
    pub fn is_coop(self) -> bool {
        matches!(self, ImageVariant::CoopJp)
    }
}

impl fmt::Display for ImageVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImageVariant::SoloEn => "solo (EN)",
            ImageVariant::SoloJp => "solo (JP)",
            ImageVariant::CoopJp => "coop (JP)",
        };
        f.write_str(name)
    }
}

/// Target value and allowed deviation for one colour channel.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelWindow {
    pub target: u8,
    pub tolerance: u8,
}

impl ChannelWindow {
    pub const fn new(target: u8, tolerance: u8) -> Self {
        Self { target, tolerance }
    }

    /// Inclusive on both ends.
    pub fn contains(&self, value: u8) -> bool {
        let value = value as i16;
        let target = self.target as i16;
        let tolerance = self.tolerance as i16;
        value >= target - tolerance && value <= target + tolerance
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColorSignature {
    pub r: ChannelWindow,
    pub g: ChannelWindow,
    pub b: ChannelWindow,
}

impl ColorSignature {
    pub fn matches(&self, [r, g, b]: [u8; 3]) -> bool {
        self.r.contains(r) && self.g.contains(g) && self.b.contains(b)
    }
}

/// Reference colours for every layout.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VariantSignatures {
    pub coop_jp: ColorSignature,
    pub solo_jp: ColorSignature,
    pub solo_en: ColorSignature,
}

impl Default for VariantSignatures {
    fn default() -> Self {
        Self {
            coop_jp: ColorSignature {
                r: ChannelWindow::new(215, 15),
                g: ChannelWindow::new(200, 15),
                b: ChannelWindow::new(240, 15),
            },
            solo_jp: ColorSignature {
                r: ChannelWindow::new(175, 25),
                g: ChannelWindow::new(175, 25),
                b: ChannelWindow::new(200, 40),
            },
            solo_en: ColorSignature {
                r: ChannelWindow::new(75, 25),
                g: ChannelWindow::new(75, 25),
                b: ChannelWindow::new(100, 40),
            },
        }
    }
}

impl VariantSignatures {
    /// Evaluation order. Coop and solo JP share a hue family, so coop goes first.
    fn ordered(&self) -> [(ImageVariant, &ColorSignature); 3] {
        [
            (ImageVariant::CoopJp, &self.coop_jp),
            (ImageVariant::SoloJp, &self.solo_jp),
            (ImageVariant::SoloEn, &self.solo_en),
        ]
    }
}

/// Reads the sample pixel at the horizontal midpoint of the top row.
pub fn sample_color(img: &RgbImage) -> ScoreResult<[u8; 3]> {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(ScoreError::RegionExtraction(format!(
            "image has zero dimension ({}x{})",
            width, height
        )));
    }
    Ok(img.get_pixel(width / 2, 0).0)
}

/// Determines which layout produced `img`. First matching signature wins.
pub fn classify(img: &RgbImage, signatures: &VariantSignatures) -> ScoreResult<ImageVariant> {
    let rgb = sample_color(img)?;
    debug!("Sample colour: rgb({}, {}, {})", rgb[0], rgb[1], rgb[2]);

    for (variant, signature) in signatures.ordered() {
        if signature.matches(rgb) {
            info!("Layout detected: {}", variant);
            return Ok(variant);
        }
    }

    Err(ScoreError::UnrecognizedVariant {
        r: rgb[0],
        g: rgb[1],
        b: rgb[2],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn image_with_sample(rgb: [u8; 3]) -> RgbImage {
        ImageBuffer::from_fn(40, 20, |x, y| {
            if x == 20 && y == 0 { Rgb(rgb) } else { Rgb([0, 255, 0]) }
        })
    }

    #[test]
    fn test_channel_window_inclusive() {
        let window = ChannelWindow::new(175, 25);
        assert!(window.contains(150));
        assert!(window.contains(200));
        assert!(!window.contains(149));
        assert!(!window.contains(201));
    }

    #[test]
    fn test_channel_window_near_bounds() {
        assert!(ChannelWindow::new(10, 25).contains(0));
        assert!(ChannelWindow::new(250, 25).contains(255));
    }

    #[test]
    fn test_classify_solo_en() {
        let sig = VariantSignatures::default();
        assert_eq!(classify(&image_with_sample([70, 80, 110]), &sig).unwrap(), ImageVariant::SoloEn);
    }

    #[test]
    fn test_classify_solo_jp() {
        let sig = VariantSignatures::default();
        assert_eq!(classify(&image_with_sample([170, 180, 195]), &sig).unwrap(), ImageVariant::SoloJp);
    }

    #[test]
    fn test_classify_coop_checked_before_solo_jp() {
        // r=212 is outside the solo JP red window
        let sig = VariantSignatures::default();
        assert_eq!(classify(&image_with_sample([212, 198, 236]), &sig).unwrap(), ImageVariant::CoopJp);

        // Inside both windows: coop still wins because of ordering
        let overlap = [200, 190, 230];
        assert!(sig.solo_jp.matches(overlap));
        assert!(sig.coop_jp.matches(overlap));
        assert_eq!(classify(&image_with_sample(overlap), &sig).unwrap(), ImageVariant::CoopJp);
    }

    #[test]
    fn test_classify_unrecognized() {
        let sig = VariantSignatures::default();
        let err = classify(&image_with_sample([255, 0, 0]), &sig).unwrap_err();
        assert!(matches!(err, ScoreError::UnrecognizedVariant { r: 255, g: 0, b: 0 }));
    }

    #[test]
    fn test_sample_uses_floor_midpoint() {
        let img: RgbImage = ImageBuffer::from_fn(5, 1, |x, _| Rgb([x as u8, 0, 0]));
        assert_eq!(sample_color(&img).unwrap(), [2, 0, 0]);
    }

    #[test]
    fn test_zero_sized_image_fails() {
        let img: RgbImage = ImageBuffer::new(0, 0);
        assert!(matches!(
            classify(&img, &VariantSignatures::default()),
            Err(ScoreError::RegionExtraction(_))
        ));
    }
}
