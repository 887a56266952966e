//! Cuts the layout's regions out of a screenshot and prepares them for OCR.

use image::{GrayImage, RgbImage};
use tracing::debug;

use super::preprocess::{binarize, crop_gray, crop_rgb, invert, pad, resize_to_width};
use super::regions::{
    AspectClass, COOP_SLOTS, PixelRect, RegionTemplate, RelativeRect, accuracy_slots,
    equal_slots, template_for,
};
use super::variant::ImageVariant;
use crate::config::AppConfig;
use crate::error::{ScoreError, ScoreResult};

/// Preprocessing knobs, usually taken from [`AppConfig`].
#[derive(Clone, Copy, Debug)]
pub struct ExtractOptions {
    pub threshold: u8,
    pub accuracy_width: u32,
    pub padding: u32,
}

impl From<&AppConfig> for ExtractOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            threshold: config.binarize_threshold,
            accuracy_width: config.accuracy_resize_width,
            padding: config.region_padding,
        }
    }
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

#[derive(Debug, Clone)]
pub enum Regions {
    Solo {
        title: GrayImage,
        accuracy: GrayImage,
    },
    /// One image per player slot, left to right.
    Coop {
        names: Vec<GrayImage>,
        difficulties: Vec<GrayImage>,
        accuracies: Vec<GrayImage>,
    },
}

#[derive(Debug, Clone)]
pub struct Extraction {
    pub variant: ImageVariant,
    pub regions: Regions,
}

pub fn extract(img: &RgbImage, variant: ImageVariant, options: &ExtractOptions) -> ScoreResult<Extraction> {
    let (width, height) = img.dimensions();
    let aspect = AspectClass::of(width, height)?;
    debug!("Extracting {} regions from {}x{} ({:?})", variant, width, height, aspect);

    let regions = match template_for(variant, aspect) {
        RegionTemplate::Solo { title, accuracy } => {
            extract_solo(img, variant, &title, &accuracy, options)?
        }
        RegionTemplate::Coop {
            names,
            difficulties,
            accuracies,
        } => extract_coop(img, &names, &difficulties, &accuracies, options)?,
    };

    Ok(Extraction { variant, regions })
}

fn region(img: &RgbImage, rect: &RelativeRect, name: &str) -> ScoreResult<RgbImage> {
    let (width, height) = img.dimensions();
    let px = rect.to_pixels(width, height);
    if px.is_empty() {
        return Err(ScoreError::RegionExtraction(format!(
            "{} region is empty for a {}x{} image",
            name, width, height
        )));
    }
    debug!("{} region: {:?}", name, px);
    Ok(crop_rgb(img, &px))
}

fn extract_solo(
    img: &RgbImage,
    variant: ImageVariant,
    title_rect: &RelativeRect,
    accuracy_rect: &RelativeRect,
    options: &ExtractOptions,
) -> ScoreResult<Regions> {
    let title = binarize(&region(img, title_rect, "title")?, options.threshold);
    // EN titles are drawn light-on-dark, the opposite of the JP layouts
    let title = if variant == ImageVariant::SoloEn {
        invert(&title)
    } else {
        title
    };

    let accuracy = region(img, accuracy_rect, "accuracy")?;
    let accuracy = resize_to_width(&accuracy, options.accuracy_width);
    let accuracy = invert(&binarize(&accuracy, options.threshold));

    Ok(Regions::Solo {
        title: pad(&title, options.padding),
        accuracy: pad(&accuracy, options.padding),
    })
}

fn extract_coop(
    img: &RgbImage,
    names_rect: &RelativeRect,
    difficulties_rect: &RelativeRect,
    accuracies_rect: &RelativeRect,
    options: &ExtractOptions,
) -> ScoreResult<Regions> {
    let band = |rect: &RelativeRect, name: &str| -> ScoreResult<GrayImage> {
        let cropped = region(img, rect, name)?;
        Ok(invert(&binarize(&cropped, options.threshold)))
    };

    let names_band = band(names_rect, "nickname band")?;
    let difficulties_band = band(difficulties_rect, "difficulty band")?;
    let accuracies_band = band(accuracies_rect, "accuracy band")?;

    let names = split(&names_band, &equal_slots(names_band.width(), names_band.height()), options)?;
    let difficulties = split(
        &difficulties_band,
        &equal_slots(difficulties_band.width(), difficulties_band.height()),
        options,
    )?;
    let accuracies = split(
        &accuracies_band,
        &accuracy_slots(accuracies_band.width(), accuracies_band.height()),
        options,
    )?;

    Ok(Regions::Coop {
        names,
        difficulties,
        accuracies,
    })
}

fn split(band: &GrayImage, slots: &[PixelRect; COOP_SLOTS], options: &ExtractOptions) -> ScoreResult<Vec<GrayImage>> {
    slots
        .iter()
        .map(|slot| {
            if slot.is_empty() {
                return Err(ScoreError::RegionExtraction(format!(
                    "coop slot {:?} is empty for a {}x{} band",
                    slot,
                    band.width(),
                    band.height()
                )));
            }
            Ok(pad(&crop_gray(band, slot), options.padding))
        })
        .collect()
}
