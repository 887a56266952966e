use image::imageops::{self, FilterType};
use image::{GrayImage, ImageBuffer, Luma, RgbImage};

use super::regions::PixelRect;

/// Converts image to binary by luma.
///
/// Pixels with luma >= threshold become white (255), all others black (0).
/// Uses the ITU-R BT.709 weights the game art was tuned against.
pub fn binarize(img: &RgbImage, threshold: u8) -> GrayImage {
    let (width, height) = img.dimensions();
    let mut output = ImageBuffer::new(width, height);

    for (x, y, pixel) in img.enumerate_pixels() {
        let r = pixel[0] as u32;
        let g = pixel[1] as u32;
        let b = pixel[2] as u32;
        let luma = (2126 * r + 7152 * g + 722 * b) / 10_000;

        let value = if luma >= threshold as u32 { 255u8 } else { 0u8 };
        output.put_pixel(x, y, Luma([value]));
    }

    output
}

/// Swaps black and white.
pub fn invert(img: &GrayImage) -> GrayImage {
    let mut output = img.clone();
    imageops::invert(&mut output);
    output
}

/// Surrounds the image with a white border of `border` pixels.
pub fn pad(img: &GrayImage, border: u32) -> GrayImage {
    let (width, height) = img.dimensions();
    let mut output = ImageBuffer::from_pixel(width + 2 * border, height + 2 * border, Luma([255u8]));
    imageops::replace(&mut output, img, border as i64, border as i64);
    output
}

/// Scales to `target_width`, keeping the aspect ratio.
pub fn resize_to_width(img: &RgbImage, target_width: u32) -> RgbImage {
    let (width, height) = img.dimensions();
    if width == 0 || width == target_width {
        return img.clone();
    }
    let target_height = ((height as u64 * target_width as u64) / width as u64).max(1) as u32;
    imageops::resize(img, target_width, target_height, FilterType::Triangle)
}

/// Crops a pixel rectangle. The rectangle must already lie inside the image.
pub fn crop_rgb(img: &RgbImage, rect: &PixelRect) -> RgbImage {
    imageops::crop_imm(img, rect.left, rect.top, rect.width, rect.height).to_image()
}

pub fn crop_gray(img: &GrayImage, rect: &PixelRect) -> GrayImage {
    imageops::crop_imm(img, rect.left, rect.top, rect.width, rect.height).to_image()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_binarize() {
        let mut img: RgbImage = ImageBuffer::new(3, 1);

        // Pixel 0: Dark (should become black)
        img.put_pixel(0, 0, Rgb([100, 100, 100]));

        // Pixel 1: Bright white (should become white)
        img.put_pixel(1, 0, Rgb([250, 250, 250]));

        // Pixel 2: Pure blue is dark by luma
        img.put_pixel(2, 0, Rgb([0, 0, 255]));

        let result = binarize(&img, 128);

        assert_eq!(result.get_pixel(0, 0)[0], 0, "Dark pixel should become black");
        assert_eq!(result.get_pixel(1, 0)[0], 255, "Bright pixel should become white");
        assert_eq!(result.get_pixel(2, 0)[0], 0, "Blue pixel should become black");
    }

    #[test]
    fn test_binarize_threshold_inclusive() {
        let img: RgbImage = ImageBuffer::from_pixel(1, 1, Rgb([128, 128, 128]));
        assert_eq!(binarize(&img, 128).get_pixel(0, 0)[0], 255);
    }

    #[test]
    fn test_invert() {
        let img: GrayImage = ImageBuffer::from_fn(2, 1, |x, _| Luma([if x == 0 { 0 } else { 255 }]));
        let inverted = invert(&img);
        assert_eq!(inverted.get_pixel(0, 0)[0], 255);
        assert_eq!(inverted.get_pixel(1, 0)[0], 0);
    }

    #[test]
    fn test_pad_adds_white_border() {
        let img: GrayImage = ImageBuffer::from_pixel(10, 5, Luma([0u8]));
        let padded = pad(&img, 4);

        assert_eq!(padded.dimensions(), (18, 13));
        assert_eq!(padded.get_pixel(0, 0)[0], 255);
        assert_eq!(padded.get_pixel(4, 4)[0], 0);
        assert_eq!(padded.get_pixel(13, 8)[0], 0);
        assert_eq!(padded.get_pixel(14, 9)[0], 255);
    }

    #[test]
    fn test_resize_to_width_keeps_ratio() {
        let img: RgbImage = ImageBuffer::new(150, 300);
        let resized = resize_to_width(&img, 600);
        assert_eq!(resized.dimensions(), (600, 1200));
    }

    #[test]
    fn test_crop_rgb() {
        // 100x200 image
        let img: RgbImage = ImageBuffer::from_fn(100, 200, |x, y| Rgb([x as u8, y as u8, 0]));

        let rect = PixelRect { left: 10, top: 50, width: 50, height: 20 };
        let cropped = crop_rgb(&img, &rect);

        assert_eq!(cropped.dimensions(), (50, 20));
        // Top-left pixel should be (10, 50) from original
        assert_eq!(cropped.get_pixel(0, 0)[0], 10);
        assert_eq!(cropped.get_pixel(0, 0)[1], 50);
    }
}
