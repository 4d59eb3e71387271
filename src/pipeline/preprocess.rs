//! Image preprocessing: page normalisation, OCR preparation, blank detection.
//!
//! Two distinct preparation paths exist because they serve different
//! consumers. [`upscale_and_boost`] runs once per page before segmentation —
//! the scans are small and low-contrast, and the segmenter's ink projections
//! need the boost as much as any backend does. [`prepare_for_ocr`] runs per
//! region just before an OCR call: grayscale, mild denoise, histogram
//! equalisation.
//!
//! All transforms are pure: they return new images and never fail.

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, RgbImage};
use imageproc::contrast::{equalize_histogram, otsu_level};
use imageproc::filter::median_filter;

/// Upscale 2×, force RGB, and boost contrast by a fixed multiplier.
pub fn upscale_and_boost(image: &DynamicImage) -> DynamicImage {
    let upscaled = image.resize_exact(
        image.width() * 2,
        image.height() * 2,
        FilterType::Lanczos3,
    );
    let boosted = boost_contrast(&upscaled.to_rgb8(), 2.0);
    DynamicImage::ImageRgb8(boosted)
}

/// Multiply the distance of every sample from the image mean by `factor`,
/// clamping to the valid range.
///
/// `factor` 1.0 is the identity; 2.0 doubles the spread around the mean.
pub fn boost_contrast(image: &RgbImage, factor: f32) -> RgbImage {
    let samples = image.as_raw();
    if samples.is_empty() {
        return image.clone();
    }
    let mean =
        samples.iter().map(|&v| v as f64).sum::<f64>() / samples.len() as f64;

    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        for v in pixel.0.iter_mut() {
            let adjusted = mean + factor as f64 * (*v as f64 - mean);
            *v = adjusted.round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

/// Grayscale, 3×3 median denoise, histogram equalisation.
///
/// Applied to each region immediately before an OCR call.
pub fn prepare_for_ocr(image: &DynamicImage) -> GrayImage {
    let gray = image.to_luma8();
    let denoised = median_filter(&gray, 1, 1);
    equalize_histogram(&denoised)
}

/// Invert and Otsu-binarise so ink pixels become 255 and paper becomes 0.
///
/// The shared first step of margin trimming, valley detection, and blank
/// detection: all three reason about ink mass, not brightness.
pub fn binarize_ink(gray: &GrayImage) -> GrayImage {
    let mut inverted = gray.clone();
    for pixel in inverted.pixels_mut() {
        pixel.0[0] = 255 - pixel.0[0];
    }
    let level = otsu_level(&inverted);
    let mut out = inverted;
    for pixel in out.pixels_mut() {
        pixel.0[0] = if pixel.0[0] > level { 255 } else { 0 };
    }
    out
}

/// Fraction of pixels that are ink after binarisation, in `[0, 1]`.
pub fn ink_fraction(image: &DynamicImage) -> f32 {
    let binary = binarize_ink(&image.to_luma8());
    let total = (binary.width() * binary.height()) as f32;
    if total == 0.0 {
        return 0.0;
    }
    let ink = binary.pixels().filter(|p| p.0[0] > 0).count() as f32;
    ink / total
}

/// Statistical blank test: true when the region's ink fraction is below
/// `epsilon`. Blank regions skip OCR entirely.
pub fn is_blank(image: &DynamicImage, epsilon: f32) -> bool {
    ink_fraction(image) < epsilon
}

/// A solid-paper check that sidesteps Otsu entirely.
///
/// Otsu always finds *some* threshold, so a perfectly uniform region can
/// still report nonzero ink. A near-zero standard deviation catches the
/// degenerate all-one-shade case first.
pub fn is_flat(gray: &GrayImage) -> bool {
    let samples = gray.as_raw();
    if samples.is_empty() {
        return true;
    }
    let mean = samples.iter().map(|&v| v as f64).sum::<f64>() / samples.len() as f64;
    let variance = samples
        .iter()
        .map(|&v| (v as f64 - mean).powi(2))
        .sum::<f64>()
        / samples.len() as f64;
    variance.sqrt() < 1.0
}

/// Blank test combining the flat-region shortcut with the ink-fraction test.
pub fn region_is_blank(image: &DynamicImage, epsilon: f32) -> bool {
    let gray = image.to_luma8();
    if is_flat(&gray) {
        return true;
    }
    is_blank(image, epsilon)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn white_page(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([255, 255, 255])))
    }

    fn page_with_block(w: u32, h: u32, x0: u32, x1: u32) -> DynamicImage {
        let mut img = RgbImage::from_pixel(w, h, Rgb([255, 255, 255]));
        for y in 10..h - 10 {
            for x in x0..x1 {
                img.put_pixel(x, y, Rgb([0, 0, 0]));
            }
        }
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn upscale_doubles_dimensions() {
        let out = upscale_and_boost(&white_page(40, 30));
        assert_eq!((out.width(), out.height()), (80, 60));
    }

    #[test]
    fn contrast_boost_widens_spread() {
        let mut img = RgbImage::from_pixel(4, 1, Rgb([120, 120, 120]));
        img.put_pixel(0, 0, Rgb([140, 140, 140]));
        let out = boost_contrast(&img, 2.0);
        let low = out.get_pixel(1, 0).0[0];
        let high = out.get_pixel(0, 0).0[0];
        assert!(high > 140, "bright pixel should move up, got {high}");
        assert!(low < 120, "dark pixel should move down, got {low}");
    }

    #[test]
    fn contrast_boost_identity_at_factor_one() {
        let img = RgbImage::from_pixel(3, 3, Rgb([77, 150, 20]));
        assert_eq!(boost_contrast(&img, 1.0), img);
    }

    #[test]
    fn uniform_region_is_blank() {
        assert!(region_is_blank(&white_page(60, 60), 0.003));
    }

    #[test]
    fn inked_region_is_not_blank() {
        let img = page_with_block(100, 100, 20, 80);
        assert!(!region_is_blank(&img, 0.003));
    }

    #[test]
    fn binarize_marks_ink_as_white() {
        let img = page_with_block(50, 50, 10, 40);
        let binary = binarize_ink(&img.to_luma8());
        assert_eq!(binary.get_pixel(25, 25).0[0], 255, "ink pixel");
        assert_eq!(binary.get_pixel(0, 0).0[0], 0, "paper pixel");
    }

    #[test]
    fn prepare_for_ocr_preserves_dimensions() {
        let img = page_with_block(64, 48, 10, 30);
        let prepared = prepare_for_ocr(&img);
        assert_eq!((prepared.width(), prepared.height()), (64, 48));
    }
}
