//! Column segmentation: locate the vertical gutter and split a page into
//! left/right reading columns.
//!
//! Three strategies are supported (see [`SplitStrategy`]): a plain midpoint
//! split for the legacy era whose volumes were typeset in a rigid frame,
//! ink-density valley detection for the common case, and an equal-ink-mass
//! split with corridor validation for volumes with badly skewed margins.
//!
//! Detection never fails: every path has a deterministic midpoint fallback
//! and every outcome is clamped to `[0.15 w, 0.85 w]`, so the segmenter
//! always returns two non-empty sub-images for any non-degenerate input.

use crate::config::{ExtractionConfig, SplitStrategy};
use crate::pipeline::preprocess::binarize_ink;
use image::{DynamicImage, GrayImage};
use imageproc::filter::median_filter;
use tracing::debug;

/// Physical rightward shift applied when an equal-area split lands
/// implausibly far left (< 40 % of width) — a known asymmetric-layout
/// artefact of some volumes, in centimetres.
const ASYMMETRY_SHIFT_CM: f32 = 1.0;

/// Pixel pad retained around the ink bounding box when trimming margins.
const TRIM_PAD: u32 = 5;

/// The two reading columns produced for one page.
pub struct ColumnSplit {
    pub left: DynamicImage,
    pub right: DynamicImage,
    /// Chosen gutter position in the (trimmed) page's coordinates.
    pub split_x: u32,
}

/// Split a page into its two reading columns.
///
/// `year_hint` is the page's current year label; pages from a configured
/// legacy era bypass detection entirely.
pub fn segment_page(
    image: &DynamicImage,
    year_hint: Option<&str>,
    config: &ExtractionConfig,
) -> ColumnSplit {
    if let Some(year) = year_hint {
        if config.legacy_midpoint_years.iter().any(|y| y == year) {
            debug!(year, "legacy era page, splitting at midpoint");
            return split_at(image, image.width() / 2, 0);
        }
    }

    let trimmed = trim_margins(image, TRIM_PAD);
    let width = trimmed.width();

    let split_x = match config.split_strategy {
        SplitStrategy::Midpoint => width / 2,
        SplitStrategy::Valley => find_valley_split(&trimmed, config),
        SplitStrategy::EqualArea => find_equal_area_split(&trimmed, config),
    };

    let clamped = clamp_split(split_x, width);
    let overlap = config.cm_to_px(config.overlap_cm);
    debug!(split_x = clamped, width, overlap, "column split chosen");
    split_at(&trimmed, clamped, overlap)
}

/// Crop to the bounding box of all ink plus a fixed pad.
///
/// Returns the input unchanged when no ink is found.
pub fn trim_margins(image: &DynamicImage, pad: u32) -> DynamicImage {
    let binary = binarize_ink(&image.to_luma8());
    let (w, h) = (binary.width(), binary.height());

    let mut min_x = w;
    let mut max_x = 0u32;
    let mut min_y = h;
    let mut max_y = 0u32;
    for (x, y, pixel) in binary.enumerate_pixels() {
        if pixel.0[0] > 0 {
            min_x = min_x.min(x);
            max_x = max_x.max(x);
            min_y = min_y.min(y);
            max_y = max_y.max(y);
        }
    }

    if min_x > max_x || min_y > max_y {
        return image.clone();
    }

    let left = min_x.saturating_sub(pad);
    let top = min_y.saturating_sub(pad);
    let right = (max_x + pad).min(w - 1);
    let bottom = (max_y + pad).min(h - 1);
    image.crop_imm(left, top, right - left + 1, bottom - top + 1)
}

/// Clamp a candidate split to the central `[0.15 w, 0.85 w]` corridor.
pub fn clamp_split(split_x: u32, width: u32) -> u32 {
    let lo = (width as f32 * 0.15) as u32;
    let hi = (width as f32 * 0.85) as u32;
    split_x.clamp(lo, hi.max(lo))
}

/// Per-column ink counts of the binarised page.
fn ink_projection(binary: &GrayImage) -> Vec<f32> {
    let (w, h) = (binary.width(), binary.height());
    let mut proj = vec![0.0f32; w as usize];
    for y in 0..h {
        for x in 0..w {
            if binary.get_pixel(x, y).0[0] > 0 {
                proj[x as usize] += 1.0;
            }
        }
    }
    proj
}

/// Box-blur a projection with an edge-clamped window of odd size `k`.
fn box_blur(proj: &[f32], k: usize) -> Vec<f32> {
    let n = proj.len();
    if n == 0 || k <= 1 {
        return proj.to_vec();
    }
    let half = k / 2;
    let mut out = vec![0.0f32; n];
    for i in 0..n {
        let lo = i.saturating_sub(half);
        let hi = (i + half).min(n - 1);
        let window = &proj[lo..=hi];
        out[i] = window.iter().sum::<f32>() / window.len() as f32;
    }
    out
}

/// Binarise a page for projection analysis: grayscale, median denoise,
/// invert + Otsu.
fn binarize_for_projection(image: &DynamicImage) -> GrayImage {
    let gray = median_filter(&image.to_luma8(), 1, 1);
    binarize_ink(&gray)
}

/// Valley detection: minimum of the smoothed ink projection within the
/// central 25 %–75 % band, accepted only when markedly below the band mean.
fn find_valley_split(image: &DynamicImage, config: &ExtractionConfig) -> u32 {
    let binary = binarize_for_projection(image);
    let w = binary.width() as usize;
    if w < 4 {
        return (w / 2) as u32;
    }

    let proj = ink_projection(&binary);
    let kernel = (w / 100 * 2 + 1).max(11);
    let smooth = box_blur(&proj, kernel);

    let lo = w / 4;
    let hi = (w * 3) / 4;
    let band = &smooth[lo..hi];
    if band.is_empty() {
        return (w / 2) as u32;
    }

    let (offset, valley) = band
        .iter()
        .enumerate()
        .fold((0usize, f32::MAX), |(best_i, best_v), (i, &v)| {
            if v < best_v {
                (i, v)
            } else {
                (best_i, best_v)
            }
        });
    let band_mean = band.iter().sum::<f32>() / band.len() as f32;

    if valley < band_mean * config.valley_accept_ratio {
        (lo + offset) as u32
    } else {
        debug!(valley, band_mean, "no convincing valley, falling back to midpoint");
        (w / 2) as u32
    }
}

/// Equal-area split: the column where cumulative ink mass reaches half the
/// total, refined by a corridor-validated local minimum.
fn find_equal_area_split(image: &DynamicImage, config: &ExtractionConfig) -> u32 {
    let binary = binarize_for_projection(image);
    let w = binary.width() as usize;
    if w < 4 {
        return (w / 2) as u32;
    }

    let proj = ink_projection(&binary);
    let total: f32 = proj.iter().sum();
    if total == 0.0 {
        return (w / 2) as u32;
    }

    // Index where cumulative mass crosses half the total.
    let mut cumulative = 0.0f32;
    let mut balance = w / 2;
    for (i, &v) in proj.iter().enumerate() {
        cumulative += v;
        if cumulative >= total / 2.0 {
            balance = i;
            break;
        }
    }

    // Refine: local minimum of the raw projection in a window around the
    // balance point.
    let window = (w / 40).max(2);
    let lo = balance.saturating_sub(window);
    let hi = (balance + window).min(w - 1);
    let refined = (lo..=hi)
        .min_by(|&a, &b| proj[a].partial_cmp(&proj[b]).unwrap_or(std::cmp::Ordering::Equal))
        .unwrap_or(balance);

    let mut split = if corridor_is_blank(&binary, refined as u32, config) {
        refined
    } else {
        debug!(refined, balance, "corridor validation failed, keeping balance index");
        balance
    };

    // Known asymmetric layouts push the balance point far left of the true
    // gutter; compensate with a fixed physical shift.
    if (split as f32) < w as f32 * 0.40 {
        let shift = config.cm_to_px(ASYMMETRY_SHIFT_CM) as usize;
        split = (split + shift).min(w - 1);
    }

    split as u32
}

/// Corridor validation: a thin vertical band around `candidate_x` must be
/// mostly blank, ignoring a top/bottom margin.
fn corridor_is_blank(binary: &GrayImage, candidate_x: u32, config: &ExtractionConfig) -> bool {
    let (w, h) = (binary.width(), binary.height());
    if h == 0 {
        return false;
    }
    let half_width = (w / 200).max(2);
    let lo = candidate_x.saturating_sub(half_width);
    let hi = (candidate_x + half_width).min(w - 1);

    let margin = (h as f32 * config.corridor_margin_ratio) as u32;
    let (top, bottom) = (margin, h.saturating_sub(margin));
    if top >= bottom {
        return false;
    }

    let corridor_cols = (hi - lo + 1) as f32;
    let mut blank_rows = 0u32;
    for y in top..bottom {
        let ink: f32 = (lo..=hi)
            .map(|x| if binary.get_pixel(x, y).0[0] > 0 { 255.0 } else { 0.0 })
            .sum();
        if ink / corridor_cols <= config.corridor_density_threshold {
            blank_rows += 1;
        }
    }

    blank_rows as f32 / (bottom - top) as f32 >= config.corridor_blank_fraction
}

/// Cut the page at `split_x`, extending both crops by `overlap` pixels so
/// glyphs straddling the cut appear in full on at least one side.
fn split_at(image: &DynamicImage, split_x: u32, overlap: u32) -> ColumnSplit {
    let (w, h) = (image.width(), image.height());
    let split_x = split_x.clamp(1, w.saturating_sub(1).max(1));

    let left_end = (split_x + overlap).min(w);
    let right_start = split_x.saturating_sub(overlap);

    ColumnSplit {
        left: image.crop_imm(0, 0, left_end, h),
        right: image.crop_imm(right_start, 0, w - right_start, h),
        split_x,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    /// A synthetic two-column page: solid text blocks with a white gutter.
    fn two_column_page(w: u32, h: u32, gutter_lo: u32, gutter_hi: u32) -> DynamicImage {
        let mut img = RgbImage::from_pixel(w, h, Rgb([255, 255, 255]));
        for y in 5..h - 5 {
            for x in 5..w - 5 {
                if x < gutter_lo || x >= gutter_hi {
                    img.put_pixel(x, y, Rgb([0, 0, 0]));
                }
            }
        }
        DynamicImage::ImageRgb8(img)
    }

    fn config() -> ExtractionConfig {
        ExtractionConfig::builder().overlap_cm(0.0).build().unwrap()
    }

    #[test]
    fn valley_lands_in_gutter() {
        let page = two_column_page(400, 200, 190, 210);
        let split = find_valley_split(&page, &config());
        assert!(
            (170..=230).contains(&split),
            "split {split} should be near the gutter"
        );
    }

    #[test]
    fn valley_falls_back_to_midpoint_without_gutter() {
        // Uniform ink: no valley is markedly below the band mean.
        let mut img = RgbImage::from_pixel(300, 150, Rgb([255, 255, 255]));
        for y in 5..145 {
            for x in 5..295 {
                img.put_pixel(x, y, Rgb([0, 0, 0]));
            }
        }
        let page = DynamicImage::ImageRgb8(img);
        let split = find_valley_split(&page, &config());
        assert_eq!(split, 150);
    }

    #[test]
    fn split_always_within_central_corridor() {
        for w in [10u32, 100, 333, 1024, 5000] {
            for candidate in [0u32, 1, w / 2, w.saturating_sub(1), w * 2] {
                let clamped = clamp_split(candidate, w);
                assert!(clamped >= (w as f32 * 0.15) as u32);
                assert!(clamped <= (w as f32 * 0.85) as u32);
            }
        }
    }

    #[test]
    fn segment_returns_two_nonempty_columns() {
        let page = two_column_page(400, 200, 190, 210);
        let split = segment_page(&page, None, &config());
        assert!(split.left.width() > 0 && split.left.height() > 0);
        assert!(split.right.width() > 0 && split.right.height() > 0);
    }

    #[test]
    fn overlap_extends_both_crops() {
        let page = two_column_page(400, 200, 190, 210);
        let cfg = ExtractionConfig::builder()
            .dpi(200)
            .overlap_cm(0.5)
            .build()
            .unwrap();
        let overlap_px = cfg.cm_to_px(0.5);
        let split = segment_page(&page, None, &cfg);
        let total = split.left.width() + split.right.width();
        let trimmed_w = trim_margins(&page, TRIM_PAD).width();
        assert_eq!(total, trimmed_w + 2 * overlap_px);
    }

    #[test]
    fn legacy_year_splits_at_exact_midpoint() {
        let page = two_column_page(400, 200, 100, 120); // off-centre gutter
        let cfg = ExtractionConfig::builder()
            .legacy_midpoint_years(vec!["1930".into()])
            .overlap_cm(0.0)
            .build()
            .unwrap();
        let split = segment_page(&page, Some("1930"), &cfg);
        assert_eq!(split.split_x, 200);
        assert_eq!(split.left.width(), 200);
    }

    #[test]
    fn trim_margins_crops_to_ink() {
        let mut img = RgbImage::from_pixel(200, 100, Rgb([255, 255, 255]));
        for y in 40..60 {
            for x in 80..120 {
                img.put_pixel(x, y, Rgb([0, 0, 0]));
            }
        }
        let trimmed = trim_margins(&DynamicImage::ImageRgb8(img), 5);
        assert_eq!(trimmed.width(), 40 + 2 * 5);
        assert_eq!(trimmed.height(), 20 + 2 * 5);
    }

    #[test]
    fn trim_margins_no_ink_returns_input() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(50, 50, Rgb([255, 255, 255])));
        let trimmed = trim_margins(&img, 5);
        assert_eq!((trimmed.width(), trimmed.height()), (50, 50));
    }

    #[test]
    fn equal_area_finds_gutter_between_balanced_columns() {
        let page = two_column_page(400, 200, 185, 215);
        let split = find_equal_area_split(&page, &config());
        assert!(
            (175..=225).contains(&split),
            "split {split} should be near the gutter"
        );
    }

    #[test]
    fn corridor_rejects_inked_band() {
        let page = two_column_page(400, 200, 185, 215);
        let binary = binarize_for_projection(&page);
        let cfg = config();
        assert!(corridor_is_blank(&binary, 200, &cfg), "gutter corridor");
        assert!(!corridor_is_blank(&binary, 100, &cfg), "text corridor");
    }

    #[test]
    fn box_blur_preserves_length_and_mean_of_constant() {
        let proj = vec![3.0f32; 50];
        let out = box_blur(&proj, 11);
        assert_eq!(out.len(), 50);
        assert!(out.iter().all(|&v| (v - 3.0).abs() < 1e-6));
    }
}
