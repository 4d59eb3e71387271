//! Text extraction orchestration: from one page image to its full text.
//!
//! The page is normalised once, cropped into its regions (header band, then
//! the two detected columns, optionally row-split), and each region goes
//! through the same funnel: blank-skip → OCR preparation → primary backend
//! → fallback backend → empty text. Nothing in here returns `Err`: a region
//! that defeats both backends contributes an empty string, and the failure
//! is recorded on the side for the run summary.
//!
//! Region order is fixed — header, left, right — so a page's text always
//! reads the way the page does.

use crate::config::ExtractionConfig;
use crate::error::PageFailure;
use crate::ocr::{normalize, OcrEngine, OcrStack};
use crate::pipeline::postprocess::clean_region_text;
use crate::pipeline::preprocess::{prepare_for_ocr, region_is_blank, upscale_and_boost};
use crate::pipeline::segment::segment_page;
use image::DynamicImage;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

/// A named crop queued for extraction.
struct Region {
    name: &'static str,
    image: DynamicImage,
}

/// Extract the full text of one page.
///
/// `year_hint` is the carry-forward year before this page, used only to
/// route legacy-era pages to the midpoint split. Region texts are joined
/// with blank lines; empty regions are dropped from the join.
pub async fn extract_page_text(
    image: &DynamicImage,
    year_hint: Option<&str>,
    stack: &OcrStack,
    config: &ExtractionConfig,
    semaphore: &Semaphore,
    page: usize,
    failures: &mut Vec<PageFailure>,
) -> String {
    let regions = plan_regions(image, year_hint, config);
    let mut parts: Vec<String> = Vec::with_capacity(regions.len());

    for region in regions {
        let text = extract_region(&region, stack, config, semaphore, page, failures).await;
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            parts.push(trimmed.to_string());
        }
    }

    parts.join("\n\n")
}

/// Normalise the page and crop its regions in reading order.
fn plan_regions(
    image: &DynamicImage,
    year_hint: Option<&str>,
    config: &ExtractionConfig,
) -> Vec<Region> {
    let page = upscale_and_boost(image);
    let (w, h) = (page.width(), page.height());

    let header_height = ((h as f32 * config.header_ratio) as u32).max(1);
    let mut regions = vec![Region {
        name: "header",
        image: page.crop_imm(0, 0, w, header_height),
    }];

    let split = segment_page(&page, year_hint, config);
    let columns = [
        ("left column", "left column (top)", "left column (bottom)", split.left),
        ("right column", "right column (top)", "right column (bottom)", split.right),
    ];

    for (whole, top, bottom, column) in columns {
        if config.split_rows {
            let half = (column.height() / 2).max(1);
            regions.push(Region {
                name: top,
                image: column.crop_imm(0, 0, column.width(), half),
            });
            regions.push(Region {
                name: bottom,
                image: column.crop_imm(0, half, column.width(), column.height() - half),
            });
        } else {
            regions.push(Region {
                name: whole,
                image: column,
            });
        }
    }

    regions
}

/// Run one region through blank-skip, preparation, and the backend stack.
async fn extract_region(
    region: &Region,
    stack: &OcrStack,
    config: &ExtractionConfig,
    semaphore: &Semaphore,
    page: usize,
    failures: &mut Vec<PageFailure>,
) -> String {
    if region_is_blank(&region.image, config.blank_ink_epsilon) {
        debug!(page, region = region.name, "region statistically blank, skipping OCR");
        return String::new();
    }

    let prepared = DynamicImage::ImageLuma8(prepare_for_ocr(&region.image));

    // One permit covers the primary call and its fallback: the pair is a
    // single logical unit of backend load.
    let Ok(_permit) = semaphore.acquire().await else {
        return String::new();
    };

    if let Some(text) =
        call_engine(&stack.primary, &prepared, config, page, region.name, failures).await
    {
        if !text.trim().is_empty() {
            return text;
        }
        debug!(page, region = region.name, "primary backend returned only whitespace");
    }

    if let Some(ref fallback) = stack.fallback {
        if let Some(text) =
            call_engine(fallback, &prepared, config, page, region.name, failures).await
        {
            return text;
        }
    }

    warn!(page, region = region.name, "no backend produced text, region degraded to empty");
    String::new()
}

/// One backend call with the configured timeout; `None` records a failure.
async fn call_engine(
    engine: &Arc<dyn OcrEngine>,
    region: &DynamicImage,
    config: &ExtractionConfig,
    page: usize,
    region_name: &'static str,
    failures: &mut Vec<PageFailure>,
) -> Option<String> {
    let budget = Duration::from_secs(config.ocr_timeout_secs);
    match timeout(budget, engine.extract(region)).await {
        Ok(Ok(output)) => Some(clean_region_text(&normalize(&output))),
        Ok(Err(e)) => {
            warn!(page, region = region_name, backend = engine.name(), error = %e, "OCR call failed");
            failures.push(PageFailure::OcrFailed {
                page,
                region: region_name.to_string(),
                detail: e.to_string(),
            });
            None
        }
        Err(_) => {
            warn!(page, region = region_name, backend = engine.name(), "OCR call timed out");
            failures.push(PageFailure::Timeout {
                page,
                region: region_name.to_string(),
                secs: config.ocr_timeout_secs,
            });
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OcrFailure;
    use crate::ocr::OcrOutput;
    use async_trait::async_trait;
    use image::{Rgb, RgbImage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Scripted backend: pops one canned response per call.
    struct ScriptedEngine {
        name: &'static str,
        responses: Mutex<Vec<Result<OcrOutput, String>>>,
        calls: AtomicUsize,
    }

    impl ScriptedEngine {
        fn new(name: &'static str, responses: Vec<Result<OcrOutput, String>>) -> Arc<Self> {
            Arc::new(Self {
                name,
                responses: Mutex::new(responses),
                calls: AtomicUsize::new(0),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl OcrEngine for ScriptedEngine {
        fn name(&self) -> &str {
            self.name
        }

        async fn extract(&self, _region: &DynamicImage) -> Result<OcrOutput, OcrFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().unwrap();
            match responses.pop() {
                Some(Ok(output)) => Ok(output),
                Some(Err(detail)) => Err(OcrFailure::Backend {
                    backend: self.name.to_string(),
                    detail,
                }),
                None => Ok(OcrOutput::Empty),
            }
        }
    }

    fn inked_page() -> DynamicImage {
        let mut img = RgbImage::from_pixel(400, 200, Rgb([255, 255, 255]));
        for y in 5..195 {
            for x in 5..395 {
                if !(190..210).contains(&x) {
                    img.put_pixel(x, y, Rgb([0, 0, 0]));
                }
            }
        }
        DynamicImage::ImageRgb8(img)
    }

    fn blank_page() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(200, 100, Rgb([255, 255, 255])))
    }

    fn config() -> ExtractionConfig {
        ExtractionConfig::builder().overlap_cm(0.0).build().unwrap()
    }

    #[tokio::test]
    async fn blank_page_never_touches_the_backend() {
        let engine = ScriptedEngine::new("primary", vec![]);
        let stack = OcrStack::new(engine.clone());
        let semaphore = Semaphore::new(4);
        let mut failures = Vec::new();

        let text = extract_page_text(
            &blank_page(),
            None,
            &stack,
            &config(),
            &semaphore,
            0,
            &mut failures,
        )
        .await;

        assert!(text.is_empty());
        assert_eq!(engine.call_count(), 0);
        assert!(failures.is_empty());
    }

    #[tokio::test]
    async fn regions_join_in_reading_order() {
        // Responses pop from the back: header first, then left, then right.
        let engine = ScriptedEngine::new(
            "primary",
            vec![
                Ok(OcrOutput::Text("RIGHT 2".into())),
                Ok(OcrOutput::Text("LEFT 1".into())),
                Ok(OcrOutput::Text("HEADER 0".into())),
            ],
        );
        let stack = OcrStack::new(engine.clone());
        let semaphore = Semaphore::new(4);
        let mut failures = Vec::new();

        let text = extract_page_text(
            &inked_page(),
            None,
            &stack,
            &config(),
            &semaphore,
            0,
            &mut failures,
        )
        .await;

        assert_eq!(text, "HEADER 0\n\nLEFT 1\n\nRIGHT 2");
        assert_eq!(engine.call_count(), 3);
    }

    #[tokio::test]
    async fn fallback_covers_primary_failure() {
        let primary = ScriptedEngine::new(
            "primary",
            vec![
                Err("boom".into()),
                Err("boom".into()),
                Err("boom".into()),
            ],
        );
        let fallback = ScriptedEngine::new(
            "fallback",
            vec![
                Ok(OcrOutput::Text("r".into())),
                Ok(OcrOutput::Text("l".into())),
                Ok(OcrOutput::Text("h".into())),
            ],
        );
        let stack = OcrStack::new(primary.clone()).with_fallback(fallback.clone());
        let semaphore = Semaphore::new(4);
        let mut failures = Vec::new();

        let text = extract_page_text(
            &inked_page(),
            None,
            &stack,
            &config(),
            &semaphore,
            2,
            &mut failures,
        )
        .await;

        assert_eq!(text, "h\n\nl\n\nr");
        assert_eq!(primary.call_count(), 3);
        assert_eq!(fallback.call_count(), 3);
        assert_eq!(failures.len(), 3, "each primary failure is recorded");
    }

    #[tokio::test]
    async fn whitespace_primary_result_triggers_fallback() {
        let primary = ScriptedEngine::new(
            "primary",
            vec![
                Ok(OcrOutput::Text("   ".into())),
                Ok(OcrOutput::Text("   ".into())),
                Ok(OcrOutput::Text("   ".into())),
            ],
        );
        let fallback = ScriptedEngine::new(
            "fallback",
            vec![
                Ok(OcrOutput::Text("saved".into())),
                Ok(OcrOutput::Text("saved".into())),
                Ok(OcrOutput::Text("saved".into())),
            ],
        );
        let stack = OcrStack::new(primary.clone()).with_fallback(fallback.clone());
        let semaphore = Semaphore::new(4);
        let mut failures = Vec::new();

        let text = extract_page_text(
            &inked_page(),
            None,
            &stack,
            &config(),
            &semaphore,
            0,
            &mut failures,
        )
        .await;

        assert!(text.contains("saved"));
        assert_eq!(fallback.call_count(), 3);
        assert!(failures.is_empty(), "whitespace is not a recorded failure");
    }

    #[tokio::test]
    async fn both_backends_failing_degrades_to_empty() {
        let primary = ScriptedEngine::new(
            "primary",
            vec![Err("a".into()), Err("b".into()), Err("c".into())],
        );
        let fallback = ScriptedEngine::new(
            "fallback",
            vec![Err("d".into()), Err("e".into()), Err("f".into())],
        );
        let stack = OcrStack::new(primary).with_fallback(fallback);
        let semaphore = Semaphore::new(4);
        let mut failures = Vec::new();

        let text = extract_page_text(
            &inked_page(),
            None,
            &stack,
            &config(),
            &semaphore,
            7,
            &mut failures,
        )
        .await;

        assert!(text.is_empty());
        assert_eq!(failures.len(), 6);
        assert!(failures
            .iter()
            .all(|f| matches!(f, PageFailure::OcrFailed { page: 7, .. })));
    }

    #[tokio::test]
    async fn row_split_doubles_column_regions() {
        let engine = ScriptedEngine::new("primary", vec![]);
        let stack = OcrStack::new(engine.clone());
        let cfg = ExtractionConfig::builder()
            .split_rows(true)
            .overlap_cm(0.0)
            .build()
            .unwrap();
        let semaphore = Semaphore::new(4);
        let mut failures = Vec::new();

        extract_page_text(
            &inked_page(),
            None,
            &stack,
            &cfg,
            &semaphore,
            0,
            &mut failures,
        )
        .await;

        // header + 2 columns x 2 halves.
        assert_eq!(engine.call_count(), 5);
    }
}
