//! Configuration types for the extraction pipeline.
//!
//! All pipeline behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. Keeping every knob in one immutable
//! struct makes it trivial to share configs across tasks, serialise them for
//! logging, and diff two runs to understand why their outputs differ.
//!
//! The curated country list, the census-year list, and the manual override
//! table are configuration *data*, not code constants: they can be tested and
//! varied per run without touching any logic.

use crate::error::ScanError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

/// How to locate the vertical gutter between the two text columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SplitStrategy {
    /// Split at the exact geometric midpoint, no detection.
    Midpoint,
    /// Smoothed ink-density valley in the central band, midpoint fallback. (default)
    #[default]
    Valley,
    /// Equal cumulative ink mass, refined by a corridor-validated local minimum.
    EqualArea,
}

/// Configuration for one extraction run.
///
/// Built via [`ExtractionConfig::builder()`] or using
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use scan2chunk::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .dpi(200)
///     .fuzzy_threshold(85)
///     .countries(vec!["Canada".into(), "Brazil".into()])
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Resolution the pages were rasterised at, in dots per inch. Default: 200.
    ///
    /// Only used to convert physical distances (column overlap, asymmetric
    /// layout compensation) into pixels; the pipeline never rasterises.
    pub dpi: u32,

    /// Height of the header band as a fraction of page height. Default: 0.12.
    pub header_ratio: f32,

    /// Split each column further into top/bottom halves before OCR. Default: false.
    ///
    /// Dense layouts with very long columns can exceed what a backend reads
    /// reliably in one call; row-splitting halves the region height.
    pub split_rows: bool,

    /// Gutter detection strategy. Default: [`SplitStrategy::Valley`].
    pub split_strategy: SplitStrategy,

    /// Accept a valley only when its density is below this fraction of the
    /// central band's mean density. Default: 0.6.
    pub valley_accept_ratio: f32,

    /// Physical overlap between the two column crops, in centimetres. Default: 0.5.
    pub overlap_cm: f32,

    /// Corridor validation: required fraction of blank rows in the corridor. Default: 0.7.
    pub corridor_blank_fraction: f32,

    /// Corridor validation: a row counts as blank when its ink density is at
    /// or below this value (0–255 scale after binarisation). Default: 2.0.
    pub corridor_density_threshold: f32,

    /// Corridor validation: fraction of image height ignored at top and bottom. Default: 0.1.
    pub corridor_margin_ratio: f32,

    /// Year labels whose pages bypass detection and split at the midpoint.
    ///
    /// One era of the source volumes was typeset with a rigid two-column
    /// frame; detection adds nothing there and occasionally locks onto an
    /// in-table rule instead of the gutter.
    pub legacy_midpoint_years: Vec<String>,

    /// Ink fraction below which a region is judged blank and OCR is skipped.
    /// Default: 0.003.
    pub blank_ink_epsilon: f32,

    /// Curated country names matched against page text.
    pub countries: Vec<String>,

    /// Known census years matched against source filenames, in priority order.
    pub census_years: Vec<u32>,

    /// Manual country overrides keyed by (source filename, page index).
    /// Always win over text-based resolution.
    pub country_overrides: HashMap<(String, usize), String>,

    /// Minimum `partial_ratio` score (0–100) for a fuzzy country match. Default: 80.
    pub fuzzy_threshold: u8,

    /// Group aggregated documents by (country, year, source) instead of
    /// (country, year). Default: true.
    pub group_by_source: bool,

    /// Number of source documents processed concurrently. Default: 4.
    ///
    /// Pages within one source are always sequential (carry-forward and
    /// interpolation depend on page order); only whole sources fan out.
    pub source_concurrency: usize,

    /// Maximum outstanding OCR backend calls across all sources. Default: 8.
    pub ocr_concurrency: usize,

    /// Per-OCR-call timeout in seconds; a timed-out region is treated as
    /// failed-empty. Default: 60.
    pub ocr_timeout_secs: u64,

    /// Directory for per-page chunk files. Default: `output_chunks`.
    pub output_dir: PathBuf,

    /// Directory for aggregated per-entity documents. Default: `country_chunks`.
    pub aggregate_dir: PathBuf,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            dpi: 200,
            header_ratio: 0.12,
            split_rows: false,
            split_strategy: SplitStrategy::default(),
            valley_accept_ratio: 0.6,
            overlap_cm: 0.5,
            corridor_blank_fraction: 0.7,
            corridor_density_threshold: 2.0,
            corridor_margin_ratio: 0.1,
            legacy_midpoint_years: Vec::new(),
            blank_ink_epsilon: 0.003,
            countries: default_countries(),
            census_years: vec![1930, 1940, 1950, 1960, 1970, 1980, 1990, 2000],
            country_overrides: HashMap::new(),
            fuzzy_threshold: 80,
            group_by_source: true,
            source_concurrency: 4,
            ocr_concurrency: 8,
            ocr_timeout_secs: 60,
            output_dir: PathBuf::from("output_chunks"),
            aggregate_dir: PathBuf::from("country_chunks"),
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("dpi", &self.dpi)
            .field("header_ratio", &self.header_ratio)
            .field("split_rows", &self.split_rows)
            .field("split_strategy", &self.split_strategy)
            .field("valley_accept_ratio", &self.valley_accept_ratio)
            .field("overlap_cm", &self.overlap_cm)
            .field("fuzzy_threshold", &self.fuzzy_threshold)
            .field("countries", &self.countries.len())
            .field("country_overrides", &self.country_overrides.len())
            .field("group_by_source", &self.group_by_source)
            .field("source_concurrency", &self.source_concurrency)
            .field("ocr_concurrency", &self.ocr_concurrency)
            .field("output_dir", &self.output_dir)
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Convert a physical distance in centimetres to pixels at the configured DPI.
    pub fn cm_to_px(&self, cm: f32) -> u32 {
        (cm / 2.54 * self.dpi as f32).round() as u32
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn header_ratio(mut self, ratio: f32) -> Self {
        self.config.header_ratio = ratio.clamp(0.0, 0.5);
        self
    }

    pub fn split_rows(mut self, v: bool) -> Self {
        self.config.split_rows = v;
        self
    }

    pub fn split_strategy(mut self, strategy: SplitStrategy) -> Self {
        self.config.split_strategy = strategy;
        self
    }

    pub fn valley_accept_ratio(mut self, ratio: f32) -> Self {
        self.config.valley_accept_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    pub fn overlap_cm(mut self, cm: f32) -> Self {
        self.config.overlap_cm = cm.max(0.0);
        self
    }

    pub fn corridor_blank_fraction(mut self, fraction: f32) -> Self {
        self.config.corridor_blank_fraction = fraction.clamp(0.0, 1.0);
        self
    }

    pub fn corridor_density_threshold(mut self, threshold: f32) -> Self {
        self.config.corridor_density_threshold = threshold.max(0.0);
        self
    }

    pub fn corridor_margin_ratio(mut self, ratio: f32) -> Self {
        self.config.corridor_margin_ratio = ratio.clamp(0.0, 0.4);
        self
    }

    pub fn legacy_midpoint_years(mut self, years: Vec<String>) -> Self {
        self.config.legacy_midpoint_years = years;
        self
    }

    pub fn blank_ink_epsilon(mut self, epsilon: f32) -> Self {
        self.config.blank_ink_epsilon = epsilon.clamp(0.0, 1.0);
        self
    }

    pub fn countries(mut self, countries: Vec<String>) -> Self {
        self.config.countries = countries;
        self
    }

    pub fn census_years(mut self, years: Vec<u32>) -> Self {
        self.config.census_years = years;
        self
    }

    pub fn country_override(
        mut self,
        source: impl Into<String>,
        page: usize,
        country: impl Into<String>,
    ) -> Self {
        self.config
            .country_overrides
            .insert((source.into(), page), country.into());
        self
    }

    pub fn country_overrides(mut self, overrides: HashMap<(String, usize), String>) -> Self {
        self.config.country_overrides = overrides;
        self
    }

    pub fn fuzzy_threshold(mut self, threshold: u8) -> Self {
        self.config.fuzzy_threshold = threshold.min(100);
        self
    }

    pub fn group_by_source(mut self, v: bool) -> Self {
        self.config.group_by_source = v;
        self
    }

    pub fn source_concurrency(mut self, n: usize) -> Self {
        self.config.source_concurrency = n.max(1);
        self
    }

    pub fn ocr_concurrency(mut self, n: usize) -> Self {
        self.config.ocr_concurrency = n.max(1);
        self
    }

    pub fn ocr_timeout_secs(mut self, secs: u64) -> Self {
        self.config.ocr_timeout_secs = secs;
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn aggregate_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.aggregate_dir = dir.into();
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ScanError> {
        let c = &self.config;
        if c.countries.is_empty() {
            return Err(ScanError::InvalidConfig(
                "Country list must not be empty".into(),
            ));
        }
        if c.countries.iter().any(|name| name.trim().is_empty()) {
            return Err(ScanError::InvalidConfig(
                "Country list must not contain blank entries".into(),
            ));
        }
        if c.fuzzy_threshold == 0 {
            return Err(ScanError::InvalidConfig(
                "Fuzzy threshold of 0 would match every page".into(),
            ));
        }
        Ok(self.config)
    }
}

/// The curated country list shipped as a default.
///
/// Callers with a different corpus replace this wholesale via
/// [`ExtractionConfigBuilder::countries`].
fn default_countries() -> Vec<String> {
    [
        "American Samoa",
        "Afghanistan",
        "Albania",
        "Algeria",
        "Australia",
        "Austria",
        "Azerbaijan",
        "Bangladesh",
        "Belgium",
        "Benin",
        "Botswana",
        "Brazil",
        "Burkina Faso",
        "Cabo Verde",
        "Canada",
        "Congo, Dem. Rep.",
        "Denmark",
        "Fiji",
        "Panama",
        "Yemen Arab Republic",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
