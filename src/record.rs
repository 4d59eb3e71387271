//! Core value types: pages, records, keys, and aggregated documents.
//!
//! Everything here is plain data. The pipeline stages produce and transform
//! these values; only [`crate::store`] turns them into files. A
//! [`PageRecord`]'s `id` is assigned once, from `(source, page)`, and never
//! recomputed from its labels — the human-readable chunk *filename* is
//! label-derived and may change when the interpolator corrects a label, but
//! record identity does not.

use image::DynamicImage;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Sentinel label for an unresolved country or year.
///
/// A valid terminal value: downstream consumers receive it as an
/// unclassified bucket. It is never silently converted to an empty string.
pub const UNKNOWN: &str = "Unknown";

/// A single rasterised page, as delivered by the rasterization collaborator.
pub struct PageImage {
    /// Source document filename (e.g. `1950_1.pdf`).
    pub source: String,
    /// Zero-based page index within the source.
    pub index: usize,
    /// Pixel data.
    pub image: DynamicImage,
}

/// The unit the pipeline manipulates: one page's labels, text, and identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRecord {
    /// Source document filename.
    pub source: String,
    /// Zero-based page index within the source.
    pub page: usize,
    /// Resolved country label, or [`UNKNOWN`].
    pub country: String,
    /// Resolved year label, or [`UNKNOWN`].
    pub year: String,
    /// Full page text, beginning with the metadata header block.
    pub text: String,
    /// Stable logical id, `"{source}:page{page}"`.
    pub id: String,
}

impl PageRecord {
    /// Create a record with the standard header block prepended to `body`.
    pub fn new(
        source: impl Into<String>,
        page: usize,
        country: impl Into<String>,
        year: impl Into<String>,
        body: &str,
    ) -> Self {
        let source = source.into();
        let country = country.into();
        let year = year.into();
        let text = format!("{}{}", header_block(&country, &year, page), body);
        let id = format!("{source}:page{page}");
        Self {
            source,
            page,
            country,
            year,
            text,
            id,
        }
    }

    /// The label-derived chunk filename for this record's current state.
    pub fn chunk_file_name(&self) -> String {
        sanitize_name(&format!(
            "{}_{}_page{}.txt",
            self.country, self.year, self.page
        ))
    }

    /// Replace this record's country label, rewriting the text header.
    ///
    /// Only the header block changes; the body is preserved byte-for-byte.
    pub fn relabel_country(&mut self, country: &str) {
        self.country = country.to_string();
        let body = body_of(&self.text);
        self.text = format!(
            "{}{}",
            header_block(&self.country, &self.year, self.page),
            body
        );
    }

    /// Metadata record exposed to the indexing collaborator.
    pub fn index_record(&self) -> IndexRecord {
        IndexRecord {
            country: self.country.clone(),
            year: self.year.clone(),
            source: self.source.clone(),
            page: Some(self.page),
            id: self.id.clone(),
            content: self.text.clone(),
        }
    }
}

/// Grouping key for aggregation: (country, year) with an optional source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CountryYearKey {
    pub country: String,
    pub year: String,
    /// Present when grouping by source as well.
    pub source: Option<String>,
}

impl CountryYearKey {
    /// Deterministic id for the aggregate built from this key.
    pub fn id(&self) -> String {
        match &self.source {
            Some(source) => format!("{source}:{}:{}", self.country, self.year),
            None => format!("{}:{}", self.country, self.year),
        }
    }

    /// The label-derived file name for the aggregated document.
    pub fn aggregate_file_name(&self) -> String {
        sanitize_name(&format!("{}_{}.txt", self.country, self.year))
    }
}

/// Terminal artifact of the core: one logical document per key.
#[derive(Debug, Clone)]
pub struct AggregatedDocument {
    pub key: CountryYearKey,
    /// Constituent page texts in page order, each followed by an
    /// `--- END OF PAGE <n> ---` delimiter line.
    pub text: String,
    pub id: String,
}

impl AggregatedDocument {
    /// Metadata record exposed to the indexing collaborator.
    pub fn index_record(&self) -> IndexRecord {
        IndexRecord {
            country: self.key.country.clone(),
            year: self.key.year.clone(),
            source: self.key.source.clone().unwrap_or_default(),
            page: None,
            id: self.id.clone(),
            content: self.text.clone(),
        }
    }
}

/// What the external indexing collaborator receives for each record or
/// aggregate: flat, serialisable provenance plus content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexRecord {
    pub country: String,
    pub year: String,
    pub source: String,
    /// Page index for page-level records; `None` for aggregates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
    pub id: String,
    pub content: String,
}

/// The fixed-format metadata header prepended to every chunk.
pub fn header_block(country: &str, year: &str, page: usize) -> String {
    format!("Country: {country}\nYear: {year}\nPage: {page}\n\n")
}

/// Everything after the header block (the first blank line); the whole text
/// when no blank line exists.
pub fn body_of(text: &str) -> &str {
    match text.split_once("\n\n") {
        Some((_, body)) => body,
        None => text,
    }
}

static RE_UNSAFE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\-.]").unwrap());

/// Replace filesystem-hostile characters with `_`, keeping word characters,
/// dashes, and dots.
pub fn sanitize_name(name: &str) -> String {
    RE_UNSAFE.replace_all(name, "_").to_string()
}
