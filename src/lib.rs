//! # scan2chunk
//!
//! Recover labelled text chunks from scanned pages of historical
//! multi-column census volumes.
//!
//! ## Why this crate?
//!
//! The agricultural census volumes of the mid-20th century were typeset in
//! two dense columns per page, country by country, and survive only as
//! scans. Generic PDF text tools produce garbled, out-of-order output on
//! them, and no OCR backend knows which country or census year a page
//! belongs to. This crate splits each page along its column gutter, drives
//! an OCR backend (with a fallback) per region, resolves country/year
//! provenance from the text and filename, repairs unresolved runs, and
//! aggregates pages into one logical document per (country, year, source)
//! for downstream retrieval.
//!
//! ## Pipeline Overview
//!
//! ```text
//! page image
//!  │
//!  ├─ 1. Preprocess  2× upscale, contrast boost
//!  ├─ 2. Segment     margin trim + gutter detection → header/left/right
//!  ├─ 3. Extract     OCR per region (primary → fallback), text cleanup
//!  ├─ 4. Resolve     country (override/exact/fuzzy) + year (patterns/filename)
//!  ├─ 5. Interpolate fill Unknown runs between agreeing neighbours
//!  └─ 6. Aggregate   (country, year[, source]) → one document, page order
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scan2chunk::{process_directory, ChunkStore, ExtractionConfig, OcrStack, RemoteOcrEngine};
//! use std::path::Path;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExtractionConfig::default();
//!     let engine = RemoteOcrEngine::new(
//!         "hosted-ocr",
//!         "https://ocr.example.net/v1/process",
//!         std::env::var("OCR_API_KEY").ok(),
//!         Duration::from_secs(90),
//!     )?;
//!     let stack = OcrStack::new(Arc::new(engine));
//!     let store = ChunkStore::new(&config);
//!     store.ensure_dirs().await?;
//!
//!     let output = process_directory(Path::new("data"), &stack, &config, Some(&store)).await?;
//!     println!("{} chunks, {} documents", output.records.len(), output.documents.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `scan2chunk` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! scan2chunk = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod aggregate;
pub mod config;
pub mod error;
pub mod interpolate;
pub mod ocr;
pub mod pipeline;
pub mod process;
pub mod record;
pub mod resolve;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use aggregate::aggregate;
pub use config::{ExtractionConfig, ExtractionConfigBuilder, SplitStrategy};
pub use error::{OcrFailure, PageFailure, ScanError};
pub use interpolate::{interpolate_unknown_countries, Relabel};
pub use ocr::remote::RemoteOcrEngine;
pub use ocr::{normalize, OcrEngine, OcrOutput, OcrStack, TextBox, TextLine};
pub use process::{process_directory, process_source, process_sources, BatchOutput, SourcePages, SourceReport};
pub use record::{AggregatedDocument, CountryYearKey, IndexRecord, PageImage, PageRecord, UNKNOWN};
pub use resolve::{extract_year, resolve_country, year_from_filename, Cursor};
pub use store::ChunkStore;
