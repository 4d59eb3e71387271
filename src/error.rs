//! Error types for the scan2chunk library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ScanError`] — **Fatal**: the batch cannot proceed at all (bad
//!   configuration, no readable input directory). Returned as
//!   `Err(ScanError)` from the top-level `process_*` functions.
//!
//! * [`PageFailure`] — **Non-fatal**: one region or page failed (OCR backend
//!   error, timeout, blank page) but the rest of the source is fine. Recorded
//!   on [`crate::process::SourceReport`] so callers can inspect partial
//!   success rather than losing the whole batch to one bad scan.
//!
//! Everything below a source is soft: a failed region degrades to empty text,
//! a failed page is dropped from the record sequence, a failed write is
//! logged and skipped. Only the two cases in [`ScanError`] abort a run.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the scan2chunk library.
///
/// Page- and region-level failures use [`PageFailure`] and are carried in
/// per-source reports rather than propagated here.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The input directory does not exist or contains no page images at all.
    #[error("No readable page images under '{path}'\nExpected one sub-directory of PNG/JPEG pages per source document.")]
    NoInput { path: PathBuf },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// A non-fatal failure scoped to a single page or region.
///
/// The extraction orchestrator never propagates these upward as `Err`; they
/// are collected so a run summary can say *why* a page produced no chunk.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum PageFailure {
    /// Both the primary and the fallback OCR backend failed for a region.
    #[error("Page {page}: OCR failed on {region}: {detail}")]
    OcrFailed {
        page: usize,
        region: String,
        detail: String,
    },

    /// An OCR call exceeded the per-call timeout; the region is treated as empty.
    #[error("Page {page}: OCR timed out after {secs}s on {region}")]
    Timeout {
        page: usize,
        region: String,
        secs: u64,
    },

    /// Every region of the page came back empty; no chunk was emitted.
    #[error("Page {page}: no text extracted, page dropped")]
    EmptyPage { page: usize },

    /// The page image file could not be decoded.
    #[error("Page {page}: unreadable image: {detail}")]
    UnreadableImage { page: usize, detail: String },
}

/// Failure reported by an [`crate::ocr::OcrEngine`] implementation.
///
/// Deliberately coarse: the orchestrator only ever reacts by falling back to
/// the secondary backend or by treating the region as empty, so backend
/// implementors are not forced into a taxonomy they cannot populate.
#[derive(Debug, Error)]
pub enum OcrFailure {
    /// The backend call itself failed (network, process, library error).
    #[error("OCR backend '{backend}' failed: {detail}")]
    Backend { backend: String, detail: String },

    /// The backend answered but the response could not be interpreted.
    #[error("OCR backend '{backend}' returned an unusable response: {detail}")]
    BadResponse { backend: String, detail: String },
}
