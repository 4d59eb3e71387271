//! Pipeline stages for page-to-text extraction.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets us
//! swap implementations (e.g. a different gutter heuristic) without
//! touching other stages.
//!
//! ## Data Flow
//!
//! ```text
//! preprocess ──▶ segment ──▶ extract ──▶ postprocess
//! (normalise)   (columns)   (OCR calls)  (cleanup)
//! ```
//!
//! 1. [`preprocess`] — upscale/contrast for the page, grayscale/denoise per
//!    region, and the statistical blank test
//! 2. [`segment`] — margin trim plus gutter detection; always falls back to
//!    the midpoint, so it never fails
//! 3. [`extract`] — drive the OCR backends with timeout and fallback; the
//!    only stage with network I/O
//! 4. [`postprocess`] — deterministic text cleanup (character allow-list,
//!    split-number stitching)

pub mod extract;
pub mod postprocess;
pub mod preprocess;
pub mod segment;
