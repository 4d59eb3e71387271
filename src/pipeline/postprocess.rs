//! Post-processing: deterministic cleanup of raw OCR text.
//!
//! OCR backends reading 70-year-old tabular scans produce two recurring
//! artefacts that are cheaper to fix here than to prompt or retrain away:
//!
//! - Stray non-Latin glyphs and box-drawing fragments hallucinated from
//!   table rules and paper grain
//! - Thousands separators read as spaces, splitting `1 234 567` into three
//!   tokens that downstream numeric lookups will never match
//!
//! Each rule is a pure `&str → String` function with no shared state, applied
//! in a fixed order. Character filtering must run before number stitching so
//! the stitcher sees clean digit runs.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all post-processing rules to one region's raw OCR text.
pub fn clean_region_text(input: &str) -> String {
    let s = strip_disallowed_chars(input);
    stitch_numbers(&s)
}

// ── Rule 1: conservative character allow-list ────────────────────────────

static RE_DISALLOWED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[^a-zA-Z0-9\s.,!?"'()-]"#).unwrap());

/// Strip every character outside the alphanumeric-and-punctuation allow-list.
fn strip_disallowed_chars(input: &str) -> String {
    RE_DISALLOWED.replace_all(input, "").to_string()
}

// ── Rule 2: stitch split number tokens ───────────────────────────────────

static RE_SPLIT_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+( \d+)+").unwrap());

/// Merge runs of digit groups separated by single spaces into one token.
///
/// `12 345` and `1 234 567` are almost always one number whose thousands
/// separators the backend read as spaces. Runs separated by more than one
/// space are left alone: those are adjacent table cells.
fn stitch_numbers(input: &str) -> String {
    RE_SPLIT_NUMBER
        .replace_all(input, |caps: &regex::Captures<'_>| {
            caps[0].replace(' ', "")
        })
        .to_string()
}
