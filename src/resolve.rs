//! Metadata resolution: country and year labels for a page.
//!
//! Country resolution precedence (first match wins):
//! 1. the manual override table keyed by (source filename, page index),
//! 2. exact case-insensitive substring match of a curated country name,
//! 3. best fuzzy partial-ratio score at or above the configured threshold.
//!
//! Anything else is [`UNKNOWN`] — per page, with no carry-forward: runs of
//! unresolved pages are the [`crate::interpolate`] pass's input, so filling
//! them here would destroy the very structure it needs.
//!
//! Year resolution reads the page text for a slash range (`1971/72`), a dash
//! range (`1950-1951`, en-dash tolerated), or a bare four-digit year, and
//! otherwise carries the current value forward via [`Cursor`] — initialised
//! from the first configured census year found in the source filename.

use crate::config::ExtractionConfig;
use crate::record::UNKNOWN;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Resolve the country label for one page.
pub fn resolve_country(
    config: &ExtractionConfig,
    source: &str,
    page: usize,
    text: &str,
) -> String {
    if let Some(country) = config.country_overrides.get(&(source.to_string(), page)) {
        debug!(source, page, country = %country, "manual country override");
        return country.clone();
    }

    if text.is_empty() {
        return UNKNOWN.to_string();
    }

    if let Some(country) = exact_country(config, text) {
        return country.to_string();
    }

    if let Some(country) = fuzzy_country(config, text) {
        return country.to_string();
    }

    UNKNOWN.to_string()
}

/// Exact case-insensitive substring match against the curated list.
fn exact_country<'a>(config: &'a ExtractionConfig, text: &str) -> Option<&'a str> {
    let text_lower = text.to_lowercase();
    config
        .countries
        .iter()
        .find(|country| text_lower.contains(&country.to_lowercase()))
        .map(String::as_str)
}

/// Best fuzzy partial-ratio match at or above the configured threshold.
///
/// A strictly-greater comparison keeps the earliest curated-list entry on
/// equal scores, pinning the tie-break to list order.
fn fuzzy_country<'a>(config: &'a ExtractionConfig, text: &str) -> Option<&'a str> {
    let text_lower = text.to_lowercase();
    let mut best: Option<&str> = None;
    let mut best_score = 0.0f64;

    for country in &config.countries {
        let score =
            rapidfuzz::fuzz::partial_ratio(country.to_lowercase().chars(), text_lower.chars());
        if score > best_score {
            best_score = score;
            best = Some(country);
        }
    }

    if best_score >= config.fuzzy_threshold as f64 {
        debug!(country = best, score = best_score, "fuzzy country match");
        best
    } else {
        None
    }
}

static RE_SLASH_RANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(19|20)\d{2}/\d{2}\b").unwrap());
static RE_DASH_RANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(19|20)\d{2}\s*[–-]\s*(19|20)?\d{2}\b").unwrap());
static RE_SINGLE_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(19|20)\d{2}\b").unwrap());

/// Extract a year label from page text; [`UNKNOWN`] when nothing matches.
///
/// Checked in order: slash range (normalised to a dash), dash range
/// (en-dash normalised to ASCII), bare four-digit year.
pub fn extract_year(text: &str) -> String {
    if text.is_empty() {
        return UNKNOWN.to_string();
    }

    if let Some(m) = RE_SLASH_RANGE.find(text) {
        return m.as_str().replace('/', "-");
    }

    if let Some(m) = RE_DASH_RANGE.find(text) {
        return m.as_str().replace('–', "-");
    }

    if let Some(m) = RE_SINGLE_YEAR.find(text) {
        return m.as_str().to_string();
    }

    UNKNOWN.to_string()
}

/// First configured census year whose decimal form occurs in the filename.
pub fn year_from_filename(config: &ExtractionConfig, filename: &str) -> Option<String> {
    config
        .census_years
        .iter()
        .map(|year| year.to_string())
        .find(|year| filename.contains(year.as_str()))
}

/// The carry-forward accumulator threaded through one source's page fold.
///
/// Making the "current year" an explicit value (instead of a mutable local
/// scattered across a loop) keeps the dependency on processing order visible
/// and lets the fold be tested without a pipeline around it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    /// The year used to tag pages until a later page resolves a new one.
    pub year: String,
}

impl Cursor {
    /// Start a source: the year defaults to the filename-derived census
    /// year when present.
    pub fn for_source(config: &ExtractionConfig, filename: &str) -> Self {
        Self {
            year: year_from_filename(config, filename).unwrap_or_else(|| UNKNOWN.to_string()),
        }
    }

    /// Feed one page's text through the cursor; returns the year label the
    /// page should carry, updating the current value when the text resolves
    /// a new one.
    pub fn observe(&mut self, text: &str) -> String {
        let resolved = extract_year(text);
        if resolved != UNKNOWN {
            self.year = resolved;
        }
        self.year.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractionConfig;

    fn config() -> ExtractionConfig {
        ExtractionConfig::builder().build().unwrap()
    }

    #[test]
    fn slash_range_normalised_to_dash() {
        assert_eq!(extract_year("crop year 1971/72"), "1971-72");
    }

    #[test]
    fn dash_range_normalises_en_dash() {
        assert_eq!(extract_year("covering 1950–1951"), "1950-1951");
        assert_eq!(extract_year("covering 1950-1951"), "1950-1951");
    }

    #[test]
    fn bare_year_matches() {
        assert_eq!(extract_year("census of 1950"), "1950");
    }

    #[test]
    fn no_year_is_unknown() {
        assert_eq!(extract_year("no digits here"), UNKNOWN);
        assert_eq!(extract_year("only 123 and 12345 digits"), UNKNOWN);
    }

    #[test]
    fn slash_wins_over_dash_and_single() {
        assert_eq!(extract_year("1950-1951 then 1971/72"), "1971-72");
    }

    #[test]
    fn exact_substring_match_is_case_insensitive() {
        let c = config();
        assert_eq!(resolve_country(&c, "x.pdf", 0, "CENSUS OF CANADA 1950"), "Canada");
    }

    #[test]
    fn manual_override_beats_exact_text_match() {
        let c = ExtractionConfig::builder()
            .country_override("1950_1.pdf", 0, "American Samoa")
            .build()
            .unwrap();
        // Text names a different country exactly; the override still wins.
        let got = resolve_country(&c, "1950_1.pdf", 0, "Census of Australia");
        assert_eq!(got, "American Samoa");
        // Other pages of the same source are not affected.
        assert_eq!(resolve_country(&c, "1950_1.pdf", 1, "Census of Australia"), "Australia");
    }

    #[test]
    fn unresolvable_text_is_unknown() {
        let c = config();
        assert_eq!(resolve_country(&c, "x.pdf", 0, "illegible table fragment"), UNKNOWN);
        assert_eq!(resolve_country(&c, "x.pdf", 0, ""), UNKNOWN);
    }

    #[test]
    fn fuzzy_match_accepted_at_threshold_rejected_above_score() {
        // partial_ratio("abcd", "abxy") is exactly 50.0: an indel distance
        // of 4 over a combined length of 8.
        let base = ExtractionConfig::builder().countries(vec!["abcd".into()]);
        let at = base.fuzzy_threshold(50).build().unwrap();
        assert_eq!(resolve_country(&at, "x.pdf", 0, "abxy"), "abcd");

        let above = ExtractionConfig::builder()
            .countries(vec!["abcd".into()])
            .fuzzy_threshold(51)
            .build()
            .unwrap();
        assert_eq!(resolve_country(&above, "x.pdf", 0, "abxy"), UNKNOWN);
    }

    #[test]
    fn fuzzy_tie_keeps_earliest_list_entry() {
        let c = ExtractionConfig::builder()
            .countries(vec!["abcd".into(), "abcz".into()])
            .fuzzy_threshold(50)
            .build()
            .unwrap();
        // Both score identically against "abxy"; the first entry wins.
        assert_eq!(resolve_country(&c, "x.pdf", 0, "abxy"), "abcd");
    }

    #[test]
    fn fuzzy_tolerates_ocr_noise_in_real_names() {
        let c = config();
        // "canadq" — a one-glyph OCR slip — defeats the exact substring
        // match but still clears the default fuzzy threshold.
        assert_eq!(resolve_country(&c, "x.pdf", 0, "census of canadq, farms"), "Canada");
    }

    #[test]
    fn year_from_filename_uses_census_list_order() {
        let c = config();
        assert_eq!(year_from_filename(&c, "1950_2SamoaFiji.pdf"), Some("1950".into()));
        assert_eq!(year_from_filename(&c, "notes.pdf"), None);
    }

    #[test]
    fn cursor_carries_year_forward() {
        let c = config();
        let mut cursor = Cursor::for_source(&c, "1950_1.pdf");
        assert_eq!(cursor.year, "1950");

        // Page with no year keeps the filename default.
        assert_eq!(cursor.observe("no label at all"), "1950");
        // A resolved year replaces the current value...
        assert_eq!(cursor.observe("harvest of 1960"), "1960");
        // ...and tags subsequent unlabelled pages.
        assert_eq!(cursor.observe("continuation table"), "1960");
    }

    #[test]
    fn cursor_without_filename_year_starts_unknown() {
        let c = config();
        let mut cursor = Cursor::for_source(&c, "unnumbered.pdf");
        assert_eq!(cursor.year, UNKNOWN);
        assert_eq!(cursor.observe("plain text"), UNKNOWN);
    }
}
