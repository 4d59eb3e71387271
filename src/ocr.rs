//! The OCR backend seam: an object-safe async trait plus a typed result
//! union.
//!
//! Backends differ wildly in what they return — a flat markdown string, a
//! list of recognised lines with per-line confidence, or geometry-paired
//! text boxes. Rather than walking arbitrary nested structures, every
//! backend response is forced into [`OcrOutput`] up front and a single
//! [`normalize`] function pattern-matches on the variant. Shapes that fit
//! none of the variants become [`OcrOutput::Empty`] — "no text", never a
//! guess.

pub mod remote;

use crate::error::OcrFailure;
use async_trait::async_trait;
use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// An opaque text-producing service reading one region image.
///
/// Implementations must be cheap to share (`&self` methods only); the
/// pipeline holds them behind `Arc<dyn OcrEngine>` and bounds concurrent
/// calls with a semaphore.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Short backend name used in logs and failure reports.
    fn name(&self) -> &str;

    /// Read text from one region. May fail; the orchestrator treats any
    /// error (and any all-whitespace success) as grounds for fallback.
    async fn extract(&self, region: &DynamicImage) -> Result<OcrOutput, OcrFailure>;
}

/// The configured backends in invocation order: a primary engine and an
/// optional fallback tried when the primary fails or answers with only
/// whitespace.
#[derive(Clone)]
pub struct OcrStack {
    pub primary: std::sync::Arc<dyn OcrEngine>,
    pub fallback: Option<std::sync::Arc<dyn OcrEngine>>,
}

impl OcrStack {
    pub fn new(primary: std::sync::Arc<dyn OcrEngine>) -> Self {
        Self {
            primary,
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: std::sync::Arc<dyn OcrEngine>) -> Self {
        self.fallback = Some(fallback);
        self
    }
}

/// One recognised line: a mapping with text-bearing keys.
///
/// When both `text` and `transcription` are present, `text` wins — the
/// priority is pinned rather than left to key-iteration order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextLine {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub transcription: Option<String>,
    #[serde(default)]
    pub confidence: Option<f32>,
}

impl TextLine {
    /// The line's text under the pinned key priority.
    pub fn content(&self) -> Option<&str> {
        self.text
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| self.transcription.as_deref().filter(|s| !s.trim().is_empty()))
    }
}

/// One detected region: geometry paired with its recognised string.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextBox {
    /// Polygon or rectangle corner coordinates; kept only for ordering
    /// debug, never interpreted.
    #[serde(default)]
    pub geometry: Vec<[f32; 2]>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub score: Option<f32>,
}

/// Everything a backend may legally answer with.
#[derive(Debug, Clone)]
pub enum OcrOutput {
    /// A flat text/markdown blob.
    Text(String),
    /// Recognised lines in reading order.
    Lines(Vec<TextLine>),
    /// Geometry-paired boxes in detection order.
    Boxes(Vec<TextBox>),
    /// The backend produced nothing usable.
    Empty,
}

impl OcrOutput {
    pub fn is_empty(&self) -> bool {
        matches!(self, OcrOutput::Empty)
    }
}

/// True when the string contains at least one alphanumeric character.
fn has_alnum(s: &str) -> bool {
    s.chars().any(|c| c.is_alphanumeric())
}

/// Flatten any [`OcrOutput`] into plain text: an ordered list of unique,
/// non-empty, alphanumeric-bearing strings joined by newlines.
///
/// Duplicates are dropped on first-seen order — backends that report the
/// same line from overlapping detection passes would otherwise double every
/// row of a table.
pub fn normalize(output: &OcrOutput) -> String {
    let candidates: Vec<&str> = match output {
        OcrOutput::Text(text) => vec![text.as_str()],
        OcrOutput::Lines(lines) => lines.iter().filter_map(|l| l.content()).collect(),
        OcrOutput::Boxes(boxes) => boxes.iter().map(|b| b.text.as_str()).collect(),
        OcrOutput::Empty => Vec::new(),
    };

    let mut seen = std::collections::HashSet::new();
    let mut unique = Vec::new();
    for candidate in candidates {
        let trimmed = candidate.trim();
        if trimmed.is_empty() || !has_alnum(trimmed) {
            continue;
        }
        if seen.insert(trimmed.to_string()) {
            unique.push(trimmed);
        }
    }
    unique.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(text: Option<&str>, transcription: Option<&str>) -> TextLine {
        TextLine {
            text: text.map(String::from),
            transcription: transcription.map(String::from),
            confidence: None,
        }
    }

    #[test]
    fn normalize_flat_text() {
        let out = OcrOutput::Text("  Wheat 120  ".into());
        assert_eq!(normalize(&out), "Wheat 120");
    }

    #[test]
    fn normalize_drops_non_alnum_entries() {
        let out = OcrOutput::Boxes(vec![
            TextBox {
                text: "---".into(),
                ..Default::default()
            },
            TextBox {
                text: "Rye 45".into(),
                ..Default::default()
            },
        ]);
        assert_eq!(normalize(&out), "Rye 45");
    }

    #[test]
    fn normalize_dedups_preserving_order() {
        let out = OcrOutput::Lines(vec![
            line(Some("Oats"), None),
            line(Some("Barley"), None),
            line(Some("Oats"), None),
        ]);
        assert_eq!(normalize(&out), "Oats\nBarley");
    }

    #[test]
    fn text_key_beats_transcription() {
        let l = line(Some("from text"), Some("from transcription"));
        assert_eq!(l.content(), Some("from text"));
    }

    #[test]
    fn blank_text_key_falls_through_to_transcription() {
        let l = line(Some("   "), Some("fallback"));
        assert_eq!(l.content(), Some("fallback"));
    }

    #[test]
    fn empty_output_normalizes_to_empty_string() {
        assert_eq!(normalize(&OcrOutput::Empty), "");
        assert_eq!(normalize(&OcrOutput::Lines(Vec::new())), "");
    }
}
