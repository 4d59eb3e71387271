//! Remote OCR backend: region image over HTTP, tolerant JSON back.
//!
//! The region is JPEG-encoded and base64-wrapped into a small JSON request
//! body. The response parser accepts every shape the hosted backends are
//! known to produce — a flat `text`/`markdown` string, a `pages` array of
//! markdown pages, a `lines` array of text-bearing records, or a bare array
//! of geometry+text boxes — and pins everything else to
//! [`OcrOutput::Empty`].

use crate::error::OcrFailure;
use crate::ocr::{OcrEngine, OcrOutput, TextBox, TextLine};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use serde::Serialize;
use serde_json::Value;
use std::io::Cursor;
use std::time::Duration;
use tracing::debug;

/// An [`OcrEngine`] that POSTs regions to a hosted recognition endpoint.
pub struct RemoteOcrEngine {
    name: String,
    endpoint: String,
    api_key: Option<String>,
    model: Option<String>,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct OcrRequest<'a> {
    /// `data:image/jpeg;base64,...` payload.
    image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
}

impl RemoteOcrEngine {
    /// Build an engine for `endpoint`, with an optional bearer token.
    ///
    /// `timeout` bounds the whole HTTP call; the pipeline applies its own
    /// per-call timeout on top, so this is a network-level safety net.
    pub fn new(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, OcrFailure> {
        let name = name.into();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OcrFailure::Backend {
                backend: name.clone(),
                detail: e.to_string(),
            })?;
        Ok(Self {
            name,
            endpoint: endpoint.into(),
            api_key,
            model: None,
            client,
        })
    }

    /// Ask the endpoint for a specific recognition model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// JPEG-encode and base64-wrap a region for the request body.
    fn encode_region(&self, region: &DynamicImage) -> Result<String, OcrFailure> {
        let mut buf = Vec::new();
        region
            .to_rgb8()
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Jpeg)
            .map_err(|e| OcrFailure::Backend {
                backend: self.name.clone(),
                detail: format!("JPEG encoding failed: {e}"),
            })?;
        let b64 = STANDARD.encode(&buf);
        debug!(backend = %self.name, bytes = b64.len(), "encoded region");
        Ok(format!("data:image/jpeg;base64,{b64}"))
    }
}

#[async_trait]
impl OcrEngine for RemoteOcrEngine {
    fn name(&self) -> &str {
        &self.name
    }

    async fn extract(&self, region: &DynamicImage) -> Result<OcrOutput, OcrFailure> {
        let body = OcrRequest {
            image: self.encode_region(region)?,
            model: self.model.as_deref(),
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| OcrFailure::Backend {
            backend: self.name.clone(),
            detail: e.to_string(),
        })?;

        if !response.status().is_success() {
            return Err(OcrFailure::Backend {
                backend: self.name.clone(),
                detail: format!("HTTP {}", response.status()),
            });
        }

        let value: Value = response.json().await.map_err(|e| OcrFailure::BadResponse {
            backend: self.name.clone(),
            detail: e.to_string(),
        })?;

        Ok(parse_response(&value))
    }
}

/// Interpret a backend's JSON response as an [`OcrOutput`].
///
/// Recognised shapes, checked in order:
/// 1. `{"pages": [{"markdown"| "text": ...}, ...]}` — page-oriented backends
/// 2. `{"text" | "markdown": "..."}` — flat-text backends
/// 3. `{"lines": [...]}` — line-record backends
/// 4. `[...]` of objects with a `text` field — box-detection backends
///
/// Anything else is `Empty`: an unknown shape yields no text rather than a
/// structural guess.
pub fn parse_response(value: &Value) -> OcrOutput {
    if let Some(pages) = value.get("pages").and_then(Value::as_array) {
        let text: Vec<&str> = pages
            .iter()
            .filter_map(|p| {
                p.get("markdown")
                    .or_else(|| p.get("text"))
                    .and_then(Value::as_str)
            })
            .collect();
        if !text.is_empty() {
            return OcrOutput::Text(text.join("\n\n"));
        }
    }

    if let Some(text) = value
        .get("text")
        .or_else(|| value.get("markdown"))
        .and_then(Value::as_str)
    {
        return OcrOutput::Text(text.to_string());
    }

    if let Some(lines) = value.get("lines").and_then(Value::as_array) {
        let parsed: Vec<TextLine> = lines
            .iter()
            .filter_map(|l| serde_json::from_value(l.clone()).ok())
            .collect();
        if !parsed.is_empty() {
            return OcrOutput::Lines(parsed);
        }
    }

    if let Some(items) = value.as_array() {
        let parsed: Vec<TextBox> = items
            .iter()
            .filter_map(|item| serde_json::from_value(item.clone()).ok())
            .filter(|b: &TextBox| !b.text.is_empty())
            .collect();
        if !parsed.is_empty() {
            return OcrOutput::Boxes(parsed);
        }
    }

    OcrOutput::Empty
}
