//! Full-frame text detection through the cloud Vision REST API.

use anyhow::{Context, Result, anyhow};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use super::{BoundingBox, RecognizedToken};
use crate::error::{ScoreError, ScoreResult};

const ANNOTATE_ENDPOINT: &str = "https://vision.googleapis.com/v1/images:annotate";

#[derive(Debug, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<ImageResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageResponse {
    #[serde(default)]
    text_annotations: Vec<TextAnnotation>,
    error: Option<ApiStatus>,
}

#[derive(Debug, Deserialize)]
struct ApiStatus {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TextAnnotation {
    #[serde(default)]
    description: String,
    bounding_poly: Option<BoundingPoly>,
}

#[derive(Debug, Default, Deserialize)]
struct BoundingPoly {
    #[serde(default)]
    vertices: Vec<Vertex>,
}

/// The API omits zero coordinates.
#[derive(Debug, Default, Clone, Copy, Deserialize)]
struct Vertex {
    #[serde(default)]
    x: i32,
    #[serde(default)]
    y: i32,
}

impl TextAnnotation {
    fn into_token(self) -> RecognizedToken {
        let vertices = self.bounding_poly.map(|p| p.vertices).unwrap_or_default();
        let top_left = vertices.first().copied().unwrap_or_default();
        let bottom_right = vertices.get(2).copied().unwrap_or_default();
        RecognizedToken::new(
            self.description,
            BoundingBox::new(top_left.x, top_left.y, bottom_right.x, bottom_right.y),
        )
    }
}

pub struct VisionClient {
    client: Client,
    api_key: String,
    endpoint: String,
}

impl VisionClient {
    pub fn new(client: Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            endpoint: ANNOTATE_ENDPOINT.to_string(),
        }
    }

    /// Detects every text fragment in the image. The first token spans the whole text area.
    pub fn detect_text(&self, image: &[u8]) -> ScoreResult<Vec<RecognizedToken>> {
        let tokens = self.annotate(image).map_err(ScoreError::engine)?;
        info!("Cloud OCR returned {} tokens", tokens.len());
        Ok(tokens)
    }

    fn annotate(&self, image: &[u8]) -> Result<Vec<RecognizedToken>> {
        let body = json!({
            "requests": [{
                "image": { "content": STANDARD.encode(image) },
                "features": [{ "type": "TEXT_DETECTION" }],
            }]
        });

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .context("text detection request failed")?;

        let status = response.status();
        let text = response.text().context("failed to read text detection response")?;
        if !status.is_success() {
            return Err(anyhow!("text detection returned HTTP {}: {}", status, text.trim()));
        }

        parse_annotations(&text)
    }
}

/// Converts an `images:annotate` response body into tokens.
pub fn parse_annotations(body: &str) -> Result<Vec<RecognizedToken>> {
    let parsed: AnnotateResponse =
        serde_json::from_str(body).context("unexpected text detection response")?;

    let Some(first) = parsed.responses.into_iter().next() else {
        return Ok(Vec::new());
    };
    if let Some(error) = first.error {
        return Err(anyhow!("text detection error {}: {}", error.code, error.message));
    }

    debug!("{} text annotations", first.text_annotations.len());
    Ok(first
        .text_annotations
        .into_iter()
        .map(TextAnnotation::into_token)
        .collect())
}
