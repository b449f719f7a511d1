//! Gemini `generateContent` backend.
//!
//! The frame goes up as inline base64 JPEG together with the reading
//! instructions; the model answers with JSON constrained by `response_schema()`.

use std::time::Duration;

use anyhow::{Context, Result};
use base64::Engine;
use log::debug;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::capture::RawImage;
use crate::error::ScanError;
use crate::models::Roi;
use crate::settings::RecognizerSettings;

use super::{RawRecognition, RawSide, Recognizer};

const READING_INSTRUCTIONS: &str = "Analyze this image of a pair of shoes.
Task:
1. Identify the left shoe and the right shoe.
2. Read the numeric size printed on the sole of each shoe.
3. Prioritize Brazilian (BR) sizes, which are integers between 13 and 39.
4. Ignore EU or US labels if a standalone number in the 13-39 range is present.
5. Return null for detectedNumber if no clear number is visible or if it is outside the 13-39 range.";

pub struct GeminiRecognizer {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
    temperature: f64,
    bbox_grid: f64,
}

impl GeminiRecognizer {
    pub fn new(settings: &RecognizerSettings, api_key: String, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .build()
            .context("failed to build HTTP client for the recognizer")?;

        Ok(Self {
            http,
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            api_key,
            temperature: settings.temperature,
            bbox_grid: settings.bbox_grid,
        })
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }
}

impl Recognizer for GeminiRecognizer {
    async fn recognize(&self, image: &RawImage) -> Result<RawRecognition, ScanError> {
        let body = request_body(image, self.temperature, self.bbox_grid);

        let response = self
            .http
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ScanError::RecognitionStatus {
                status: status.as_u16(),
                body: truncate(&text, 200),
            });
        }

        debug!("Gemini answered {} bytes", text.len());
        parse_generate_response(&text, self.bbox_grid)
    }
}

pub fn request_body(image: &RawImage, temperature: f64, bbox_grid: f64) -> Value {
    let data = base64::engine::general_purpose::STANDARD.encode(&image.bytes);
    json!({
        "contents": [{
            "parts": [
                { "inlineData": { "mimeType": image.mime_type, "data": data } },
                { "text": READING_INSTRUCTIONS }
            ]
        }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": response_schema(bbox_grid),
            "temperature": temperature
        }
    })
}

fn response_schema(bbox_grid: f64) -> Value {
    let shoe = |side: &str| {
        json!({
            "type": "OBJECT",
            "properties": {
                "detectedNumber": {
                    "type": "STRING",
                    "description": format!("The numeric size found on the {side} shoe sole.")
                },
                "confidence": {
                    "type": "NUMBER",
                    "description": "Confidence score between 0 and 1."
                },
                "bbox": {
                    "type": "ARRAY",
                    "items": { "type": "NUMBER" },
                    "description": format!(
                        "Bounding box [ymin, xmin, ymax, xmax] on a 0-{bbox_grid} grid."
                    )
                }
            },
            "required": ["confidence"]
        })
    };

    json!({
        "type": "OBJECT",
        "properties": {
            "leftShoe": shoe("left"),
            "rightShoe": shoe("right"),
            "notes": { "type": "STRING", "description": "Short explanation of issues if any." }
        }
    })
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<ContentCandidate>,
}

#[derive(Debug, Deserialize)]
struct ContentCandidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShoePayload {
    left_shoe: Option<ShoeReading>,
    right_shoe: Option<ShoeReading>,
    notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShoeReading {
    detected_number: Option<Value>,
    confidence: Option<f64>,
    bbox: Option<Vec<f64>>,
}

impl ShoeReading {
    fn into_raw_side(self, bbox_grid: f64) -> RawSide {
        let value = self.detected_number.and_then(marking_text);
        // No marking, no confidence.
        let confidence = if value.is_some() {
            self.confidence.unwrap_or(0.0)
        } else {
            0.0
        };

        RawSide {
            value,
            confidence,
            bbox: self
                .bbox
                .as_deref()
                .and_then(|bbox| bbox_to_roi(bbox, bbox_grid)),
        }
    }
}

/// Extracts the size reading from a `generateContent` reply.
pub fn parse_generate_response(body: &str, bbox_grid: f64) -> Result<RawRecognition, ScanError> {
    let response: GenerateContentResponse = serde_json::from_str(body)?;

    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(ScanError::EmptyResponse);
    }

    let payload: ShoePayload = serde_json::from_str(&text)?;
    Ok(RawRecognition {
        left: payload.left_shoe.unwrap_or_default().into_raw_side(bbox_grid),
        right: payload.right_shoe.unwrap_or_default().into_raw_side(bbox_grid),
        notes: payload.notes.filter(|notes| !notes.trim().is_empty()),
    })
}

/// The schema asks for a string but numbers show up too. Blank means nothing was read.
fn marking_text(value: Value) -> Option<String> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Some(text),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// `[ymin, xmin, ymax, xmax]` on a `0..=grid` scale to a normalized `[x, y, w, h]`.
/// The grid is fixed by configuration and stated in the response schema.
pub fn bbox_to_roi(bbox: &[f64], grid: f64) -> Option<Roi> {
    let [ymin, xmin, ymax, xmax] = <[f64; 4]>::try_from(bbox).ok()?;
    if !bbox.iter().all(|v| v.is_finite()) || !grid.is_finite() || grid <= 0.0 {
        return None;
    }

    let norm = |v: f64| (v / grid).clamp(0.0, 1.0);
    let (x0, y0, x1, y1) = (norm(xmin), norm(ymin), norm(xmax), norm(ymax));
    if x1 < x0 || y1 < y0 {
        return None;
    }

    Some([x0, y0, x1 - x0, y1 - y0])
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
