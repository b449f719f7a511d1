use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Region descriptor `[x, y, w, h]`, normalized to the frame.
pub type Roi = [f64; 4];

/// Used when the recognizer reads the whole frame without localizing the marking.
pub const PLACEHOLDER_ROI: Roi = [0.0, 0.0, 0.0, 0.0];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScanStatus {
    Ok,
    Error,
    Warning,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Ok => "OK",
            ScanStatus::Error => "ERROR",
            ScanStatus::Warning => "WARNING",
        }
    }

    /// Large banner text shown on the kiosk result card.
    pub fn headline(&self) -> &'static str {
        match self {
            ScanStatus::Ok => "APPROVED",
            ScanStatus::Error => "CHECK PAIR",
            ScanStatus::Warning => "REPOSITION",
        }
    }
}

/// One reading of a size marking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShoeCandidate {
    pub value: Option<String>,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Roi>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SideReading {
    pub roi: Roi,
    pub candidates: Vec<ShoeCandidate>,
    /// What was read on this side, accepted or not.
    pub chosen: Option<String>,
    pub confidence: f64,
}

impl SideReading {
    pub fn empty() -> Self {
        Self {
            roi: PLACEHOLDER_ROI,
            candidates: Vec::new(),
            chosen: None,
            confidence: 0.0,
        }
    }

    /// Builds a side from a single raw reading. No reading means no candidates
    /// and zero confidence, whatever confidence the recognizer reported.
    pub fn from_raw(raw: Option<&str>, confidence: f64, bbox: Option<Roi>) -> Self {
        let Some(value) = raw else {
            return Self::empty();
        };

        let confidence = clamp_confidence(confidence);
        Self {
            roi: bbox.unwrap_or(PLACEHOLDER_ROI),
            candidates: vec![ShoeCandidate {
                value: Some(value.to_string()),
                confidence,
                bbox,
            }],
            chosen: Some(value.to_string()),
            confidence,
        }
    }

    /// Label for one side of a pair, `fallback` when nothing was read.
    pub fn label<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.chosen.as_deref().unwrap_or(fallback)
    }
}

/// Terminal record of a single scan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScanResult {
    pub scan_id: String,
    pub timestamp: DateTime<Utc>,
    pub left: SideReading,
    pub right: SideReading,
    #[serde(rename = "match")]
    pub is_match: bool,
    pub processing_time_ms: u64,
    pub device: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    pub notes: String,
    pub status: ScanStatus,
}

impl ScanResult {
    /// Canonical result for a scan whose capture or recognition step failed.
    pub fn failure(
        device: &str,
        notes: impl Into<String>,
        processing_time_ms: u64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            scan_id: new_scan_id(),
            timestamp,
            left: SideReading::empty(),
            right: SideReading::empty(),
            is_match: false,
            processing_time_ms,
            device: device.to_string(),
            image_id: None,
            notes: notes.into(),
            status: ScanStatus::Error,
        }
    }

    pub fn with_image_id(mut self, image_id: Option<String>) -> Self {
        self.image_id = image_id;
        self
    }

    /// `"23 | 23"`, with `?` for a side that produced no reading.
    pub fn pair_label(&self) -> String {
        format!("{} | {}", self.left.label("?"), self.right.label("?"))
    }

    /// Compact form used by history rows, `-` for a missing side.
    pub fn history_label(&self) -> String {
        format!("{} | {}", self.left.label("-"), self.right.label("-"))
    }
}

pub(crate) fn new_scan_id() -> String {
    Uuid::new_v4().to_string()
}

pub(crate) fn clamp_confidence(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
