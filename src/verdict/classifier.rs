use chrono::{DateTime, Utc};

use crate::models::{new_scan_id, ScanResult, ScanStatus, SideReading};
use crate::recognition::RawRecognition;

use super::range::{is_valid_reading, parse_size};

pub const NOTE_NO_VALID_SIZE: &str = "no valid size detected on either side; reposition.";
pub const NOTE_MISMATCH: &str = "mismatch: different sizes detected.";
pub const NOTE_OUT_OF_RANGE: &str = "sizes outside valid range.";

/// The part of a verdict that depends only on the two raw readings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub is_match: bool,
    pub status: ScanStatus,
    /// `None` keeps whatever note the recognizer sent.
    pub note: Option<&'static str>,
}

/// Applies the checkpoint rules, first rule wins:
/// 1. both valid and textually equal: OK
/// 2. neither side parses to a number: WARNING
/// 3. raw values differ: ERROR (mismatch)
/// 4. otherwise, equal but outside the range: ERROR (out of range)
///
/// Equality is on the raw strings, so `"023"` and `"23"` do not match.
pub fn judge(left_raw: Option<&str>, right_raw: Option<&str>) -> Verdict {
    let is_match =
        is_valid_reading(left_raw) && is_valid_reading(right_raw) && left_raw == right_raw;
    let nothing_parsed = parse_size(left_raw).is_none() && parse_size(right_raw).is_none();

    let (status, note) = if is_match {
        (ScanStatus::Ok, None)
    } else if nothing_parsed {
        (ScanStatus::Warning, Some(NOTE_NO_VALID_SIZE))
    } else if left_raw != right_raw {
        (ScanStatus::Error, Some(NOTE_MISMATCH))
    } else {
        (ScanStatus::Error, Some(NOTE_OUT_OF_RANGE))
    };

    Verdict {
        is_match,
        status,
        note,
    }
}

/// Turns raw recognition output into a full result stamped with the current time.
pub fn classify(raw: &RawRecognition, elapsed_ms: u64, device: &str) -> ScanResult {
    classify_at(raw, elapsed_ms, device, Utc::now())
}

pub fn classify_at(
    raw: &RawRecognition,
    elapsed_ms: u64,
    device: &str,
    timestamp: DateTime<Utc>,
) -> ScanResult {
    let left_raw = raw.left.value.as_deref();
    let right_raw = raw.right.value.as_deref();
    let verdict = judge(left_raw, right_raw);

    let notes = match verdict.note {
        Some(note) => note.to_string(),
        None => raw.notes.clone().unwrap_or_default(),
    };

    ScanResult {
        scan_id: new_scan_id(),
        timestamp,
        left: SideReading::from_raw(left_raw, raw.left.confidence, raw.left.bbox),
        right: SideReading::from_raw(right_raw, raw.right.confidence, raw.right.bbox),
        is_match: verdict.is_match,
        processing_time_ms: elapsed_ms,
        device: device.to_string(),
        image_id: None,
        notes,
        status: verdict.status,
    }
}
