use serde::{Deserialize, Serialize};

use crate::history::SessionHistory;
use crate::models::ScanResult;

/// Everything a presentation layer needs to draw the kiosk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSnapshot {
    pub current: Option<ScanResult>,
    pub is_scanning: bool,
    pub history: Vec<ScanResult>,
    /// Persistent banner while the camera cannot be read.
    pub camera_error: Option<String>,
}

/// Session state owned by the scan controller.
#[derive(Debug, Default)]
pub struct KioskState {
    pub current: Option<ScanResult>,
    pub history: SessionHistory,
    pub camera_error: Option<String>,
}

impl KioskState {
    pub fn new(history_cap: usize) -> Self {
        Self {
            current: None,
            history: SessionHistory::with_cap(history_cap),
            camera_error: None,
        }
    }

    /// Shows `result` and logs it. Every finished scan goes through here once.
    pub fn complete(&mut self, result: ScanResult) {
        self.current = Some(result.clone());
        self.history.record(result);
    }

    pub fn snapshot(&self, is_scanning: bool) -> ScanSnapshot {
        ScanSnapshot {
            current: self.current.clone(),
            is_scanning,
            history: self.history.snapshot(),
            camera_error: self.camera_error.clone(),
        }
    }
}
