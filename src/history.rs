use std::collections::VecDeque;

use crate::models::ScanResult;

/// Number of scans kept on screen for the session.
pub const DEFAULT_HISTORY_CAP: usize = 5;

/// Most-recent-first log of the session's scans, never longer than `cap`.
#[derive(Debug, Clone)]
pub struct SessionHistory {
    entries: VecDeque<ScanResult>,
    cap: usize,
}

impl Default for SessionHistory {
    fn default() -> Self {
        Self::with_cap(DEFAULT_HISTORY_CAP)
    }
}

impl SessionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cap of zero is raised to one so the latest scan is always visible.
    pub fn with_cap(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            entries: VecDeque::with_capacity(cap + 1),
            cap,
        }
    }

    pub fn record(&mut self, result: ScanResult) {
        self.entries.push_front(result);
        self.entries.truncate(self.cap);
    }

    pub fn snapshot(&self) -> Vec<ScanResult> {
        self.entries.iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<&ScanResult> {
        self.entries.front()
    }

    /// Pretty JSON of the newest entry, for the debug panel.
    pub fn latest_json(&self) -> Option<String> {
        self.latest()
            .and_then(|result| serde_json::to_string_pretty(result).ok())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cap(&self) -> usize {
        self.cap
    }
}
