use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock, time::Duration};

use crate::capture::FrameLimits;
use crate::history::DEFAULT_HISTORY_CAP;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum RecognizerKind {
    Gemini,
    Simulated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RecognizerSettings {
    pub kind: RecognizerKind,
    pub model: String,
    pub endpoint: String,
    pub temperature: f64,
    /// Scale of the bounding boxes the model is asked to return.
    pub bbox_grid: f64,
    pub simulated_latency_ms: u64,
}

impl Default for RecognizerSettings {
    fn default() -> Self {
        Self {
            kind: RecognizerKind::Gemini,
            model: "gemini-2.5-flash".into(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta".into(),
            temperature: 0.2,
            bbox_grid: 1000.0,
            simulated_latency_ms: 600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FrameSourceSettings {
    Still { path: PathBuf },
    Snapshot { url: String },
}

impl Default for FrameSourceSettings {
    fn default() -> Self {
        FrameSourceSettings::Still {
            path: PathBuf::from("/var/lib/klin/frame.jpg"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct KioskSettings {
    /// Tag written on every result to identify this kiosk configuration.
    pub device: String,
    pub history_cap: usize,
    pub recognition_timeout_ms: u64,
    pub max_frame_width: u32,
    pub jpeg_quality: u8,
    pub frame_source: FrameSourceSettings,
    pub recognizer: RecognizerSettings,
}

impl Default for KioskSettings {
    fn default() -> Self {
        Self {
            device: "kiosk-rust-gemini".into(),
            history_cap: DEFAULT_HISTORY_CAP,
            recognition_timeout_ms: 15_000,
            max_frame_width: 800,
            jpeg_quality: 80,
            frame_source: FrameSourceSettings::default(),
            recognizer: RecognizerSettings::default(),
        }
    }
}

impl KioskSettings {
    pub fn recognition_timeout(&self) -> Duration {
        Duration::from_millis(self.recognition_timeout_ms.max(1))
    }

    pub fn frame_limits(&self) -> FrameLimits {
        FrameLimits {
            max_width: self.max_frame_width,
            jpeg_quality: self.jpeg_quality,
        }
    }
}

/// Recognizer API key from the environment, `GEMINI_API_KEY` first.
pub fn api_key_from_env() -> Option<String> {
    first_api_key(|name| std::env::var(name).ok())
}

/// Blank values are skipped so a later variable can still supply the key.
fn first_api_key(lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
    ["GEMINI_API_KEY", "API_KEY"]
        .iter()
        .find_map(|name| lookup(*name).filter(|key| !key.trim().is_empty()))
}

/// `KLIN_DEBUG=1` forces the simulated recognizer.
pub fn debug_mode_from_env() -> bool {
    std::env::var("KLIN_DEBUG")
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<KioskSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log::warn!("Ignoring unreadable settings in {}: {err}", path.display());
                KioskSettings::default()
            })
        } else {
            KioskSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn kiosk(&self) -> KioskSettings {
        match self.data.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn update(&self, settings: KioskSettings) -> Result<()> {
        let mut guard = match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = settings;
        self.persist(&guard)
    }

    fn persist(&self, data: &KioskSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
