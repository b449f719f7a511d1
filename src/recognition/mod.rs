pub mod gemini;
pub mod simulated;

use std::future::Future;

use anyhow::{bail, Result};
use log::{info, warn};

use crate::capture::RawImage;
use crate::error::ScanError;
use crate::models::Roi;
use crate::settings::{KioskSettings, RecognizerKind};

pub use gemini::GeminiRecognizer;
pub use simulated::SimulatedRecognizer;

/// What the recognizer read on one shoe, before any validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSide {
    pub value: Option<String>,
    pub confidence: f64,
    pub bbox: Option<Roi>,
}

impl RawSide {
    pub fn new(value: Option<&str>, confidence: f64) -> Self {
        Self {
            value: value.map(str::to_string),
            confidence,
            bbox: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecognition {
    pub left: RawSide,
    pub right: RawSide,
    pub notes: Option<String>,
}

impl RawRecognition {
    pub fn pair(
        left: Option<&str>,
        right: Option<&str>,
        left_confidence: f64,
        right_confidence: f64,
    ) -> Self {
        Self {
            left: RawSide::new(left, left_confidence),
            right: RawSide::new(right, right_confidence),
            notes: None,
        }
    }
}

/// External service that reads the size marking on each shoe of a frame.
pub trait Recognizer: Send + Sync {
    fn recognize(
        &self,
        image: &RawImage,
    ) -> impl Future<Output = Result<RawRecognition, ScanError>> + Send;
}

pub enum RecognizerBackend {
    Gemini(GeminiRecognizer),
    Simulated(SimulatedRecognizer),
}

impl RecognizerBackend {
    pub fn from_settings(
        settings: &KioskSettings,
        api_key: Option<String>,
        force_simulated: bool,
    ) -> Result<Self> {
        if force_simulated || settings.recognizer.kind == RecognizerKind::Simulated {
            info!("Using simulated recognizer");
            return Ok(Self::Simulated(SimulatedRecognizer::from_settings(
                &settings.recognizer,
            )));
        }

        let Some(api_key) = api_key.filter(|key| !key.trim().is_empty()) else {
            warn!("Gemini recognizer selected but no API key is set");
            bail!("set GEMINI_API_KEY (or API_KEY), or switch the recognizer to \"simulated\"");
        };

        info!("Using Gemini recognizer with model {}", settings.recognizer.model);
        Ok(Self::Gemini(GeminiRecognizer::new(
            &settings.recognizer,
            api_key,
            settings.recognition_timeout(),
        )?))
    }

    pub fn name(&self) -> &'static str {
        match self {
            RecognizerBackend::Gemini(_) => "gemini",
            RecognizerBackend::Simulated(_) => "simulated",
        }
    }
}

impl Recognizer for RecognizerBackend {
    async fn recognize(&self, image: &RawImage) -> Result<RawRecognition, ScanError> {
        match self {
            RecognizerBackend::Gemini(gemini) => gemini.recognize(image).await,
            RecognizerBackend::Simulated(simulated) => simulated.recognize(image).await,
        }
    }
}
