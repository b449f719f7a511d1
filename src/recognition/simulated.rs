use std::time::Duration;

use rand::Rng;

use crate::capture::RawImage;
use crate::error::ScanError;
use crate::settings::RecognizerSettings;
use crate::verdict::BR_SIZE_RANGE;

use super::{RawRecognition, RawSide, Recognizer};

/// Offline stand-in for the recognition service, for demos and kiosk bring-up.
pub struct SimulatedRecognizer {
    latency: Duration,
    mismatch_rate: f64,
    miss_rate: f64,
    failure_rate: f64,
}

impl SimulatedRecognizer {
    pub fn new(latency: Duration, mismatch_rate: f64, miss_rate: f64, failure_rate: f64) -> Self {
        Self {
            latency,
            mismatch_rate: mismatch_rate.clamp(0.0, 1.0),
            miss_rate: miss_rate.clamp(0.0, 1.0),
            failure_rate: failure_rate.clamp(0.0, 1.0),
        }
    }

    pub fn from_settings(settings: &RecognizerSettings) -> Self {
        Self::new(
            Duration::from_millis(settings.simulated_latency_ms),
            0.15,
            0.1,
            0.05,
        )
    }

    fn draw(&self) -> Result<RawRecognition, ScanError> {
        let mut rng = rand::thread_rng();
        if rng.gen_bool(self.failure_rate) {
            return Err(ScanError::RecognitionUnavailable(
                "simulated service outage".into(),
            ));
        }

        let size = rng.gen_range(BR_SIZE_RANGE);
        let right_size = if size < *BR_SIZE_RANGE.end() && rng.gen_bool(self.mismatch_rate) {
            size + 1
        } else {
            size
        };

        let mut side = |size: u32| {
            if rng.gen_bool(self.miss_rate) {
                RawSide::default()
            } else {
                let value = size.to_string();
                RawSide::new(Some(&value), rng.gen_range(0.6..=0.99))
            }
        };
        let left = side(size);
        let right = side(right_size);

        Ok(RawRecognition {
            left,
            right,
            notes: None,
        })
    }
}

impl Recognizer for SimulatedRecognizer {
    async fn recognize(&self, _image: &RawImage) -> Result<RawRecognition, ScanError> {
        let outcome = self.draw();
        tokio::time::sleep(self.latency).await;
        outcome
    }
}
