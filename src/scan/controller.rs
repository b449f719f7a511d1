use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use chrono::Utc;
use tokio::sync::{watch, Mutex};

use crate::{
    capture::{compute_fingerprint, CameraSource, FrameSource, RawImage},
    error::ScanError,
    models::ScanResult,
    recognition::{Recognizer, RecognizerBackend},
    settings::KioskSettings,
    verdict::classify,
};

use super::{KioskState, ScanSnapshot};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

pub type KioskController = ScanController<CameraSource, RecognizerBackend>;

#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub device: String,
    pub history_cap: usize,
    pub recognition_timeout: Duration,
}

impl From<&KioskSettings> for ScanConfig {
    fn from(settings: &KioskSettings) -> Self {
        Self {
            device: settings.device.clone(),
            history_cap: settings.history_cap,
            recognition_timeout: settings.recognition_timeout(),
        }
    }
}

/// A scan that did not reach the classifier.
struct ScanFailure {
    error: ScanError,
    elapsed_ms: u64,
}

/// Clears the in-flight flag when dropped, whatever path the scan took.
struct InFlightGuard {
    flag: Arc<AtomicBool>,
}

impl InFlightGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag: flag.clone() })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Runs scans end to end and owns the session state shown by the kiosk.
pub struct ScanController<F, R> {
    frames: Arc<F>,
    recognizer: Arc<R>,
    state: Arc<Mutex<KioskState>>,
    in_flight: Arc<AtomicBool>,
    updates: Arc<watch::Sender<ScanSnapshot>>,
    device: Arc<str>,
    recognition_timeout: Duration,
}

impl<F, R> Clone for ScanController<F, R> {
    fn clone(&self) -> Self {
        Self {
            frames: Arc::clone(&self.frames),
            recognizer: Arc::clone(&self.recognizer),
            state: Arc::clone(&self.state),
            in_flight: Arc::clone(&self.in_flight),
            updates: Arc::clone(&self.updates),
            device: Arc::clone(&self.device),
            recognition_timeout: self.recognition_timeout,
        }
    }
}

impl<F, R> ScanController<F, R>
where
    F: FrameSource,
    R: Recognizer,
{
    pub fn new(frames: F, recognizer: R, config: ScanConfig) -> Self {
        let (updates, _) = watch::channel(ScanSnapshot::default());
        Self {
            frames: Arc::new(frames),
            recognizer: Arc::new(recognizer),
            state: Arc::new(Mutex::new(KioskState::new(config.history_cap))),
            in_flight: Arc::new(AtomicBool::new(false)),
            updates: Arc::new(updates),
            device: Arc::from(config.device),
            recognition_timeout: config.recognition_timeout,
        }
    }

    /// Receives a fresh snapshot after every state change.
    pub fn subscribe(&self) -> watch::Receiver<ScanSnapshot> {
        self.updates.subscribe()
    }

    pub fn is_scanning(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub async fn snapshot(&self) -> ScanSnapshot {
        let is_scanning = self.is_scanning();
        self.state.lock().await.snapshot(is_scanning)
    }

    pub async fn history(&self) -> Vec<ScanResult> {
        self.state.lock().await.history.snapshot()
    }

    /// Pretty JSON of the newest history entry, for the debug view.
    pub async fn latest_json(&self) -> Option<String> {
        self.state.lock().await.history.latest_json()
    }

    /// Clears the displayed result. History is left alone.
    pub async fn reset(&self) {
        self.state.lock().await.current = None;
        self.publish().await;
    }

    /// Runs one scan and records its result.
    ///
    /// Returns `None` without touching the session when another scan is
    /// still in flight. Otherwise exactly one result is appended to the
    /// history, an ERROR one if capture or recognition failed.
    pub async fn perform_scan(&self) -> Option<ScanResult> {
        let Some(guard) = InFlightGuard::acquire(&self.in_flight) else {
            log_warn!("scan requested while another scan is in flight; ignoring");
            return None;
        };

        self.state.lock().await.current = None;
        self.publish().await;

        let (result, camera_error) = match self.run_pipeline().await {
            Ok(result) => (result, None),
            Err(ScanFailure { error, elapsed_ms }) => {
                log_error!("scan failed after {}ms: {}", elapsed_ms, error);
                let camera_error = error
                    .is_capture_unavailable()
                    .then(|| error.to_string());
                let fallback =
                    ScanResult::failure(&self.device, error.user_note(), elapsed_ms, Utc::now());
                (fallback, camera_error)
            }
        };

        log_info!(
            "scan {} -> {} [{}] in {}ms",
            result.scan_id,
            result.status.as_str(),
            result.pair_label(),
            result.processing_time_ms
        );

        {
            let mut state = self.state.lock().await;
            state.camera_error = camera_error;
            state.complete(result.clone());
        }

        drop(guard);
        self.publish().await;

        Some(result)
    }

    async fn run_pipeline(&self) -> Result<ScanResult, ScanFailure> {
        let image = self
            .frames
            .capture_frame()
            .await
            .map_err(|error| ScanFailure {
                error,
                elapsed_ms: 0,
            })?;
        log_debug!(
            "captured {}x{} frame ({} bytes)",
            image.width,
            image.height,
            image.bytes.len()
        );

        let started = Instant::now();
        let recognized = tokio::time::timeout(
            self.recognition_timeout,
            self.recognizer.recognize(&image),
        )
        .await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let raw = match recognized {
            Ok(Ok(raw)) => raw,
            Ok(Err(error)) => return Err(ScanFailure { error, elapsed_ms }),
            Err(_) => {
                return Err(ScanFailure {
                    error: ScanError::RecognitionTimeout(self.recognition_timeout),
                    elapsed_ms,
                })
            }
        };

        let image_id = fingerprint(image).await;
        Ok(classify(&raw, elapsed_ms, &self.device).with_image_id(image_id))
    }

    async fn publish(&self) {
        let snapshot = self.snapshot().await;
        self.updates.send_replace(snapshot);
    }
}

/// Consumes the frame; only its fingerprint outlives the scan.
async fn fingerprint(image: RawImage) -> Option<String> {
    let bytes = image.bytes;
    match tokio::task::spawn_blocking(move || compute_fingerprint(&bytes)).await {
        Ok(Ok(hash)) => Some(hash),
        Ok(Err(err)) => {
            log_warn!("frame fingerprint skipped: {}", err);
            None
        }
        Err(err) => {
            log_warn!("frame fingerprint worker join failed: {}", err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        capture::{encode_for_upload, png_fixture, FrameLimits},
        error::{CAPTURE_FAILURE_NOTE, CONNECTION_FAILURE_NOTE},
        models::ScanStatus,
        recognition::RawRecognition,
    };
    use std::{collections::VecDeque, sync::Mutex as StdMutex};
    use tokio::sync::Notify;

    struct TestFrames {
        available: AtomicBool,
    }

    impl TestFrames {
        fn working() -> Self {
            Self {
                available: AtomicBool::new(true),
            }
        }

        fn broken() -> Self {
            Self {
                available: AtomicBool::new(false),
            }
        }
    }

    impl FrameSource for TestFrames {
        async fn capture_frame(&self) -> Result<RawImage, ScanError> {
            if self.available.load(Ordering::SeqCst) {
                encode_for_upload(&png_fixture(64, 48), FrameLimits::default())
            } else {
                Err(ScanError::CaptureUnavailable("camera unplugged".into()))
            }
        }
    }

    /// Replays queued answers; an empty queue behaves like an outage.
    struct ScriptedRecognizer {
        script: StdMutex<VecDeque<Result<RawRecognition, ScanError>>>,
        delay: Duration,
        gate: Option<Arc<Notify>>,
    }

    impl ScriptedRecognizer {
        fn new(script: Vec<Result<RawRecognition, ScanError>>) -> Self {
            Self {
                script: StdMutex::new(script.into()),
                delay: Duration::ZERO,
                gate: None,
            }
        }

        fn next(&self) -> Result<RawRecognition, ScanError> {
            self.script
                .lock()
                .expect("script lock")
                .pop_front()
                .unwrap_or_else(|| Err(ScanError::RecognitionUnavailable("script exhausted".into())))
        }
    }

    impl Recognizer for ScriptedRecognizer {
        async fn recognize(&self, _image: &RawImage) -> Result<RawRecognition, ScanError> {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.next()
        }
    }

    fn config(timeout: Duration) -> ScanConfig {
        ScanConfig {
            device: "kiosk-test".into(),
            history_cap: 5,
            recognition_timeout: timeout,
        }
    }

    fn ok_pair(size: &str) -> Result<RawRecognition, ScanError> {
        Ok(RawRecognition::pair(Some(size), Some(size), 0.9, 0.9))
    }

    #[tokio::test]
    async fn successful_scan_is_recorded_and_shown() {
        let controller = ScanController::new(
            TestFrames::working(),
            ScriptedRecognizer::new(vec![ok_pair("23")]),
            config(Duration::from_secs(5)),
        );

        let result = controller.perform_scan().await.expect("scan should run");
        assert_eq!(result.status, ScanStatus::Ok);
        assert!(result.is_match);
        assert_eq!(result.device, "kiosk-test");
        assert!(result.image_id.is_some());

        let snapshot = controller.snapshot().await;
        assert!(!snapshot.is_scanning);
        assert_eq!(snapshot.current.as_ref().map(|r| &r.scan_id), Some(&result.scan_id));
        assert_eq!(snapshot.history.len(), 1);
        assert_eq!(snapshot.camera_error, None);
    }

    #[tokio::test]
    async fn recognizer_failure_still_records_one_error() {
        let controller = ScanController::new(
            TestFrames::working(),
            ScriptedRecognizer::new(vec![Err(ScanError::EmptyResponse)]),
            config(Duration::from_secs(5)),
        );

        let result = controller.perform_scan().await.expect("scan should run");
        assert_eq!(result.status, ScanStatus::Error);
        assert_eq!(result.notes, CONNECTION_FAILURE_NOTE);
        assert!(result.left.candidates.is_empty());
        assert_eq!(result.right.confidence, 0.0);
        assert!(!controller.is_scanning());

        let history = controller.history().await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, ScanStatus::Error);

        // The guard is released, so the next scan is accepted.
        let next = controller.perform_scan().await;
        assert!(next.is_some());
        assert_eq!(controller.history().await.len(), 2);
    }

    #[tokio::test]
    async fn slow_recognizer_times_out_into_error() {
        let mut recognizer = ScriptedRecognizer::new(vec![ok_pair("23")]);
        recognizer.delay = Duration::from_millis(500);
        let controller = ScanController::new(
            TestFrames::working(),
            recognizer,
            config(Duration::from_millis(20)),
        );

        let result = controller.perform_scan().await.expect("scan should run");
        assert_eq!(result.status, ScanStatus::Error);
        assert_eq!(result.notes, CONNECTION_FAILURE_NOTE);
        assert!(result.processing_time_ms < 500);
        assert_eq!(controller.history().await.len(), 1);
    }

    #[tokio::test]
    async fn capture_failure_raises_camera_banner_until_next_capture() {
        let controller = ScanController::new(
            TestFrames::broken(),
            ScriptedRecognizer::new(vec![ok_pair("30")]),
            config(Duration::from_secs(5)),
        );

        let failed = controller.perform_scan().await.expect("scan should run");
        assert_eq!(failed.status, ScanStatus::Error);
        assert_eq!(failed.notes, CAPTURE_FAILURE_NOTE);
        let snapshot = controller.snapshot().await;
        assert!(snapshot
            .camera_error
            .as_deref()
            .is_some_and(|banner| banner.contains("camera unplugged")));
        assert_eq!(snapshot.history.len(), 1);

        controller.frames.available.store(true, Ordering::SeqCst);
        let recovered = controller.perform_scan().await.expect("scan should run");
        assert_eq!(recovered.status, ScanStatus::Ok);
        assert_eq!(controller.snapshot().await.camera_error, None);
    }

    #[tokio::test]
    async fn second_scan_while_in_flight_is_rejected() {
        let gate = Arc::new(Notify::new());
        let mut recognizer = ScriptedRecognizer::new(vec![ok_pair("23"), ok_pair("24")]);
        recognizer.gate = Some(Arc::clone(&gate));
        let controller = ScanController::new(
            TestFrames::working(),
            recognizer,
            config(Duration::from_secs(5)),
        );

        let background = controller.clone();
        let first = tokio::spawn(async move { background.perform_scan().await });

        while !controller.is_scanning() {
            tokio::task::yield_now().await;
        }
        assert!(controller.snapshot().await.is_scanning);
        assert!(controller.perform_scan().await.is_none());

        gate.notify_one();
        let result = first
            .await
            .expect("scan task should join")
            .expect("first scan should run");
        assert_eq!(result.status, ScanStatus::Ok);
        assert_eq!(controller.history().await.len(), 1);
        assert!(!controller.is_scanning());
    }

    #[tokio::test]
    async fn history_is_capped_most_recent_first() {
        let script = (13..=18).map(|size| ok_pair(&size.to_string())).collect();
        let controller = ScanController::new(
            TestFrames::working(),
            ScriptedRecognizer::new(script),
            config(Duration::from_secs(5)),
        );

        for _ in 0..6 {
            controller.perform_scan().await.expect("scan should run");
        }

        let chosen: Vec<String> = controller
            .history()
            .await
            .iter()
            .filter_map(|r| r.left.chosen.clone())
            .collect();
        assert_eq!(chosen, vec!["18", "17", "16", "15", "14"]);
    }

    #[tokio::test]
    async fn reset_clears_current_but_keeps_history() {
        let controller = ScanController::new(
            TestFrames::working(),
            ScriptedRecognizer::new(vec![ok_pair("23")]),
            config(Duration::from_secs(5)),
        );
        controller.perform_scan().await.expect("scan should run");

        controller.reset().await;
        let snapshot = controller.snapshot().await;
        assert!(snapshot.current.is_none());
        assert_eq!(snapshot.history.len(), 1);
    }

    #[tokio::test]
    async fn subscribers_see_the_finished_scan() {
        let controller = ScanController::new(
            TestFrames::working(),
            ScriptedRecognizer::new(vec![ok_pair("25")]),
            config(Duration::from_secs(5)),
        );
        let mut updates = controller.subscribe();

        controller.perform_scan().await.expect("scan should run");

        assert!(updates.has_changed().expect("sender alive"));
        let latest = updates.borrow_and_update().clone();
        assert!(!latest.is_scanning);
        assert_eq!(
            latest.current.and_then(|r| r.left.chosen),
            Some("25".to_string())
        );
    }
}
