use std::time::Duration;

use thiserror::Error;

/// Note shown on the result card when the recognizer could not be used.
pub const CONNECTION_FAILURE_NOTE: &str = "connection or timeout error.";
/// Note shown on the result card when no frame could be captured.
pub const CAPTURE_FAILURE_NOTE: &str = "camera unavailable; check the capture device.";

/// Failures of one scan attempt.
///
/// None of these escape `ScanController::perform_scan`; they are folded into an
/// ERROR result there. Only `CaptureUnavailable` is kept afterwards, as the
/// persistent camera banner.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("capture unavailable: {0}")]
    CaptureUnavailable(String),

    #[error("recognition timed out after {}ms", .0.as_millis())]
    RecognitionTimeout(Duration),

    #[error("recognition request failed: {0}")]
    RecognitionTransport(#[from] reqwest::Error),

    #[error("recognition service returned status {status}: {body}")]
    RecognitionStatus { status: u16, body: String },

    #[error("recognition service returned an empty response")]
    EmptyResponse,

    #[error("malformed recognition payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    #[error("recognition service unavailable: {0}")]
    RecognitionUnavailable(String),
}

impl ScanError {
    pub fn is_capture_unavailable(&self) -> bool {
        matches!(self, ScanError::CaptureUnavailable(_))
    }

    /// Short, user-facing explanation for the fallback result.
    pub fn user_note(&self) -> &'static str {
        if self.is_capture_unavailable() {
            CAPTURE_FAILURE_NOTE
        } else {
            CONNECTION_FAILURE_NOTE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_failures_get_camera_note() {
        let err = ScanError::CaptureUnavailable("no such file".into());
        assert!(err.is_capture_unavailable());
        assert_eq!(err.user_note(), CAPTURE_FAILURE_NOTE);
    }

    #[test]
    fn service_failures_get_connection_note() {
        let errors = [
            ScanError::RecognitionTimeout(Duration::from_millis(1500)),
            ScanError::EmptyResponse,
            ScanError::RecognitionStatus {
                status: 503,
                body: "overloaded".into(),
            },
        ];
        for err in errors {
            assert!(!err.is_capture_unavailable());
            assert_eq!(err.user_note(), CONNECTION_FAILURE_NOTE);
        }
    }

    #[test]
    fn timeout_message_reports_millis() {
        let err = ScanError::RecognitionTimeout(Duration::from_millis(1500));
        assert_eq!(err.to_string(), "recognition timed out after 1500ms");
    }
}
