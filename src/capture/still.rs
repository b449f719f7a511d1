use std::path::{Path, PathBuf};

use crate::error::ScanError;

use super::{encode_for_upload, FrameLimits, FrameSource, RawImage};

/// Reads the still a camera daemon keeps refreshing on disk.
pub struct StillFileSource {
    path: PathBuf,
    limits: FrameLimits,
}

impl StillFileSource {
    pub fn new(path: PathBuf, limits: FrameLimits) -> Self {
        Self { path, limits }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FrameSource for StillFileSource {
    async fn capture_frame(&self) -> Result<RawImage, ScanError> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|err| {
            ScanError::CaptureUnavailable(format!("{}: {err}", self.path.display()))
        })?;

        let limits = self.limits;
        tokio::task::spawn_blocking(move || encode_for_upload(&bytes, limits))
            .await
            .map_err(|err| ScanError::CaptureUnavailable(format!("frame encoder join failed: {err}")))?
    }
}
