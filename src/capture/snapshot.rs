use std::time::Duration;

use anyhow::{Context, Result};

use crate::error::ScanError;

use super::{encode_for_upload, FrameLimits, FrameSource, RawImage};

/// Pulls a JPEG from an IP camera's HTTP snapshot endpoint.
pub struct HttpSnapshotSource {
    client: reqwest::Client,
    url: String,
    limits: FrameLimits,
}

impl HttpSnapshotSource {
    pub fn new(url: String, limits: FrameLimits, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client for the snapshot source")?;

        Ok(Self { client, url, limits })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl FrameSource for HttpSnapshotSource {
    async fn capture_frame(&self) -> Result<RawImage, ScanError> {
        let unavailable = |err: reqwest::Error| ScanError::CaptureUnavailable(format!("{}: {err}", self.url));

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(unavailable)?;
        let bytes = response.bytes().await.map_err(unavailable)?;

        let limits = self.limits;
        tokio::task::spawn_blocking(move || encode_for_upload(&bytes, limits))
            .await
            .map_err(|err| ScanError::CaptureUnavailable(format!("frame encoder join failed: {err}")))?
    }
}
