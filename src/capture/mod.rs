pub mod fingerprint;
pub mod snapshot;
pub mod still;

use std::future::Future;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::GenericImageView;

use crate::error::ScanError;
use crate::settings::{FrameSourceSettings, KioskSettings};

pub use fingerprint::compute_fingerprint;
pub use snapshot::HttpSnapshotSource;
pub use still::StillFileSource;

/// An encoded still ready for upload. Lives only for the duration of one scan.
#[derive(Debug, Clone)]
pub struct RawImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub mime_type: &'static str,
}

/// Upload encoding limits for captured frames.
#[derive(Debug, Clone, Copy)]
pub struct FrameLimits {
    pub max_width: u32,
    pub jpeg_quality: u8,
}

impl Default for FrameLimits {
    fn default() -> Self {
        Self {
            max_width: 800,
            jpeg_quality: 80,
        }
    }
}

/// Supplies one still sampled from the live camera.
pub trait FrameSource: Send + Sync {
    fn capture_frame(&self) -> impl Future<Output = Result<RawImage, ScanError>> + Send;
}

pub enum CameraSource {
    Still(StillFileSource),
    Snapshot(HttpSnapshotSource),
}

impl CameraSource {
    pub fn from_settings(settings: &KioskSettings) -> anyhow::Result<Self> {
        let limits = settings.frame_limits();
        Ok(match &settings.frame_source {
            FrameSourceSettings::Still { path } => {
                Self::Still(StillFileSource::new(path.clone(), limits))
            }
            FrameSourceSettings::Snapshot { url } => Self::Snapshot(HttpSnapshotSource::new(
                url.clone(),
                limits,
                settings.recognition_timeout(),
            )?),
        })
    }

    pub fn describe(&self) -> String {
        match self {
            CameraSource::Still(source) => format!("still file {}", source.path().display()),
            CameraSource::Snapshot(source) => format!("snapshot {}", source.url()),
        }
    }
}

impl FrameSource for CameraSource {
    async fn capture_frame(&self) -> Result<RawImage, ScanError> {
        match self {
            CameraSource::Still(source) => source.capture_frame().await,
            CameraSource::Snapshot(source) => source.capture_frame().await,
        }
    }
}

/// Decodes a camera still, shrinks it to `max_width` keeping the aspect ratio
/// (never enlarges) and re-encodes it as JPEG.
pub fn encode_for_upload(source: &[u8], limits: FrameLimits) -> Result<RawImage, ScanError> {
    let decoded = image::load_from_memory(source)
        .map_err(|err| ScanError::CaptureUnavailable(format!("undecodable frame: {err}")))?;

    let (width, height) = decoded.dimensions();
    if width == 0 || height == 0 {
        return Err(ScanError::CaptureUnavailable("empty frame".into()));
    }

    let max_width = limits.max_width.max(1);
    let resized = if width > max_width {
        let scaled_height = ((height as u64 * max_width as u64) / width as u64).max(1) as u32;
        decoded.resize_exact(max_width, scaled_height, FilterType::Triangle)
    } else {
        decoded
    };

    let rgb = resized.to_rgb8();
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, limits.jpeg_quality.clamp(1, 100))
        .encode_image(&rgb)
        .map_err(|err| ScanError::CaptureUnavailable(format!("jpeg encoding failed: {err}")))?;

    Ok(RawImage {
        bytes,
        width: rgb.width(),
        height: rgb.height(),
        mime_type: "image/jpeg",
    })
}

#[cfg(test)]
pub(crate) fn png_fixture(width: u32, height: u32) -> Vec<u8> {
    use std::io::Cursor;

    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .expect("png fixture should encode");
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wide_frames_are_capped_with_aspect_ratio() {
        let frame = encode_for_upload(&png_fixture(1600, 900), FrameLimits::default())
            .expect("frame should encode");
        assert_eq!((frame.width, frame.height), (800, 450));
        assert_eq!(frame.mime_type, "image/jpeg");

        let decoded = image::load_from_memory(&frame.bytes).expect("output is a valid jpeg");
        assert_eq!(decoded.dimensions(), (800, 450));
    }

    #[test]
    fn small_frames_are_not_enlarged() {
        let frame = encode_for_upload(&png_fixture(320, 240), FrameLimits::default())
            .expect("frame should encode");
        assert_eq!((frame.width, frame.height), (320, 240));
    }

    #[test]
    fn garbage_bytes_mean_capture_unavailable() {
        let err = encode_for_upload(b"not an image", FrameLimits::default())
            .expect_err("garbage must not decode");
        assert!(err.is_capture_unavailable());
    }
}
