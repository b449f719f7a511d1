use image::ImageFormat;
use image_hasher::{HashAlg, HasherConfig};

use crate::error::ScanError;

/// Perceptual hash of an uploaded JPEG frame, kept on the result as `image_id`
/// in place of the image itself.
pub fn compute_fingerprint(jpeg_bytes: &[u8]) -> Result<String, ScanError> {
    let img = image::load_from_memory_with_format(jpeg_bytes, ImageFormat::Jpeg)
        .map_err(|err| ScanError::CaptureUnavailable(format!("frame fingerprint failed: {err}")))?;
    let hasher = HasherConfig::new()
        .hash_alg(HashAlg::DoubleGradient)
        .hash_size(8, 8)
        .to_hasher();

    let hash = hasher.hash_image(&img);
    Ok(hash.to_base64())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{encode_for_upload, png_fixture, FrameLimits};

    #[test]
    fn same_frame_same_fingerprint() {
        let frame = encode_for_upload(&png_fixture(640, 480), FrameLimits::default())
            .expect("frame should encode");
        let a = compute_fingerprint(&frame.bytes).expect("fingerprint");
        let b = compute_fingerprint(&frame.bytes).expect("fingerprint");
        assert_eq!(a, b);
        assert!(!a.is_empty());
    }

    #[test]
    fn png_bytes_are_rejected() {
        let err = compute_fingerprint(&png_fixture(16, 16)).expect_err("jpeg only");
        assert!(err.is_capture_unavailable());
    }
}
