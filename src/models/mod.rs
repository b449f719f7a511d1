mod scan;

pub use scan::{
    Roi, ScanResult, ScanStatus, ShoeCandidate, SideReading, PLACEHOLDER_ROI,
};
pub(crate) use scan::{clamp_confidence, new_scan_id};
