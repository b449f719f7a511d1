pub mod classifier;
pub mod range;

pub use classifier::{classify, classify_at, judge, Verdict};
pub use range::{in_valid_range, is_valid_reading, parse_size, BR_SIZE_RANGE};
