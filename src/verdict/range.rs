use std::ops::RangeInclusive;

/// Brazilian (BR) shoe-size numbering accepted by the checkpoint.
pub const BR_SIZE_RANGE: RangeInclusive<u32> = 13..=39;

/// Parses a raw size marking. Anything that is not a plain integer is `None`,
/// which is distinct from a reading of `0`.
pub fn parse_size(raw: Option<&str>) -> Option<u32> {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .and_then(|value| value.parse::<u32>().ok())
}

pub fn in_valid_range(size: u32) -> bool {
    BR_SIZE_RANGE.contains(&size)
}

/// A raw reading is valid when it parses and falls inside the BR range.
pub fn is_valid_reading(raw: Option<&str>) -> bool {
    parse_size(raw).is_some_and(in_valid_range)
}
