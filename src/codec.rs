//! Bit-mask codes shared by physical buttons and axes.
//!
//! Physical button `n` (1-based) is stored as `1 << (n - 1)`. Axes use
//! non-positive indices: axis `k` (`-1..=-6`) is reflected to `16 - k` before
//! the same shift, so axis codes occupy the bits above 16 and never collide
//! with button codes.

/// First code that denotes an axis rather than a button.
pub const AXIS_BASE: u32 = 1 << 16;

/// Number of axes addressable through the code space.
pub const AXIS_COUNT: i32 = 6;

/// Highest physical button addressable through the code space.
pub const MAX_BUTTON_INDEX: i32 = 16;

/// Converts a physical index to its bit-mask code.
///
/// Positive values are buttons, non-positive values are axes. Zero is
/// never a valid index; callers reject it before reaching here.
#[inline(always)]
pub const fn index_to_enum(idx: i32) -> u32 {
    let idx = if idx <= 0 { 16 - idx } else { idx };
    1u32 << (idx - 1)
}

/// Converts a single-bit code back to its physical index.
///
/// Only defined for exact powers of two.
#[inline(always)]
pub const fn enum_to_index(code: u32) -> i32 {
    let axis = code >= AXIS_BASE;
    let mut value = code;
    let mut idx = 0i32;

    while value > 0 {
        value >>= 1;
        idx += 1;
    }

    if axis { -(idx - 16) } else { idx }
}

/// Returns true when `code` addresses an axis.
#[inline(always)]
pub const fn is_axis(code: u32) -> bool {
    code >= AXIS_BASE
}

/// Returns true when `idx` can be encoded without overflow or ambiguity.
#[inline(always)]
pub const fn is_valid_index(idx: i32) -> bool {
    (idx >= -AXIS_COUNT && idx <= -1) || (idx >= 1 && idx <= MAX_BUTTON_INDEX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_all_logical_indices() {
        for idx in (-6..=-1).chain(1..=12) {
            assert_eq!(enum_to_index(index_to_enum(idx)), idx, "index {idx}");
        }
    }

    #[test]
    fn test_button_codes() {
        assert_eq!(index_to_enum(1), 0x0001);
        assert_eq!(index_to_enum(2), 0x0002);
        assert_eq!(index_to_enum(12), 0x0800);
        assert_eq!(index_to_enum(16), 0x8000);
        assert!(!is_axis(index_to_enum(16)));
    }

    #[test]
    fn test_axis_codes() {
        assert_eq!(index_to_enum(-1), 1 << 16);
        assert_eq!(index_to_enum(-6), 1 << 21);
        assert!(is_axis(index_to_enum(-1)));
        assert_eq!(enum_to_index(1 << 18), -3);
    }

    #[test]
    fn test_valid_index_range() {
        assert!(!is_valid_index(0));
        assert!(!is_valid_index(-7));
        assert!(!is_valid_index(17));
        assert!(is_valid_index(-6));
        assert!(is_valid_index(16));
    }
}
