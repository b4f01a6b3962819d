//! Branch prediction hints for the polling hot path.

/// Marker function for cold code paths.
#[inline(always)]
#[cold]
pub fn cold() {}

/// Branch prediction hint for conditions expected to be false.
///
/// # Example
/// ```ignore
/// if unlikely(salute_held) {
///     handle_salute();
/// }
/// ```
#[inline(always)]
pub fn unlikely(b: bool) -> bool {
    if b {
        cold()
    }
    b
}

/// Branch prediction hint for conditions expected to be true.
#[inline(always)]
pub fn likely(b: bool) -> bool {
    if !b {
        cold()
    }
    b
}
