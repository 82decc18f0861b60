/// Rounds `n` up to the nearest multiple of `alignment`.
///
/// `alignment` must be a non-zero power of two (checked in debug builds).
///
/// ```
/// use rebuf_bytes::align::align_up_u64;
///
/// assert_eq!(align_up_u64(0, 4096), 0);
/// assert_eq!(align_up_u64(1, 4096), 4096);
/// assert_eq!(align_up_u64(4096, 4096), 4096);
/// assert_eq!(align_up_u64(5000, 4096), 8192);
/// ```
#[inline]
pub fn align_up_u64(n: u64, alignment: u64) -> u64 {
    debug_assert_ne!(alignment, 0);
    debug_assert!(alignment.is_power_of_two());
    (n + alignment - 1) & !(alignment - 1)
}

/// Rounds `n` down to the start of the `alignment`-sized block containing it.
///
/// This is the chunk-boundary computation of the aligned rebuffering strategy:
/// a mask instead of a division, valid only for power-of-two alignments
/// (checked in debug builds).
///
/// ```
/// use rebuf_bytes::align::align_down_u64;
///
/// assert_eq!(align_down_u64(0, 4096), 0);
/// assert_eq!(align_down_u64(4095, 4096), 0);
/// assert_eq!(align_down_u64(4096, 4096), 4096);
/// assert_eq!(align_down_u64(5000, 4096), 4096);
/// ```
#[inline]
pub fn align_down_u64(n: u64, alignment: u64) -> u64 {
    debug_assert_ne!(alignment, 0);
    debug_assert!(alignment.is_power_of_two());
    n & !(alignment - 1)
}

/// Returns `true` if `n` lies on an `alignment` boundary.
///
/// ```
/// use rebuf_bytes::align::is_aligned_u64;
///
/// assert!(is_aligned_u64(8192, 4096));
/// assert!(!is_aligned_u64(5000, 4096));
/// ```
#[inline]
pub fn is_aligned_u64(n: u64, alignment: u64) -> bool {
    debug_assert_ne!(alignment, 0);
    debug_assert!(alignment.is_power_of_two());
    (n & (alignment - 1)) == 0
}

/// Rounds a pointer-sized value up to the nearest multiple of `alignment`.
#[inline]
pub(crate) fn align_up_usize(n: usize, alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());
    (n + alignment - 1) & !(alignment - 1)
}
