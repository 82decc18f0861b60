use crate::align::align_up_usize;

/// A fixed-capacity byte region whose start address is aligned to a power of two.
///
/// The region is allocated (and zeroed) once and never grows. Its contents are
/// tracked with a separate valid length, the "limit": readers see
/// [`as_slice`](Self::as_slice) (`0..len`), while producers write into
/// [`full_mut`](Self::full_mut) (`0..capacity`) and then publish the number of
/// bytes they wrote with [`set_len`](Self::set_len).
///
/// A fresh buffer has zero valid bytes.
pub struct AlignedBuffer {
    /// Backing storage, over-allocated by `alignment` bytes to leave room for the
    /// padding in front of the aligned start.
    inner: Vec<u8>,
    /// Padding before the aligned start within `inner`.
    start: usize,
    capacity: usize,
    len: usize,
    alignment: usize,
}

impl AlignedBuffer {
    /// Alignment used when none is specified, sufficient for SIMD access.
    pub const DEFAULT_ALIGNMENT: usize = 64;

    /// Creates a buffer of `capacity` bytes with the default alignment.
    pub fn with_capacity(capacity: usize) -> AlignedBuffer {
        Self::with_capacity_and_alignment(capacity, Self::DEFAULT_ALIGNMENT)
    }

    /// Creates a buffer of `capacity` bytes whose first byte is `alignment`-aligned.
    ///
    /// # Panics
    ///
    /// Panics if `alignment` is not a power of two.
    pub fn with_capacity_and_alignment(capacity: usize, alignment: usize) -> AlignedBuffer {
        let alignment = alignment.max(1);
        assert!(
            alignment.is_power_of_two(),
            "alignment {alignment} is not a power of two"
        );

        if capacity == 0 {
            return AlignedBuffer {
                inner: Vec::new(),
                start: 0,
                capacity: 0,
                len: 0,
                alignment,
            };
        }

        let inner = vec![0u8; capacity.checked_add(alignment).expect("add")];
        let p = inner.as_ptr() as usize;
        let start = align_up_usize(p, alignment) - p;
        debug_assert!(start + capacity <= inner.len());

        AlignedBuffer {
            inner,
            start,
            capacity,
            len: 0,
            alignment,
        }
    }

    /// Total number of bytes the buffer can hold.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of valid bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn alignment(&self) -> usize {
        self.alignment
    }

    /// Sets the number of valid bytes.
    ///
    /// The whole capacity is initialized at allocation, so any length up to the
    /// capacity exposes defined (possibly stale) bytes.
    ///
    /// # Panics
    ///
    /// Panics if `len` exceeds the capacity.
    #[inline]
    pub fn set_len(&mut self, len: usize) {
        assert!(
            len <= self.capacity,
            "length {len} exceeds buffer capacity {}",
            self.capacity
        );
        self.len = len;
    }

    /// Marks the buffer as holding no valid bytes. The contents are left as is.
    #[inline]
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// The valid bytes.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.inner[self.start..self.start + self.len]
    }

    /// The valid bytes, mutably.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.inner[self.start..self.start + self.len]
    }

    /// The entire capacity, regardless of the valid length. Used by producers
    /// filling the buffer before calling [`set_len`](Self::set_len).
    #[inline]
    pub fn full_mut(&mut self) -> &mut [u8] {
        &mut self.inner[self.start..self.start + self.capacity]
    }

    /// Copies `data` into the start of the buffer and makes it the valid content.
    ///
    /// # Panics
    ///
    /// Panics if `data` is longer than the capacity.
    pub fn fill_from_slice(&mut self, data: &[u8]) {
        self.full_mut()[..data.len()].copy_from_slice(data);
        self.set_len(data.len());
    }

    /// Checks whether the address of the byte at `offset` is aligned to `alignment`.
    pub fn is_aligned_at(&self, offset: usize, alignment: usize) -> bool {
        assert!(offset <= self.capacity);
        let addr = self.inner[self.start..].as_ptr() as usize + offset;
        addr % alignment == 0
    }

    /// Total allocated size in bytes, including alignment padding.
    pub fn heap_size(&self) -> usize {
        self.inner.capacity()
    }
}

impl std::ops::Deref for AlignedBuffer {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl std::ops::DerefMut for AlignedBuffer {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.as_mut_slice()
    }
}

impl AsRef<[u8]> for AlignedBuffer {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl std::fmt::Debug for AlignedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlignedBuffer")
            .field("len", &self.len)
            .field("capacity", &self.capacity)
            .field("alignment", &self.alignment)
            .finish()
    }
}
