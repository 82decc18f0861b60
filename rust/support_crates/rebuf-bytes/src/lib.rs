//! Byte buffer primitives used by the rebuffering layer:
//! - [`align`]: power-of-two rounding helpers for offsets and sizes.
//! - [`AlignedBuffer`]: a fixed-capacity, address-aligned region with a valid-length limit.

pub mod align;
pub mod buffer;

pub use buffer::AlignedBuffer;
