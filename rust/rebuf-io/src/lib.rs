//! Chunked read path abstractions:
//! - `ChunkReader`: a source that fills a caller-supplied buffer with the chunk at a given offset.
//! - `Rebufferer`: maps an arbitrary position onto a filled chunk and hands out a `BufferHolder`
//!   view over it.
//! - `RandomAccessReader`: a seekable byte reader layered on top of a `Rebufferer`.
//!
//! Provides a file-based (`SimpleChunkReader`) and a memory-based (`MemoryChunkReader`) chunk
//! source, and the single-buffer `BufferManagingRebufferer`.

use rebuf_common::Result;

pub mod channel;
pub mod chunk_reader;
pub mod memory_chunk_reader;
pub mod random_access_reader;
pub mod rebufferer;
pub mod simple_chunk_reader;

pub use channel::ChannelProxy;
pub use chunk_reader::ChunkReader;
pub use memory_chunk_reader::MemoryChunkReader;
pub use random_access_reader::RandomAccessReader;
pub use rebufferer::{Alignment, BufferManagingRebufferer};
pub use simple_chunk_reader::SimpleChunkReader;

pub use rebuf_buffer_pool::{BufferPool, BufferType};

/// Produces views over the chunk covering a requested position.
///
/// A `Rebufferer` is owned by a single reader and is not meant to be shared:
/// every call that refills or releases the underlying storage takes `&mut self`,
/// so a [`BufferHolder`] obtained earlier cannot outlive the next refill.
pub trait Rebufferer {
    /// Fills the underlying buffer with the chunk covering `position` and returns a
    /// view over it.
    ///
    /// The view starts at the chunk's aligned offset, which may precede `position`.
    /// Errors reported by the chunk source are returned unchanged.
    fn rebuffer(&mut self, position: u64) -> Result<BufferHolder<'_>>;

    /// Returns a view over the most recent fill without touching the source.
    ///
    /// Before the first `rebuffer` the view is empty.
    fn current(&self) -> BufferHolder<'_>;

    fn channel(&self) -> &ChannelProxy;

    /// Length of the underlying resource, as reported by the chunk source.
    fn file_length(&self) -> u64;

    /// Probability with which checksums of read data should be verified, as
    /// reported by the chunk source.
    fn crc_check_chance(&self) -> f64;

    /// Releases the resources private to this reader (its buffer).
    ///
    /// Must be called exactly once, after which no view may be requested.
    fn close_reader(&mut self);

    /// Closes the chunk source. Must follow [`close_reader`](Rebufferer::close_reader).
    fn close(self)
    where
        Self: Sized;
}

/// A view over a filled chunk: the valid bytes and the position of the first of them.
///
/// The view borrows its rebufferer and stays valid until the rebufferer is refilled
/// or closed.
#[derive(Debug, Clone, Copy)]
pub struct BufferHolder<'a> {
    buffer: &'a [u8],
    offset: u64,
}

impl<'a> BufferHolder<'a> {
    pub fn new(buffer: &'a [u8], offset: u64) -> BufferHolder<'a> {
        BufferHolder { buffer, offset }
    }

    /// The valid bytes of the chunk.
    #[inline]
    pub fn buffer(&self) -> &'a [u8] {
        self.buffer
    }

    /// Position of the first byte of [`buffer`](Self::buffer) within the resource.
    #[inline]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Position one past the last valid byte.
    #[inline]
    pub fn end(&self) -> u64 {
        self.offset + self.buffer.len() as u64
    }

    /// Whether the byte at `position` is inside this view.
    #[inline]
    pub fn contains(&self, position: u64) -> bool {
        position >= self.offset && position < self.end()
    }

    /// Signals that the caller is done with the view.
    ///
    /// Nothing to do: the underlying buffer is only recycled when its rebufferer
    /// is closed, so releasing early never invalidates data still in use.
    pub fn release(self) {}
}
