//! `ChunkReader`: the chunked data source a rebufferer reads through.

use std::sync::Arc;

use rebuf_buffer_pool::BufferType;
use rebuf_bytes::AlignedBuffer;
use rebuf_common::Result;

use crate::ChannelProxy;

/// A source that reads a resource one chunk at a time into caller-supplied buffers.
pub trait ChunkReader {
    /// Size of a chunk in bytes. Buffers passed to
    /// [`read_chunk`](ChunkReader::read_chunk) have at least this capacity.
    fn chunk_size(&self) -> usize;

    /// Whether chunk reads must start at multiples of the (power-of-two) chunk size.
    fn alignment_required(&self) -> bool;

    /// The kind of memory best suited for this source's reads.
    fn preferred_buffer_type(&self) -> BufferType;

    /// Fills `buffer` with the chunk starting at `position` and sets its valid length.
    ///
    /// At most [`chunk_size`](ChunkReader::chunk_size) bytes are written, fewer at
    /// the end of the resource. A source that fails before writing must leave the
    /// buffer untouched.
    fn read_chunk(&self, position: u64, buffer: &mut AlignedBuffer) -> Result<()>;

    fn channel(&self) -> &ChannelProxy;

    /// Total length of the resource in bytes.
    fn file_length(&self) -> u64;

    /// Probability, in `[0, 1]`, with which checksums of the read data should be
    /// verified.
    fn crc_check_chance(&self) -> f64;

    /// Releases the source. Called once by the rebufferer that owns it.
    fn close(&self);
}

impl<T> ChunkReader for Arc<T>
where
    T: ChunkReader + ?Sized,
{
    fn chunk_size(&self) -> usize {
        self.as_ref().chunk_size()
    }

    fn alignment_required(&self) -> bool {
        self.as_ref().alignment_required()
    }

    fn preferred_buffer_type(&self) -> BufferType {
        self.as_ref().preferred_buffer_type()
    }

    fn read_chunk(&self, position: u64, buffer: &mut AlignedBuffer) -> Result<()> {
        self.as_ref().read_chunk(position, buffer)
    }

    fn channel(&self) -> &ChannelProxy {
        self.as_ref().channel()
    }

    fn file_length(&self) -> u64 {
        self.as_ref().file_length()
    }

    fn crc_check_chance(&self) -> f64 {
        self.as_ref().crc_check_chance()
    }

    fn close(&self) {
        self.as_ref().close()
    }
}

impl<T> ChunkReader for Box<T>
where
    T: ChunkReader + ?Sized,
{
    fn chunk_size(&self) -> usize {
        self.as_ref().chunk_size()
    }

    fn alignment_required(&self) -> bool {
        self.as_ref().alignment_required()
    }

    fn preferred_buffer_type(&self) -> BufferType {
        self.as_ref().preferred_buffer_type()
    }

    fn read_chunk(&self, position: u64, buffer: &mut AlignedBuffer) -> Result<()> {
        self.as_ref().read_chunk(position, buffer)
    }

    fn channel(&self) -> &ChannelProxy {
        self.as_ref().channel()
    }

    fn file_length(&self) -> u64 {
        self.as_ref().file_length()
    }

    fn crc_check_chance(&self) -> f64 {
        self.as_ref().crc_check_chance()
    }

    fn close(&self) {
        self.as_ref().close()
    }
}
