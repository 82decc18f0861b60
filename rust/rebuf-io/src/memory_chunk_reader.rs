//! `MemoryChunkReader`: a chunk source over an in-memory byte array.

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

use rebuf_buffer_pool::BufferType;
use rebuf_bytes::AlignedBuffer;
use rebuf_common::{Result, error::Error, verify_arg};

use crate::{ChannelProxy, ChunkReader};

/// A chunk source serving chunks of a shared byte array.
///
/// Range handling matches [`SimpleChunkReader`](crate::SimpleChunkReader): a read
/// at the end of the data yields an empty chunk, a read past it fails without
/// touching the buffer. The reader counts chunk reads and remembers whether it
/// was closed, which makes it handy for observing the layers above it.
pub struct MemoryChunkReader {
    data: Arc<[u8]>,
    chunk_size: usize,
    alignment_required: bool,
    buffer_type: BufferType,
    crc_check_chance: f64,
    channel: ChannelProxy,
    reads: AtomicU64,
    closed: AtomicBool,
}

impl MemoryChunkReader {
    /// Creates a reader over `data` with the given chunk size.
    ///
    /// Aligned addressing is requested iff the chunk size is a power of two.
    pub fn new(data: impl Into<Arc<[u8]>>, chunk_size: usize) -> Result<MemoryChunkReader> {
        verify_arg!(chunk_size, chunk_size > 0);
        Ok(MemoryChunkReader {
            data: data.into(),
            chunk_size,
            alignment_required: chunk_size.is_power_of_two(),
            buffer_type: BufferType::OnHeap,
            crc_check_chance: 0.0,
            channel: ChannelProxy::named("memory"),
            reads: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        })
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.channel = ChannelProxy::named(format!("memory:{name}"));
        self
    }

    /// Overrides the addressing mode requested from the rebufferer.
    pub fn with_alignment_required(mut self, alignment_required: bool) -> Self {
        self.alignment_required = alignment_required;
        self
    }

    pub fn with_buffer_type(mut self, buffer_type: BufferType) -> Self {
        self.buffer_type = buffer_type;
        self
    }

    pub fn with_crc_check_chance(mut self, crc_check_chance: f64) -> Result<Self> {
        verify_arg!(
            crc_check_chance,
            (0.0..=1.0).contains(&crc_check_chance)
        );
        self.crc_check_chance = crc_check_chance;
        Ok(self)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Number of successful and failed `read_chunk` calls so far.
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }
}

impl ChunkReader for MemoryChunkReader {
    fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    fn alignment_required(&self) -> bool {
        self.alignment_required
    }

    fn preferred_buffer_type(&self) -> BufferType {
        self.buffer_type
    }

    fn read_chunk(&self, position: u64, buffer: &mut AlignedBuffer) -> Result<()> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let length = self.data.len() as u64;
        if position > length {
            return Err(Error::out_of_range(position, length));
        }
        let start = position as usize;
        let end = start + (self.data.len() - start).min(self.chunk_size);
        verify_arg!(buffer, buffer.capacity() >= end - start);
        buffer.fill_from_slice(&self.data[start..end]);
        Ok(())
    }

    fn channel(&self) -> &ChannelProxy {
        &self.channel
    }

    fn file_length(&self) -> u64 {
        self.data.len() as u64
    }

    fn crc_check_chance(&self) -> f64 {
        self.crc_check_chance
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Relaxed);
    }
}

impl std::fmt::Display for MemoryChunkReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "MemoryChunkReader:{} - chunk length {}, data length {}",
            self.channel,
            self.chunk_size,
            self.data.len()
        )
    }
}
