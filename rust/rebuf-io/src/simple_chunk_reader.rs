//! `SimpleChunkReader`: reads uncompressed data straight from a file channel.

use rebuf_buffer_pool::BufferType;
use rebuf_bytes::AlignedBuffer;
use rebuf_common::{Result, error::Error, verify_arg};

use crate::{ChannelProxy, ChunkReader};

/// A chunk source over an uncompressed file.
///
/// Any position can be read; the source asks for aligned addressing only when its
/// chunk size is a power of two, which lets the rebufferer replace a division by
/// a mask. Uncompressed data carries no checksums, so the crc check chance is 0.
pub struct SimpleChunkReader {
    channel: ChannelProxy,
    file_length: u64,
    buffer_type: BufferType,
    chunk_size: usize,
}

impl SimpleChunkReader {
    /// Creates a reader over the first `file_length` bytes of `channel`.
    pub fn new(
        channel: ChannelProxy,
        file_length: u64,
        buffer_type: BufferType,
        chunk_size: usize,
    ) -> Result<SimpleChunkReader> {
        verify_arg!(chunk_size, chunk_size > 0);
        Ok(SimpleChunkReader {
            channel,
            file_length,
            buffer_type,
            chunk_size,
        })
    }

    /// Creates a reader over the whole file, taking its current size as the length.
    pub fn open(
        channel: ChannelProxy,
        buffer_type: BufferType,
        chunk_size: usize,
    ) -> Result<SimpleChunkReader> {
        let file_length = channel
            .size()
            .map_err(|e| Error::io(channel.to_string(), e))?;
        Self::new(channel, file_length, buffer_type, chunk_size)
    }
}

impl ChunkReader for SimpleChunkReader {
    fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    fn alignment_required(&self) -> bool {
        self.chunk_size.is_power_of_two()
    }

    fn preferred_buffer_type(&self) -> BufferType {
        self.buffer_type
    }

    fn read_chunk(&self, position: u64, buffer: &mut AlignedBuffer) -> Result<()> {
        if position > self.file_length {
            return Err(Error::out_of_range(position, self.file_length));
        }
        let len = (self.file_length - position).min(self.chunk_size as u64) as usize;
        verify_arg!(buffer, buffer.capacity() >= len);

        match self.channel.read_at(position, &mut buffer.full_mut()[..len]) {
            Ok(n) if n == len => {
                buffer.set_len(n);
                Ok(())
            }
            Ok(n) => {
                // The file is shorter than the length we were created with.
                buffer.clear();
                Err(Error::io(
                    format!("{} at {position}", self.channel),
                    std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        format!("read {n} of {len} bytes"),
                    ),
                ))
            }
            Err(e) => {
                buffer.clear();
                Err(Error::io(format!("{} at {position}", self.channel), e))
            }
        }
    }

    fn channel(&self) -> &ChannelProxy {
        &self.channel
    }

    fn file_length(&self) -> u64 {
        self.file_length
    }

    fn crc_check_chance(&self) -> f64 {
        0.0
    }

    fn close(&self) {
        log::debug!("closing chunk reader over {}", self.channel);
    }
}

impl std::fmt::Display for SimpleChunkReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SimpleChunkReader:{} - chunk length {}, data length {}",
            self.channel, self.chunk_size, self.file_length
        )
    }
}
