//! `RandomAccessReader`: a seekable byte reader on top of a `Rebufferer`.

use std::path::Path;

use rebuf_buffer_pool::{BufferPool, BufferType};
use rebuf_common::{Result, error::Error};

use crate::{BufferManagingRebufferer, ChannelProxy, Rebufferer, SimpleChunkReader};

/// A reader that keeps a current position and serves bytes from the chunk its
/// rebufferer currently holds, asking for a new chunk only when the position
/// leaves it.
///
/// Implements [`std::io::Read`] and [`std::io::Seek`]. Seeking past the end of
/// the resource is rejected.
pub struct RandomAccessReader<R> {
    rebufferer: R,
    position: u64,
    length: u64,
}

impl RandomAccessReader<BufferManagingRebufferer<SimpleChunkReader>> {
    /// Opens the file at `path` for chunked reading with a single pooled buffer.
    pub fn open<P: AsRef<Path>>(
        path: P,
        buffer_type: BufferType,
        chunk_size: usize,
        pool: &BufferPool,
    ) -> Result<Self> {
        let path = path.as_ref();
        let channel =
            ChannelProxy::open(path).map_err(|e| Error::io(path.display().to_string(), e))?;
        let source = SimpleChunkReader::open(channel, buffer_type, chunk_size)?;
        Ok(RandomAccessReader::new(BufferManagingRebufferer::on(
            source, pool,
        )))
    }
}

impl<R: Rebufferer> RandomAccessReader<R> {
    pub fn new(rebufferer: R) -> Self {
        let length = rebufferer.file_length();
        RandomAccessReader {
            rebufferer,
            position: 0,
            length,
        }
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn bytes_remaining(&self) -> u64 {
        self.length.saturating_sub(self.position)
    }

    pub fn is_eof(&self) -> bool {
        self.position >= self.length
    }

    pub fn channel(&self) -> &ChannelProxy {
        self.rebufferer.channel()
    }

    pub fn file_path(&self) -> &Path {
        self.rebufferer.channel().file_path()
    }

    pub fn crc_check_chance(&self) -> f64 {
        self.rebufferer.crc_check_chance()
    }

    pub fn rebufferer(&self) -> &R {
        &self.rebufferer
    }

    /// Moves the read position to `position`, which may equal the length.
    pub fn seek(&mut self, position: u64) -> Result<()> {
        if position > self.length {
            return Err(Error::out_of_range(position, self.length));
        }
        self.position = position;
        Ok(())
    }

    /// Reads up to `buf.len()` bytes at the current position, never crossing the
    /// end of the current chunk. Returns 0 at the end of the resource.
    pub fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() || self.is_eof() {
            return Ok(0);
        }

        let position = self.position;
        let covered = self.rebufferer.current().contains(position);
        let holder = if covered {
            self.rebufferer.current()
        } else {
            self.rebufferer.rebuffer(position)?
        };

        // A source may hand back a chunk that does not reach `position` (e.g. it
        // hit the end of the data early); report that as end of input.
        if !holder.contains(position) {
            return Ok(0);
        }
        let available = &holder.buffer()[(position - holder.offset()) as usize..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.position += n as u64;
        Ok(n)
    }

    /// Fills `buf` completely, failing with `UnexpectedEof` if the resource ends first.
    pub fn read_fully(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read_bytes(&mut buf[filled..])?;
            if n == 0 {
                return Err(Error::io(
                    format!("{} at {}", self.channel(), self.position),
                    std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        format!("needed {} more bytes", buf.len() - filled),
                    ),
                ));
            }
            filled += n;
        }
        Ok(())
    }

    /// Releases the rebufferer's buffer, then its source.
    pub fn close(self) {
        let mut rebufferer = self.rebufferer;
        rebufferer.close_reader();
        rebufferer.close();
    }
}

impl<R: Rebufferer> std::io::Read for RandomAccessReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.read_bytes(buf).map_err(Into::into)
    }
}

impl<R: Rebufferer> std::io::Seek for RandomAccessReader<R> {
    fn seek(&mut self, pos: std::io::SeekFrom) -> std::io::Result<u64> {
        use std::io::SeekFrom;

        let (base, offset) = match pos {
            SeekFrom::Start(offset) => {
                RandomAccessReader::seek(self, offset)?;
                return Ok(self.position);
            }
            SeekFrom::End(offset) => (self.length, offset),
            SeekFrom::Current(offset) => (self.position, offset),
        };
        let target = base.checked_add_signed(offset).ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "invalid seek to a negative or overflowing position",
            )
        })?;
        RandomAccessReader::seek(self, target)?;
        Ok(self.position)
    }
}
