//! `BufferManagingRebufferer`: a rebufferer that keeps one buffer and refills it in place.

use rebuf_buffer_pool::{BufferPool, PooledBuffer};
use rebuf_bytes::align::align_down_u64;
use rebuf_common::Result;

use crate::{BufferHolder, ChannelProxy, ChunkReader, Rebufferer};

/// How a requested position is mapped onto the start of the chunk covering it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    /// The position is passed to the source as is; the source resolves it.
    Unaligned,
    /// The position is rounded down to a multiple of the power-of-two chunk size.
    Aligned { chunk_size: u64 },
}

impl Alignment {
    /// Creates the aligned strategy.
    ///
    /// # Panics
    ///
    /// Panics if `chunk_size` is not a power of two.
    pub fn aligned(chunk_size: usize) -> Alignment {
        assert!(
            chunk_size.is_power_of_two(),
            "aligned rebuffering requires a power-of-two chunk size, got {chunk_size}"
        );
        Alignment::Aligned {
            chunk_size: chunk_size as u64,
        }
    }

    /// Start of the chunk covering `position`.
    #[inline]
    pub fn aligned_position(self, position: u64) -> u64 {
        match self {
            Alignment::Unaligned => position,
            Alignment::Aligned { chunk_size } => align_down_u64(position, chunk_size),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Alignment::Unaligned => "Unaligned",
            Alignment::Aligned { .. } => "Aligned",
        }
    }
}

enum State {
    /// `buffer` holds the chunk starting at `offset`.
    Open { buffer: PooledBuffer, offset: u64 },
    /// The buffer went back to the pool.
    Closed,
}

/// A rebufferer for reading from a [`ChunkReader`] when no chunk cache is in use.
///
/// Instances are private to one reader and not thread-safe. A single buffer of
/// the source's chunk size is taken from the pool at construction and refilled by
/// every [`rebuffer`](Self::rebuffer) call; the returned [`BufferHolder`] borrows
/// the rebufferer, so the borrow checker ends its validity at the next refill.
///
/// Closing happens in two steps: [`close_reader`](Self::close_reader) returns the
/// buffer to the pool, then [`close`](Self::close) closes the source. Using the
/// rebufferer after `close_reader`, calling `close_reader` twice, or calling
/// `close` first are caller bugs and panic.
pub struct BufferManagingRebufferer<S: ChunkReader> {
    source: S,
    pool: BufferPool,
    alignment: Alignment,
    state: State,
}

impl<S: ChunkReader> BufferManagingRebufferer<S> {
    /// Creates a rebufferer whose strategy follows `source.alignment_required()`.
    pub fn on(source: S, pool: &BufferPool) -> Self {
        if source.alignment_required() {
            Self::aligned(source, pool)
        } else {
            Self::unaligned(source, pool)
        }
    }

    /// Creates a rebufferer that rounds positions down to chunk boundaries.
    ///
    /// # Panics
    ///
    /// Panics if the source's chunk size is not a power of two.
    pub fn aligned(source: S, pool: &BufferPool) -> Self {
        let alignment = Alignment::aligned(source.chunk_size());
        Self::with_alignment(source, pool, alignment)
    }

    /// Creates a rebufferer that hands positions to the source verbatim.
    pub fn unaligned(source: S, pool: &BufferPool) -> Self {
        Self::with_alignment(source, pool, Alignment::Unaligned)
    }

    fn with_alignment(source: S, pool: &BufferPool, alignment: Alignment) -> Self {
        let chunk_size = source.chunk_size();
        assert!(chunk_size > 0, "chunk size must be positive");
        let buffer = pool.allocate(chunk_size, source.preferred_buffer_type());
        debug_assert!(buffer.is_empty());
        log::debug!(
            "{} rebufferer over {}: {chunk_size}-byte {:?} buffer",
            alignment.name(),
            source.channel(),
            buffer.buffer_type()
        );
        BufferManagingRebufferer {
            source,
            pool: pool.clone(),
            alignment,
            state: State::Open { buffer, offset: 0 },
        }
    }

    pub fn alignment(&self) -> Alignment {
        self.alignment
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Start of the chunk that `rebuffer(position)` would load.
    #[inline]
    pub fn aligned_position(&self, position: u64) -> u64 {
        self.alignment.aligned_position(position)
    }

    /// Loads the chunk covering `position` into the buffer and returns a view over it.
    ///
    /// On error the recorded offset is left as it was; errors of the source are
    /// returned unchanged.
    ///
    /// # Panics
    ///
    /// Panics if the rebufferer is reader-closed.
    pub fn rebuffer(&mut self, position: u64) -> Result<BufferHolder<'_>> {
        let aligned = self.alignment.aligned_position(position);
        let State::Open { buffer, offset } = &mut self.state else {
            panic!("rebuffer({position}) on a closed rebufferer");
        };
        log::trace!("rebuffer {position} -> chunk at {aligned}");
        self.source.read_chunk(aligned, buffer)?;
        *offset = aligned;
        Ok(BufferHolder::new(buffer.as_slice(), aligned))
    }

    /// The valid bytes of the last loaded chunk; empty before the first load.
    ///
    /// # Panics
    ///
    /// Panics if the rebufferer is reader-closed.
    pub fn buffer(&self) -> &[u8] {
        self.open_state().0.as_slice()
    }

    /// Start position of the last loaded chunk.
    ///
    /// # Panics
    ///
    /// Panics if the rebufferer is reader-closed.
    pub fn offset(&self) -> u64 {
        self.open_state().1
    }

    /// A view over the last loaded chunk.
    ///
    /// # Panics
    ///
    /// Panics if the rebufferer is reader-closed.
    pub fn current(&self) -> BufferHolder<'_> {
        let (buffer, offset) = self.open_state();
        BufferHolder::new(buffer.as_slice(), offset)
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, State::Closed)
    }

    /// Returns the buffer to the pool.
    ///
    /// # Panics
    ///
    /// Panics if called more than once.
    pub fn close_reader(&mut self) {
        let State::Open { buffer, .. } = std::mem::replace(&mut self.state, State::Closed) else {
            panic!("close_reader called twice on rebufferer over {}", self.source.channel());
        };
        self.pool.put(buffer);
    }

    /// Closes the chunk source.
    ///
    /// # Panics
    ///
    /// Panics unless [`close_reader`](Self::close_reader) was called first.
    pub fn close(self) {
        assert!(
            self.is_closed(),
            "close called before close_reader on rebufferer over {}",
            self.source.channel()
        );
        log::debug!("closing rebufferer over {}", self.source.channel());
        self.source.close();
    }

    pub fn channel(&self) -> &ChannelProxy {
        self.source.channel()
    }

    pub fn file_length(&self) -> u64 {
        self.source.file_length()
    }

    pub fn crc_check_chance(&self) -> f64 {
        self.source.crc_check_chance()
    }

    fn open_state(&self) -> (&PooledBuffer, u64) {
        match &self.state {
            State::Open { buffer, offset } => (buffer, *offset),
            State::Closed => panic!(
                "rebufferer over {} used after close_reader",
                self.source.channel()
            ),
        }
    }
}

impl<S: ChunkReader> Rebufferer for BufferManagingRebufferer<S> {
    fn rebuffer(&mut self, position: u64) -> Result<BufferHolder<'_>> {
        BufferManagingRebufferer::rebuffer(self, position)
    }

    fn current(&self) -> BufferHolder<'_> {
        BufferManagingRebufferer::current(self)
    }

    fn channel(&self) -> &ChannelProxy {
        BufferManagingRebufferer::channel(self)
    }

    fn file_length(&self) -> u64 {
        BufferManagingRebufferer::file_length(self)
    }

    fn crc_check_chance(&self) -> f64 {
        BufferManagingRebufferer::crc_check_chance(self)
    }

    fn close_reader(&mut self) {
        BufferManagingRebufferer::close_reader(self)
    }

    fn close(self) {
        BufferManagingRebufferer::close(self)
    }
}

impl<S: ChunkReader> Drop for BufferManagingRebufferer<S> {
    fn drop(&mut self) {
        if !self.is_closed() {
            log::warn!(
                "rebufferer over {} dropped without close_reader",
                self.source.channel()
            );
        }
    }
}

impl<S: ChunkReader + std::fmt::Display> std::fmt::Display for BufferManagingRebufferer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "BufferManagingRebufferer.{}:{}",
            self.alignment.name(),
            self.source
        )
    }
}

impl<S: ChunkReader> std::fmt::Debug for BufferManagingRebufferer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("BufferManagingRebufferer");
        s.field("channel", self.source.channel())
            .field("alignment", &self.alignment);
        match &self.state {
            State::Open { buffer, offset } => s.field("buffer", &**buffer).field("offset", offset),
            State::Closed => s.field("closed", &true),
        };
        s.finish()
    }
}

#[cfg(test)]
mod tests;
