//! `PooledBuffer`: an `AlignedBuffer` on loan from a `BufferPool`.

use std::sync::Arc;

use rebuf_bytes::AlignedBuffer;

use crate::{BufferType, PoolInner};

/// An [`AlignedBuffer`] borrowed from a [`BufferPool`](crate::BufferPool).
///
/// The buffer goes back to its pool exactly once, when the `PooledBuffer` is
/// dropped (or passed to [`BufferPool::put`](crate::BufferPool::put)). Since the
/// handle is not clonable, a buffer cannot be released twice.
pub struct PooledBuffer {
    buffer: AlignedBuffer,
    buffer_type: BufferType,
    pool: Arc<PoolInner>,
}

impl PooledBuffer {
    pub(crate) fn new(
        buffer: AlignedBuffer,
        buffer_type: BufferType,
        pool: Arc<PoolInner>,
    ) -> PooledBuffer {
        PooledBuffer {
            buffer,
            buffer_type,
            pool,
        }
    }

    pub fn buffer_type(&self) -> BufferType {
        self.buffer_type
    }
}

impl std::ops::Deref for PooledBuffer {
    type Target = AlignedBuffer;

    #[inline]
    fn deref(&self) -> &AlignedBuffer {
        &self.buffer
    }
}

impl std::ops::DerefMut for PooledBuffer {
    #[inline]
    fn deref_mut(&mut self) -> &mut AlignedBuffer {
        &mut self.buffer
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        // An empty placeholder does not allocate.
        let buffer = std::mem::replace(&mut self.buffer, AlignedBuffer::with_capacity(0));
        self.pool.recycle(self.buffer_type, buffer);
    }
}

impl std::fmt::Debug for PooledBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledBuffer")
            .field("buffer_type", &self.buffer_type)
            .field("buffer", &self.buffer)
            .finish()
    }
}
