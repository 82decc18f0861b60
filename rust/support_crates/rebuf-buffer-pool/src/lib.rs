//! A shared pool of fixed-size, aligned I/O buffers.
//!
//! Readers borrow a buffer with [`BufferPool::allocate`] and hand it back with
//! [`BufferPool::put`] (or simply by dropping the [`PooledBuffer`]). Returned
//! buffers are kept in per-size free lists, bounded by [`BufferPoolConfig`], and
//! handed out again to the next request of the same type and capacity.

use std::sync::{
    Arc, Mutex, OnceLock,
    atomic::{AtomicU64, Ordering},
};

use rebuf_bytes::AlignedBuffer;

pub mod pooled;

pub use pooled::PooledBuffer;


/// The kind of memory a buffer is allocated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferType {
    /// Ordinary heap memory with cache-line alignment.
    OnHeap,
    /// Page-aligned memory, suitable for direct (unbuffered) file I/O.
    OffHeap,
}

impl BufferType {
    /// Alignment of the first byte of buffers of this type.
    pub fn alignment(self) -> usize {
        match self {
            BufferType::OnHeap => AlignedBuffer::DEFAULT_ALIGNMENT,
            BufferType::OffHeap => 4096,
        }
    }
}

/// Retention limits of a [`BufferPool`].
#[derive(Debug, Clone)]
pub struct BufferPoolConfig {
    /// Total capacity of idle buffers the pool keeps for reuse. Buffers returned
    /// beyond this limit are freed.
    pub max_pooled_bytes: usize,
    /// Maximum number of idle buffers kept per (type, capacity) class.
    pub max_pooled_per_class: usize,
}

impl Default for BufferPoolConfig {
    fn default() -> BufferPoolConfig {
        BufferPoolConfig {
            max_pooled_bytes: 128 * 1024 * 1024,
            max_pooled_per_class: 64,
        }
    }
}

/// Point-in-time counters of a [`BufferPool`].
///
/// **Note**: intended for diagnostics and tests; the values may be stale in a
/// concurrent environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Buffers created by a fresh allocation.
    pub allocated: u64,
    /// Buffers served from a free list.
    pub reused: u64,
    /// Buffers currently handed out and not yet returned.
    pub outstanding: u64,
    /// Total capacity of the idle buffers held by the pool.
    pub pooled_bytes: usize,
}

/// A thread-safe, cheaply clonable handle to a buffer pool.
#[derive(Clone)]
pub struct BufferPool(Arc<PoolInner>);

impl BufferPool {
    /// Creates a new, empty pool.
    pub fn new(config: BufferPoolConfig) -> BufferPool {
        BufferPool(Arc::new(PoolInner {
            config,
            free: Mutex::new(FreeLists::default()),
            allocated: AtomicU64::new(0),
            reused: AtomicU64::new(0),
            outstanding: AtomicU64::new(0),
        }))
    }

    /// Returns the process-wide pool with the default configuration.
    ///
    /// The pool is lazily initialized on first call.
    pub fn global() -> BufferPool {
        static POOL: OnceLock<BufferPool> = OnceLock::new();
        POOL.get_or_init(|| BufferPool::new(BufferPoolConfig::default()))
            .clone()
    }

    /// Hands out a buffer of exactly `size` bytes of the given type.
    ///
    /// The buffer holds zero valid bytes; its contents past the valid length are
    /// unspecified when it comes from a free list.
    pub fn allocate(&self, size: usize, buffer_type: BufferType) -> PooledBuffer {
        let buffer = match self.0.take_free(buffer_type, size) {
            Some(mut buffer) => {
                buffer.clear();
                self.0.reused.fetch_add(1, Ordering::Relaxed);
                log::trace!("buffer pool: reused {buffer_type:?} buffer of {size} bytes");
                buffer
            }
            None => {
                self.0.allocated.fetch_add(1, Ordering::Relaxed);
                log::trace!("buffer pool: allocated {buffer_type:?} buffer of {size} bytes");
                AlignedBuffer::with_capacity_and_alignment(size, buffer_type.alignment())
            }
        };
        self.0.outstanding.fetch_add(1, Ordering::Relaxed);
        PooledBuffer::new(buffer, buffer_type, self.0.clone())
    }

    /// Returns a buffer to the pool.
    ///
    /// Equivalent to dropping it; spelled out for call sites that release a buffer
    /// as part of a lifecycle step.
    pub fn put(&self, buffer: PooledBuffer) {
        drop(buffer);
    }

    pub fn config(&self) -> &BufferPoolConfig {
        &self.0.config
    }

    pub fn stats(&self) -> PoolStats {
        let pooled_bytes = self.0.free.lock().unwrap().pooled_bytes;
        PoolStats {
            allocated: self.0.allocated.load(Ordering::Relaxed),
            reused: self.0.reused.load(Ordering::Relaxed),
            outstanding: self.0.outstanding.load(Ordering::Relaxed),
            pooled_bytes,
        }
    }

    /// Frees every idle buffer held by the pool.
    pub fn clear(&self) {
        let mut free = self.0.free.lock().unwrap();
        free.classes.clear();
        free.pooled_bytes = 0;
    }
}

impl Default for BufferPool {
    fn default() -> BufferPool {
        BufferPool::new(BufferPoolConfig::default())
    }
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("config", &self.0.config)
            .field("stats", &self.stats())
            .finish()
    }
}

#[derive(Default)]
struct FreeLists {
    classes: ahash::HashMap<(BufferType, usize), Vec<AlignedBuffer>>,
    pooled_bytes: usize,
}

pub(crate) struct PoolInner {
    config: BufferPoolConfig,
    free: Mutex<FreeLists>,
    allocated: AtomicU64,
    reused: AtomicU64,
    outstanding: AtomicU64,
}

impl PoolInner {
    fn take_free(&self, buffer_type: BufferType, size: usize) -> Option<AlignedBuffer> {
        let mut free = self.free.lock().unwrap();
        let buffer = free.classes.get_mut(&(buffer_type, size))?.pop()?;
        free.pooled_bytes -= buffer.capacity();
        Some(buffer)
    }

    /// Takes a buffer back from a `PooledBuffer` being released.
    pub(crate) fn recycle(&self, buffer_type: BufferType, buffer: AlignedBuffer) {
        self.outstanding.fetch_sub(1, Ordering::Relaxed);

        let capacity = buffer.capacity();
        let mut free = self.free.lock().unwrap();
        if free.pooled_bytes + capacity > self.config.max_pooled_bytes {
            log::trace!("buffer pool: over retention limit, freeing {capacity} bytes");
            return;
        }
        let list = free.classes.entry((buffer_type, capacity)).or_default();
        if list.len() >= self.config.max_pooled_per_class {
            return;
        }
        list.push(buffer);
        free.pooled_bytes += capacity;
    }
}
