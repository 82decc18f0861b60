use std::sync::Arc;

use rebuf_buffer_pool::{BufferPool, BufferType};
use rebuf_bytes::AlignedBuffer;
use rebuf_common::{
    Result,
    error::{Error, ErrorKind},
};

use crate::{
    Alignment, BufferManagingRebufferer, ChannelProxy, ChunkReader, MemoryChunkReader, Rebufferer,
};

fn test_data(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 256) as u8).collect()
}

fn memory_source(len: usize, chunk_size: usize) -> Arc<MemoryChunkReader> {
    Arc::new(MemoryChunkReader::new(test_data(len), chunk_size).unwrap())
}

#[test]
fn test_unaligned_position_is_identity() {
    for _ in 0..1000 {
        let p = fastrand::u64(..);
        assert_eq!(Alignment::Unaligned.aligned_position(p), p);
    }
}

#[test]
fn test_aligned_position_rounds_down() {
    for _ in 0..1000 {
        let s = 1usize << fastrand::u32(0..20);
        let p = fastrand::u64(0..1 << 40);
        let aligned = Alignment::aligned(s).aligned_position(p);
        assert_eq!(aligned, p - p % s as u64);
        assert!(aligned <= p && p < aligned + s as u64);
    }
}

#[test]
#[should_panic(expected = "power-of-two chunk size")]
fn test_aligned_requires_power_of_two() {
    let pool = BufferPool::default();
    let source = MemoryChunkReader::new(test_data(100), 3000).unwrap();
    BufferManagingRebufferer::aligned(source, &pool);
}

#[test]
fn test_on_selects_strategy() {
    let pool = BufferPool::default();

    let mut aligned = BufferManagingRebufferer::on(memory_source(100, 64), &pool);
    assert_eq!(aligned.alignment(), Alignment::Aligned { chunk_size: 64 });
    aligned.close_reader();
    aligned.close();

    let mut unaligned = BufferManagingRebufferer::on(memory_source(100, 48), &pool);
    assert_eq!(unaligned.alignment(), Alignment::Unaligned);
    unaligned.close_reader();
    unaligned.close();

    let source = MemoryChunkReader::new(test_data(100), 64)
        .unwrap()
        .with_alignment_required(false);
    let mut unaligned = BufferManagingRebufferer::on(source, &pool);
    assert_eq!(unaligned.alignment(), Alignment::Unaligned);
    unaligned.close_reader();
    unaligned.close();
}

#[test]
fn test_fresh_rebufferer_is_empty() {
    let pool = BufferPool::default();
    let source = memory_source(10_000, 4096);
    let mut rebufferer = BufferManagingRebufferer::on(source.clone(), &pool);
    assert!(rebufferer.buffer().is_empty());
    assert_eq!(rebufferer.offset(), 0);
    assert!(rebufferer.current().buffer().is_empty());
    assert_eq!(source.read_count(), 0);
    assert_eq!(pool.stats().outstanding, 1);
    rebufferer.close_reader();
    rebufferer.close();
}

#[test]
fn test_aligned_rebuffer_covers_chunk() {
    let pool = BufferPool::default();
    let source = memory_source(3 * 4096 + 100, 4096);
    let mut rebufferer = BufferManagingRebufferer::aligned(source.clone(), &pool);

    let holder = rebufferer.rebuffer(5000).unwrap();
    assert_eq!(holder.offset(), 4096);
    assert_eq!(holder.end(), 8192);
    assert!(holder.contains(5000));
    assert_eq!(holder.buffer(), &source.data()[4096..8192]);
    holder.release();

    assert_eq!(rebufferer.offset(), 4096);
    assert_eq!(rebufferer.buffer(), &source.data()[4096..8192]);

    // The tail chunk is short.
    let holder = rebufferer.rebuffer(3 * 4096 + 50).unwrap();
    assert_eq!(holder.offset(), 3 * 4096);
    assert_eq!(holder.buffer().len(), 100);

    rebufferer.close_reader();
    rebufferer.close();
}

#[test]
fn test_unaligned_rebuffer_passes_position_verbatim() {
    let pool = BufferPool::default();
    let source = Arc::new(
        MemoryChunkReader::new(test_data(3 * 4096), 4096)
            .unwrap()
            .with_alignment_required(false),
    );
    let mut rebufferer = BufferManagingRebufferer::on(source.clone(), &pool);

    let holder = rebufferer.rebuffer(5000).unwrap();
    assert_eq!(holder.offset(), 5000);
    assert_eq!(holder.buffer(), &source.data()[5000..9096]);
    assert_eq!(rebufferer.offset(), 5000);

    rebufferer.close_reader();
    rebufferer.close();
}

#[test]
fn test_random_positions_match_source() {
    let pool = BufferPool::default();
    for chunk_size in [64, 100, 4096] {
        let source = memory_source(20_000, chunk_size);
        let mut rebufferer = BufferManagingRebufferer::on(source.clone(), &pool);
        for _ in 0..200 {
            let p = fastrand::u64(0..20_000);
            let expected_offset = rebufferer.aligned_position(p);
            let holder = rebufferer.rebuffer(p).unwrap();
            assert_eq!(holder.offset(), expected_offset);
            assert!(holder.contains(p));
            let start = expected_offset as usize;
            let end = (start + chunk_size).min(20_000);
            assert_eq!(holder.buffer(), &source.data()[start..end]);
        }
        rebufferer.close_reader();
        rebufferer.close();
    }
}

#[test]
fn test_rebuffer_same_chunk_is_idempotent() {
    let pool = BufferPool::default();
    let source = memory_source(10_000, 1024);
    let mut rebufferer = BufferManagingRebufferer::aligned(source.clone(), &pool);

    let first = rebufferer.rebuffer(2100).unwrap().buffer().to_vec();
    let second = rebufferer.rebuffer(2047 + 1).unwrap();
    assert_eq!(second.offset(), 2048);
    assert_eq!(second.buffer(), first.as_slice());
    assert_eq!(source.read_count(), 2);

    rebufferer.close_reader();
    rebufferer.close();
}

#[test]
fn test_position_at_end_yields_empty_chunk() {
    let pool = BufferPool::default();

    let source = memory_source(8192, 4096);
    let mut rebufferer = BufferManagingRebufferer::aligned(source, &pool);
    let holder = rebufferer.rebuffer(8192).unwrap();
    assert_eq!(holder.offset(), 8192);
    assert!(holder.buffer().is_empty());
    rebufferer.close_reader();
    rebufferer.close();

    let source = memory_source(5000, 3000);
    let mut rebufferer = BufferManagingRebufferer::unaligned(source, &pool);
    let holder = rebufferer.rebuffer(5000).unwrap();
    assert_eq!(holder.offset(), 5000);
    assert!(holder.buffer().is_empty());
    rebufferer.close_reader();
    rebufferer.close();
}

#[test]
fn test_position_past_end_keeps_state() {
    let pool = BufferPool::default();
    let source = memory_source(10_000, 4096);
    let mut rebufferer = BufferManagingRebufferer::aligned(source.clone(), &pool);
    rebufferer.rebuffer(100).unwrap();

    let err = rebufferer.rebuffer(20_000).unwrap_err();
    assert!(matches!(
        err.kind(),
        ErrorKind::PositionOutOfRange {
            position: 16384,
            length: 10_000
        }
    ));
    assert_eq!(rebufferer.offset(), 0);
    assert_eq!(rebufferer.buffer(), &source.data()[..4096]);

    rebufferer.close_reader();
    rebufferer.close();
}

struct FailingReader {
    channel: ChannelProxy,
}

impl ChunkReader for FailingReader {
    fn chunk_size(&self) -> usize {
        512
    }

    fn alignment_required(&self) -> bool {
        true
    }

    fn preferred_buffer_type(&self) -> BufferType {
        BufferType::OffHeap
    }

    fn read_chunk(&self, position: u64, _buffer: &mut AlignedBuffer) -> Result<()> {
        Err(Error::io(
            format!("failing at {position}"),
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        ))
    }

    fn channel(&self) -> &ChannelProxy {
        &self.channel
    }

    fn file_length(&self) -> u64 {
        1 << 20
    }

    fn crc_check_chance(&self) -> f64 {
        1.0
    }

    fn close(&self) {}
}

#[test]
fn test_source_errors_propagate_unchanged() {
    let pool = BufferPool::default();
    let source = FailingReader {
        channel: ChannelProxy::named("failing"),
    };
    let mut rebufferer = BufferManagingRebufferer::on(source, &pool);
    let err = rebufferer.rebuffer(1000).unwrap_err();
    match err.kind() {
        ErrorKind::Io { context, source } => {
            assert_eq!(context, "failing at 512");
            assert_eq!(source.kind(), std::io::ErrorKind::PermissionDenied);
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(rebufferer.offset(), 0);
    assert!(rebufferer.buffer().is_empty());
    rebufferer.close_reader();
    rebufferer.close();
}

#[test]
fn test_pass_through_accessors() {
    let pool = BufferPool::default();
    let source = MemoryChunkReader::new(test_data(1234), 256)
        .unwrap()
        .with_name("accessors")
        .with_buffer_type(BufferType::OffHeap)
        .with_crc_check_chance(0.5)
        .unwrap();
    let mut rebufferer = BufferManagingRebufferer::on(source, &pool);
    assert_eq!(rebufferer.file_length(), 1234);
    assert_eq!(rebufferer.crc_check_chance(), 0.5);
    assert_eq!(rebufferer.channel().to_string(), "memory:accessors");
    assert_eq!(
        rebufferer.to_string(),
        "BufferManagingRebufferer.Aligned:MemoryChunkReader:memory:accessors - chunk length 256, data length 1234"
    );
    rebufferer.close_reader();
    rebufferer.close();
}

#[test]
fn test_buffer_kind_and_size_follow_source() {
    let pool = BufferPool::default();
    let source = MemoryChunkReader::new(test_data(100), 8192)
        .unwrap()
        .with_buffer_type(BufferType::OffHeap);
    let mut rebufferer = BufferManagingRebufferer::on(source, &pool);
    assert!(format!("{rebufferer:?}").contains("capacity: 8192"));
    rebufferer.close_reader();
    rebufferer.close();
    assert_eq!(pool.stats().pooled_bytes, 8192);

    // The next rebufferer of the same shape reuses the pooled buffer.
    let source = MemoryChunkReader::new(test_data(100), 8192)
        .unwrap()
        .with_buffer_type(BufferType::OffHeap);
    let mut rebufferer = BufferManagingRebufferer::on(source, &pool);
    assert_eq!(pool.stats().reused, 1);
    assert!(rebufferer.buffer().is_empty());
    rebufferer.close_reader();
    rebufferer.close();
}

#[test]
fn test_lifecycle_returns_buffer_and_closes_source() {
    let pool = BufferPool::default();
    let source = memory_source(10_000, 4096);
    let mut rebufferer = BufferManagingRebufferer::on(source.clone(), &pool);
    rebufferer.rebuffer(0).unwrap();
    assert_eq!(pool.stats().outstanding, 1);

    rebufferer.close_reader();
    assert!(rebufferer.is_closed());
    assert_eq!(pool.stats().outstanding, 0);
    assert!(!source.is_closed());

    rebufferer.close();
    assert!(source.is_closed());
}

#[test]
fn test_drop_without_close_reader_returns_buffer() {
    let pool = BufferPool::default();
    let rebufferer = BufferManagingRebufferer::on(memory_source(100, 64), &pool);
    assert_eq!(pool.stats().outstanding, 1);
    drop(rebufferer);
    assert_eq!(pool.stats().outstanding, 0);
}

#[test]
#[should_panic(expected = "on a closed rebufferer")]
fn test_rebuffer_after_close_reader_panics() {
    let pool = BufferPool::default();
    let mut rebufferer = BufferManagingRebufferer::on(memory_source(100, 64), &pool);
    rebufferer.close_reader();
    let _ = rebufferer.rebuffer(0);
}

#[test]
#[should_panic(expected = "used after close_reader")]
fn test_buffer_after_close_reader_panics() {
    let pool = BufferPool::default();
    let mut rebufferer = BufferManagingRebufferer::on(memory_source(100, 64), &pool);
    rebufferer.close_reader();
    rebufferer.buffer();
}

#[test]
#[should_panic(expected = "used after close_reader")]
fn test_offset_after_close_reader_panics() {
    let pool = BufferPool::default();
    let mut rebufferer = BufferManagingRebufferer::on(memory_source(100, 64), &pool);
    rebufferer.close_reader();
    rebufferer.offset();
}

#[test]
#[should_panic(expected = "close_reader called twice")]
fn test_double_close_reader_panics() {
    let pool = BufferPool::default();
    let mut rebufferer = BufferManagingRebufferer::on(memory_source(100, 64), &pool);
    rebufferer.close_reader();
    rebufferer.close_reader();
}

#[test]
#[should_panic(expected = "close called before close_reader")]
fn test_close_before_close_reader_panics() {
    let pool = BufferPool::default();
    let rebufferer = BufferManagingRebufferer::on(memory_source(100, 64), &pool);
    rebufferer.close();
}

fn read_byte<R: Rebufferer>(rebufferer: &mut R, position: u64) -> Result<u8> {
    let holder = rebufferer.rebuffer(position)?;
    Ok(holder.buffer()[(position - holder.offset()) as usize])
}

#[test]
fn test_through_rebufferer_trait() {
    let pool = BufferPool::default();
    let source = memory_source(1000, 128);
    let mut rebufferer = BufferManagingRebufferer::on(source.clone(), &pool);
    for p in [0u64, 127, 128, 999, 500] {
        assert_eq!(read_byte(&mut rebufferer, p).unwrap(), source.data()[p as usize]);
    }
    let current = Rebufferer::current(&rebufferer);
    assert_eq!(current.offset(), 384);
    Rebufferer::close_reader(&mut rebufferer);
    Rebufferer::close(rebufferer);
    assert!(source.is_closed());
}
