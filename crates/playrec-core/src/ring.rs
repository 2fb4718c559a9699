//! Lock-free sample ring between a disk thread and the realtime callback
//!
//! Each direction of the session has exactly one ring:
//!
//! ```text
//! reader thread ──write()──► [playback ring] ──read()──► JACK callback
//! JACK callback ──write()──► [capture ring]  ──read()──► writer thread
//! ```
//!
//! The ring is a thin wrapper over `rtrb`, which is wait-free on both ends
//! and publishes its indices with acquire/release ordering, so the consumer
//! never sees the write index move before the samples behind it are visible.
//!
//! Neither end ever blocks or allocates after [`sample_ring`] returns. A
//! short transfer is reported through the return value; the caller decides
//! whether that is an underrun, an overrun, or just "try again next cycle".

use crate::types::Sample;

/// Default ring capacity in samples (64Ki samples = 256 KiB)
pub const DEFAULT_RING_SIZE: usize = 65536;

/// Producer half of a sample ring
pub struct RingWriter {
    producer: rtrb::Producer<Sample>,
}

/// Consumer half of a sample ring
pub struct RingReader {
    consumer: rtrb::Consumer<Sample>,
}

/// Create a ring holding up to `capacity` samples
///
/// Every slot is written and read back once before the halves are handed
/// out, so the backing pages are resident before the realtime thread
/// touches them. The returned ring is empty.
pub fn sample_ring(capacity: usize) -> (RingWriter, RingReader) {
    let (producer, consumer) = rtrb::RingBuffer::new(capacity);
    let mut writer = RingWriter { producer };
    let mut reader = RingReader { consumer };
    writer.prefault(&mut reader);
    (writer, reader)
}

impl RingWriter {
    /// Copy as many samples from `src` as fit, returning how many were written
    ///
    /// Never overwrites unread data.
    pub fn write(&mut self, src: &[Sample]) -> usize {
        let n = src.len().min(self.producer.slots());
        if n == 0 {
            return 0;
        }
        // Cannot fail: n <= slots()
        let Ok(mut chunk) = self.producer.write_chunk(n) else {
            return 0;
        };
        let (first, second) = chunk.as_mut_slices();
        let split = first.len();
        first.copy_from_slice(&src[..split]);
        second.copy_from_slice(&src[split..n]);
        chunk.commit_all();
        n
    }

    /// Number of samples that can be written right now
    #[inline]
    pub fn writable(&self) -> usize {
        self.producer.slots()
    }

    /// Total capacity in samples
    #[inline]
    pub fn capacity(&self) -> usize {
        self.producer.buffer().capacity()
    }

    fn prefault(&mut self, reader: &mut RingReader) {
        let capacity = self.capacity();
        if let Ok(mut chunk) = self.producer.write_chunk(capacity) {
            let (first, second) = chunk.as_mut_slices();
            first.fill(0.0);
            second.fill(0.0);
            chunk.commit_all();
        }
        if let Ok(chunk) = reader.consumer.read_chunk(capacity) {
            chunk.commit_all();
        }
    }
}

impl RingReader {
    /// Copy up to `dst.len()` samples into `dst`, returning how many were read
    ///
    /// Never consumes more than is available.
    pub fn read(&mut self, dst: &mut [Sample]) -> usize {
        let n = dst.len().min(self.consumer.slots());
        if n == 0 {
            return 0;
        }
        let Ok(chunk) = self.consumer.read_chunk(n) else {
            return 0;
        };
        let (first, second) = chunk.as_slices();
        let split = first.len();
        dst[..split].copy_from_slice(first);
        dst[split..n].copy_from_slice(second);
        chunk.commit_all();
        n
    }

    /// Number of samples waiting to be read
    #[inline]
    pub fn readable(&self) -> usize {
        self.consumer.slots()
    }

    /// Whether nothing is waiting to be read
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.consumer.is_empty()
    }

    /// Total capacity in samples
    #[inline]
    pub fn capacity(&self) -> usize {
        self.consumer.buffer().capacity()
    }
}
