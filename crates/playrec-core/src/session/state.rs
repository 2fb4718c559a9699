//! Cross-thread session flags and realtime counters
//!
//! One [`SessionState`] is shared (via `Arc`) by the JACK callback, the
//! reader thread, the writer thread and the coordinator. Every field has a
//! single writer:
//!
//! | Field       | Written by            | Read by                  |
//! |-------------|-----------------------|--------------------------|
//! | `armed`     | coordinator           | callback, both workers   |
//! | `cancelled` | signal / JACK shutdown| both workers, coordinator|
//! | `reading`   | reader thread         | callback                 |
//! | `playing`   | callback              | writer thread            |
//!
//! so plain atomics are enough; no field is ever protected by a mutex.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use crate::types::StreamStatus;
use crate::worker::WorkerSignal;

/// Flags gating the three actors of a session
#[derive(Debug)]
pub struct SessionState {
    armed: AtomicBool,
    cancelled: AtomicBool,
    reading: AtomicU8,
    playing: AtomicU8,
}

impl SessionState {
    /// Create a disarmed state with both streams idle
    pub fn new() -> Self {
        Self {
            armed: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            reading: AtomicU8::new(StreamStatus::Idle as u8),
            playing: AtomicU8::new(StreamStatus::Idle as u8),
        }
    }

    /// Let the callback and both workers start moving data
    pub fn arm(&self) {
        self.armed.store(true, Ordering::Release);
    }

    /// Whether playback, capture and reading are all permitted
    #[inline]
    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    /// Whether the session has been cancelled
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Mark the session cancelled (does not wake anyone, see [`CancelHandle`])
    pub fn set_cancelled(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Current state of the reader
    #[inline]
    pub fn reading(&self) -> StreamStatus {
        StreamStatus::from_u8(self.reading.load(Ordering::Acquire))
    }

    /// Current state of playback
    #[inline]
    pub fn playing(&self) -> StreamStatus {
        StreamStatus::from_u8(self.playing.load(Ordering::Acquire))
    }

    /// Advance the reader state; moving backwards is ignored
    #[inline]
    pub fn advance_reading(&self, status: StreamStatus) {
        self.reading.fetch_max(status as u8, Ordering::AcqRel);
    }

    /// Advance the playback state; moving backwards is ignored
    #[inline]
    pub fn advance_playing(&self, status: StreamStatus) {
        self.playing.fetch_max(status as u8, Ordering::AcqRel);
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Dropout counters written by the realtime processor
#[derive(Debug, Default)]
pub struct ProcessStats {
    overruns: AtomicU64,
    underruns: AtomicU64,
}

impl ProcessStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_overrun(&self) {
        self.overruns.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_underrun(&self) {
        self.underruns.fetch_add(1, Ordering::Relaxed);
    }

    /// Capture cycles that found the ring full
    #[inline]
    pub fn overruns(&self) -> u64 {
        self.overruns.load(Ordering::Relaxed)
    }

    /// Playback cycles that found the ring short while the file was still being read
    #[inline]
    pub fn underruns(&self) -> u64 {
        self.underruns.load(Ordering::Relaxed)
    }
}

/// Cloneable handle that stops a session from any thread
///
/// Used by the OS signal handler and the JACK shutdown notification.
/// Cancelling sets the flag and makes one best-effort attempt to wake each
/// worker; a worker that misses the wake notices the flag at its next
/// bounded wait timeout.
#[derive(Clone)]
pub struct CancelHandle {
    state: Arc<SessionState>,
    reader: Arc<WorkerSignal>,
    writer: Arc<WorkerSignal>,
}

impl CancelHandle {
    pub(crate) fn new(
        state: Arc<SessionState>,
        reader: Arc<WorkerSignal>,
        writer: Arc<WorkerSignal>,
    ) -> Self {
        Self {
            state,
            reader,
            writer,
        }
    }

    /// Cancel the session and wake both workers
    pub fn cancel(&self) {
        self.state.set_cancelled();
        self.reader.try_notify();
        self.writer.try_notify();
    }

    /// Whether the session has already been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.state.is_cancelled()
    }
}
