//! Disk I/O worker threads
//!
//! Two ordinary threads do all blocking file I/O for a session: the reader
//! decodes the source into the playback ring, the writer drains the capture
//! ring into the destination. Both share one loop, [`IoWorker`], and differ
//! only in their [`IoTask`].
//!
//! # Wake-up protocol
//!
//! ```text
//!  worker thread                           JACK callback (every cycle)
//!  ─────────────                           ───────────────────────────
//!  lock(signal)
//!  loop {
//!      step(task)      ◄── lock held ──►   try_lock(signal) fails: skip
//!      wait_timeout(signal) ─ unlocks ─►   try_lock(signal) ok: notify
//!  }
//! ```
//!
//! The callback never waits for the lock. A missed wake-up only delays the
//! next chunk by one cycle (or by [`WAKE_TIMEOUT`] if the engine stops
//! calling back), which shows up as an underrun/overrun rather than a
//! missed deadline.

mod reader;
mod writer;

pub use reader::ReaderTask;
pub use writer::WriterTask;

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::session::{SessionError, SessionResult, SessionState};

/// Longest a worker sleeps without being signalled
///
/// Bounds how long a cancelled worker takes to notice when nothing else
/// wakes it.
pub const WAKE_TIMEOUT: Duration = Duration::from_millis(100);

/// How often `join_timeout` checks whether the thread has finished
const JOIN_POLL: Duration = Duration::from_millis(5);

/// Result of one unit of work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// More work may follow; wait for the next signal
    Continue,
    /// The task is complete; exit the thread normally
    Finished,
}

/// One direction of disk I/O driven by an [`IoWorker`]
pub trait IoTask: Send + 'static {
    /// Thread name suffix and log label
    fn name(&self) -> &'static str;

    /// Whether the session permits this task to move data yet
    fn can_run(&self) -> bool;

    /// Whether the task has nothing left to do
    fn is_done(&self) -> bool;

    /// Samples of ring space (reader) or ring data (writer) available now
    fn available(&self) -> usize;

    /// Perform one blocking chunk of I/O covering at most `available` samples
    fn perform_chunk(&mut self, available: usize) -> SessionResult<ChunkOutcome>;

    /// Dropped-data events recorded by the task itself
    fn dropped_events(&self) -> u64 {
        0
    }

    /// Close the file; called once on every exit path
    fn close(&mut self) -> SessionResult<()>;
}

/// Run one iteration of a task's loop body
pub fn step<T: IoTask + ?Sized>(task: &mut T) -> SessionResult<ChunkOutcome> {
    if !task.can_run() {
        return Ok(ChunkOutcome::Continue);
    }
    if task.is_done() {
        return Ok(ChunkOutcome::Finished);
    }
    let available = task.available();
    if available == 0 {
        return Ok(ChunkOutcome::Continue);
    }
    task.perform_chunk(available)
}

/// Lock + condition variable used to wake one worker
#[derive(Debug, Default)]
pub struct WorkerSignal {
    lock: Mutex<()>,
    ready: Condvar,
}

impl WorkerSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wake the worker if its lock is free (realtime-safe, never blocks)
    ///
    /// Returns false when the worker currently holds the lock, i.e. it is
    /// already awake and busy with a chunk.
    #[inline]
    pub fn try_notify(&self) -> bool {
        match self.lock.try_lock() {
            Ok(_guard) => {
                self.ready.notify_one();
                true
            }
            Err(_) => false,
        }
    }
}

/// How a worker thread ended
#[derive(Debug)]
pub enum WorkerExit {
    /// Task completed normally
    Finished,
    /// Task stopped by cancellation
    Cancelled,
    /// Task failed
    Failed(SessionError),
}

impl WorkerExit {
    pub fn is_finished(&self) -> bool {
        matches!(self, WorkerExit::Finished)
    }
}

/// Final status of a worker thread
#[derive(Debug)]
pub struct WorkerReport {
    pub name: &'static str,
    pub exit: WorkerExit,
    /// Dropped-data events recorded by the task (reader ring underruns)
    pub dropped: u64,
}

/// Handle to a running worker thread
pub struct IoWorker {
    name: &'static str,
    handle: Option<JoinHandle<WorkerReport>>,
}

impl IoWorker {
    /// Spawn a thread running `task` until it finishes, fails or is cancelled
    pub fn spawn<T: IoTask>(
        task: T,
        signal: Arc<WorkerSignal>,
        state: Arc<SessionState>,
    ) -> SessionResult<Self> {
        let name = task.name();
        let handle = thread::Builder::new()
            .name(format!("playrec-{}", name))
            .spawn(move || run_worker(task, &signal, &state))
            .map_err(|source| SessionError::Spawn { name, source })?;

        Ok(Self {
            name,
            handle: Some(handle),
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether the thread has exited
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Wait for the thread to exit
    pub fn join(&mut self) -> WorkerReport {
        match self.handle.take() {
            Some(handle) => match handle.join() {
                Ok(report) => report,
                Err(_) => WorkerReport {
                    name: self.name,
                    exit: WorkerExit::Failed(SessionError::WorkerPanicked(self.name)),
                    dropped: 0,
                },
            },
            None => WorkerReport {
                name: self.name,
                exit: WorkerExit::Cancelled,
                dropped: 0,
            },
        }
    }

    /// Wait at most `timeout` for the thread to exit
    ///
    /// A thread still running at the deadline is detached and reported as
    /// cancelled; its file is closed whenever it does get to exit.
    pub fn join_timeout(&mut self, timeout: Duration) -> WorkerReport {
        let deadline = Instant::now() + timeout;
        while !self.is_finished() {
            if Instant::now() >= deadline {
                log::error!(
                    "{} thread did not stop within {:?}, detaching it",
                    self.name,
                    timeout
                );
                self.handle = None;
                return WorkerReport {
                    name: self.name,
                    exit: WorkerExit::Cancelled,
                    dropped: 0,
                };
            }
            thread::sleep(JOIN_POLL);
        }
        self.join()
    }
}

/// Worker thread body
fn run_worker<T: IoTask>(mut task: T, signal: &WorkerSignal, state: &SessionState) -> WorkerReport {
    let name = task.name();
    log::info!("{} thread started", name);

    let mut exit = {
        let mut guard = signal.lock.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if state.is_cancelled() {
                break WorkerExit::Cancelled;
            }
            match step(&mut task) {
                Ok(ChunkOutcome::Continue) => {}
                Ok(ChunkOutcome::Finished) => break WorkerExit::Finished,
                Err(SessionError::Cancelled) => break WorkerExit::Cancelled,
                Err(e) => break WorkerExit::Failed(e),
            }
            guard = match signal.ready.wait_timeout(guard, WAKE_TIMEOUT) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    };

    if let Err(e) = task.close() {
        log::error!("{} failed to close its file: {}", name, e);
        if exit.is_finished() {
            exit = WorkerExit::Failed(e);
        }
    }

    match &exit {
        WorkerExit::Finished => log::info!("{} thread finished", name),
        WorkerExit::Cancelled => log::warn!("{} thread cancelled", name),
        WorkerExit::Failed(e) => log::error!("{} thread failed: {}", name, e),
    }

    WorkerReport {
        name,
        exit,
        dropped: task.dropped_events(),
    }
}
