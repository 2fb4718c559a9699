//! Session lifecycle: startup order, waiting, cancellation and the final report
//!
//! A [`Session`] owns the shared state, both rings and both worker threads.
//! The startup order matters and is enforced step by step:
//!
//! ```text
//! Session::new ─► spawn_writer ─► spawn_reader ─► take_processor
//!                                                      │
//!                         (engine ports + activation) ◄┘
//!                                   │
//!                                 arm() ─► wait() ─► SessionReport
//! ```
//!
//! Workers start before the engine is activated but idle until [`Session::arm`],
//! so the realtime callback never sees a half-built session. Cancellation
//! (signal or engine shutdown) goes through a [`CancelHandle`]; `wait` then
//! gives each worker a bounded time to close its file.

mod error;
mod state;

pub use error::{SessionError, SessionResult, EXIT_CANCELLED, EXIT_FAILURE};
pub use state::{CancelHandle, ProcessStats, SessionState};

use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::audio_file::{FrameSink, FrameSource};
use crate::config::SessionConfig;
use crate::processor::Processor;
use crate::ring::{sample_ring, RingReader, RingWriter};
use crate::types::SAMPLE_SIZE;
use crate::worker::{IoWorker, ReaderTask, WorkerExit, WorkerReport, WorkerSignal, WriterTask};

/// How often `wait` looks at the workers and the dropout counters
const WAIT_POLL: Duration = Duration::from_millis(20);

/// One play+record run
pub struct Session {
    ring_size: usize,
    join_timeout: Duration,
    state: Arc<SessionState>,
    stats: Arc<ProcessStats>,
    reader_signal: Arc<WorkerSignal>,
    writer_signal: Arc<WorkerSignal>,
    reader: Option<IoWorker>,
    writer: Option<IoWorker>,
    /// Realtime halves of the rings with their channel counts, until taken
    playback: Option<(RingReader, usize)>,
    capture: Option<(RingWriter, usize)>,
}

impl Session {
    pub fn new(config: &SessionConfig) -> Self {
        log::debug!(
            "New session: rings of {} samples ({} KiB each)",
            config.ring_size,
            config.ring_size * SAMPLE_SIZE / 1024
        );
        Self {
            ring_size: config.ring_size,
            join_timeout: config.join_timeout(),
            state: Arc::new(SessionState::new()),
            stats: Arc::new(ProcessStats::new()),
            reader_signal: Arc::new(WorkerSignal::new()),
            writer_signal: Arc::new(WorkerSignal::new()),
            reader: None,
            writer: None,
            playback: None,
            capture: None,
        }
    }

    /// Handle for stopping the session from a signal handler or the engine
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle::new(
            self.state.clone(),
            self.reader_signal.clone(),
            self.writer_signal.clone(),
        )
    }

    /// Shared flags (read-only use outside the crate)
    pub fn state(&self) -> &Arc<SessionState> {
        &self.state
    }

    /// Dropout counters written by the processor
    pub fn stats(&self) -> &Arc<ProcessStats> {
        &self.stats
    }

    /// Start the writer thread recording into `sink`
    pub fn spawn_writer<K: FrameSink>(&mut self, sink: K) -> SessionResult<()> {
        if self.writer.is_some() {
            return Err(SessionError::NotReady("writer already spawned"));
        }
        let channels = sink.channels();
        self.check_ring_holds_frame(sink.path(), channels)?;
        let (producer, consumer) = sample_ring(self.ring_size);
        log::info!("Recording {} channels to {:?}", channels, sink.path());

        let task = WriterTask::new(sink, consumer, self.state.clone());
        self.writer = Some(IoWorker::spawn(
            task,
            self.writer_signal.clone(),
            self.state.clone(),
        )?);
        self.capture = Some((producer, channels));
        Ok(())
    }

    /// Start the reader thread playing from `source`
    ///
    /// A source whose rate differs from `engine_rate` cancels the session.
    pub fn spawn_reader<S: FrameSource>(&mut self, source: S, engine_rate: u32) -> SessionResult<()> {
        if self.writer.is_none() {
            return Err(SessionError::NotReady("spawn the writer before the reader"));
        }
        if self.reader.is_some() {
            return Err(SessionError::NotReady("reader already spawned"));
        }
        if source.sample_rate() != engine_rate {
            self.cancel_handle().cancel();
            return Err(SessionError::SampleRateMismatch {
                path: source.path().to_path_buf(),
                file: source.sample_rate(),
                engine: engine_rate,
            });
        }

        let channels = source.channels();
        self.check_ring_holds_frame(source.path(), channels)?;
        let (producer, consumer) = sample_ring(self.ring_size);
        log::info!(
            "Playing {:?} ({} channels, {}Hz)",
            source.path(),
            channels,
            engine_rate
        );

        let task = ReaderTask::new(source, producer, self.state.clone());
        self.reader = Some(IoWorker::spawn(
            task,
            self.reader_signal.clone(),
            self.state.clone(),
        )?);
        self.playback = Some((consumer, channels));
        Ok(())
    }

    /// A ring without room for one frame would never move any data
    fn check_ring_holds_frame(&self, path: &Path, channels: usize) -> SessionResult<()> {
        if self.ring_size < channels.max(1) {
            return Err(SessionError::RingTooSmall {
                path: path.to_path_buf(),
                ring_size: self.ring_size,
                channels,
            });
        }
        Ok(())
    }

    /// Hand out the realtime processor (once both workers are running)
    pub fn take_processor(&mut self) -> SessionResult<Processor> {
        match (self.playback.take(), self.capture.take()) {
            (Some((playback, playback_channels)), Some((capture, capture_channels))) => {
                Ok(Processor::new(
                    self.state.clone(),
                    self.stats.clone(),
                    playback,
                    playback_channels,
                    capture,
                    capture_channels,
                    self.reader_signal.clone(),
                    self.writer_signal.clone(),
                ))
            }
            (playback, capture) => {
                self.playback = playback;
                self.capture = capture;
                Err(SessionError::NotReady(
                    "processor needs both workers spawned and can only be taken once",
                ))
            }
        }
    }

    /// Let the processor and both workers start moving data
    pub fn arm(&self) {
        self.state.arm();
        log::info!("Session armed");
    }

    /// Block until both workers have exited, or until the session is cancelled
    ///
    /// After a cancellation each worker gets the configured join timeout to
    /// close its file; one that misses it is abandoned.
    pub fn wait(&mut self) -> SessionReport {
        let mut seen = XrunLog::default();
        loop {
            seen.log_new(&self.stats);
            if self.state.is_cancelled() {
                log::warn!(
                    "Session cancelled (reading {}, playing {}), stopping workers",
                    self.state.reading().name(),
                    self.state.playing().name()
                );
                break;
            }
            let reader_done = self.reader.as_ref().map_or(true, IoWorker::is_finished);
            let writer_done = self.writer.as_ref().map_or(true, IoWorker::is_finished);
            if reader_done && writer_done {
                break;
            }
            thread::sleep(WAIT_POLL);
        }

        let timeout = self.join_timeout;
        let reader = self.reader.take().map(|mut w| w.join_timeout(timeout));
        let writer = self.writer.take().map(|mut w| w.join_timeout(timeout));
        seen.log_new(&self.stats);

        SessionReport {
            reader,
            writer,
            overruns: self.stats.overruns(),
            underruns: self.stats.underruns(),
            ring_size: self.ring_size,
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // Abandoned mid-startup: stop the workers so their files get closed
        if self.reader.is_some() || self.writer.is_some() {
            self.cancel_handle().cancel();
            let timeout = self.join_timeout;
            for mut worker in [self.reader.take(), self.writer.take()].into_iter().flatten() {
                worker.join_timeout(timeout);
            }
        }
    }
}

/// Logs dropouts as the counters grow
#[derive(Default)]
struct XrunLog {
    overruns: u64,
    underruns: u64,
}

impl XrunLog {
    fn log_new(&mut self, stats: &ProcessStats) {
        let overruns = stats.overruns();
        if overruns > self.overruns {
            log::warn!(
                "capture overrun: {} cycle(s) dropped input ({} total)",
                overruns - self.overruns,
                overruns
            );
            self.overruns = overruns;
        }
        let underruns = stats.underruns();
        if underruns > self.underruns {
            log::warn!(
                "playback underrun: {} cycle(s) short of data ({} total)",
                underruns - self.underruns,
                underruns
            );
            self.underruns = underruns;
        }
    }
}

/// How a session ended
#[derive(Debug)]
pub struct SessionReport {
    pub reader: Option<WorkerReport>,
    pub writer: Option<WorkerReport>,
    /// Capture cycles that found the ring full
    pub overruns: u64,
    /// Playback cycles that found the ring short
    pub underruns: u64,
    ring_size: usize,
}

impl SessionReport {
    /// Ring underruns seen by the reader thread itself
    pub fn reader_underruns(&self) -> u64 {
        self.reader.as_ref().map_or(0, |r| r.dropped)
    }

    /// Total dropouts of any kind
    pub fn xruns(&self) -> u64 {
        self.overruns + self.underruns + self.reader_underruns()
    }

    /// Overall result: I/O error, then cancellation, then dropouts
    pub fn outcome(self) -> SessionResult<()> {
        let xruns = self.xruns();
        let SessionReport {
            reader,
            writer,
            overruns,
            underruns,
            ring_size,
        } = self;
        let reader_underruns = reader.as_ref().map_or(0, |r| r.dropped);

        let mut cancelled = false;
        let mut failure = None;
        for report in [reader, writer].into_iter().flatten() {
            match report.exit {
                WorkerExit::Finished => {}
                WorkerExit::Cancelled => cancelled = true,
                WorkerExit::Failed(e) => {
                    // Keep the first I/O error; any failure beats none
                    let replace = match &failure {
                        None => true,
                        Some(current) => !SessionError::is_io(current) && e.is_io(),
                    };
                    if replace {
                        failure = Some(e);
                    }
                }
            }
        }

        if let Some(e) = failure {
            return Err(e);
        }
        if cancelled {
            return Err(SessionError::Cancelled);
        }
        if xruns > 0 {
            log::error!("Dropouts occurred: try a bigger buffer than -b {}", ring_size);
            return Err(SessionError::Xruns {
                overruns,
                underruns: underruns + reader_underruns,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_file::AudioFileResult;
    use crate::types::Sample;
    use std::path::{Path, PathBuf};

    struct NullSource {
        path: PathBuf,
        rate: u32,
    }

    impl FrameSource for NullSource {
        fn channels(&self) -> usize {
            2
        }
        fn sample_rate(&self) -> u32 {
            self.rate
        }
        fn path(&self) -> &Path {
            &self.path
        }
        fn read_frames(&mut self, _buf: &mut [Sample]) -> AudioFileResult<usize> {
            Ok(0)
        }
    }

    struct NullSink(PathBuf, usize);

    impl FrameSink for NullSink {
        fn channels(&self) -> usize {
            self.1
        }
        fn path(&self) -> &Path {
            &self.0
        }
        fn write_frames(&mut self, buf: &[Sample]) -> AudioFileResult<usize> {
            Ok(buf.len() / self.1)
        }
        fn close(&mut self) -> AudioFileResult<()> {
            Ok(())
        }
    }

    fn source(rate: u32) -> NullSource {
        NullSource {
            path: PathBuf::from("in.wav"),
            rate,
        }
    }

    fn report(reader: WorkerExit, writer: WorkerExit, overruns: u64) -> SessionReport {
        SessionReport {
            reader: Some(WorkerReport {
                name: "reader",
                exit: reader,
                dropped: 0,
            }),
            writer: Some(WorkerReport {
                name: "writer",
                exit: writer,
                dropped: 0,
            }),
            overruns,
            underruns: 0,
            ring_size: 1024,
        }
    }

    #[test]
    fn test_outcome_priority() {
        assert!(report(WorkerExit::Finished, WorkerExit::Finished, 0).outcome().is_ok());

        let err = report(WorkerExit::Finished, WorkerExit::Finished, 3).outcome().unwrap_err();
        assert!(matches!(err, SessionError::Xruns { overruns: 3, .. }));
        assert_eq!(err.exit_code(), EXIT_FAILURE);

        let err = report(WorkerExit::Cancelled, WorkerExit::Finished, 3).outcome().unwrap_err();
        assert!(matches!(err, SessionError::Cancelled));
        assert_eq!(err.exit_code(), EXIT_CANCELLED);

        let short = SessionError::ShortWrite {
            path: PathBuf::from("out.wav"),
            written: 1,
            expected: 2,
        };
        let err = report(WorkerExit::Cancelled, WorkerExit::Failed(short), 3)
            .outcome()
            .unwrap_err();
        assert!(matches!(err, SessionError::ShortWrite { .. }));
    }

    #[test]
    fn test_io_error_beats_other_failures() {
        let io = SessionError::ShortRead {
            path: PathBuf::from("in.wav"),
            got: 1,
            expected: 2,
        };
        let err = report(
            WorkerExit::Failed(io),
            WorkerExit::Failed(SessionError::NotReady("other")),
            0,
        )
        .outcome()
        .unwrap_err();
        assert!(err.is_io());
    }

    #[test]
    fn test_reader_requires_writer_first() {
        let mut session = Session::new(&SessionConfig::default());
        let err = session.spawn_reader(source(44100), 44100).unwrap_err();
        assert!(matches!(err, SessionError::NotReady(_)));
        assert!(matches!(session.take_processor(), Err(SessionError::NotReady(_))));
    }

    #[test]
    fn test_rate_mismatch_cancels_session() {
        let mut session = Session::new(&SessionConfig::default().with_ring_size(256));
        session.spawn_writer(NullSink(PathBuf::from("out.wav"), 1)).unwrap();

        let err = session.spawn_reader(source(48000), 44100).unwrap_err();
        assert!(matches!(
            err,
            SessionError::SampleRateMismatch {
                file: 48000,
                engine: 44100,
                ..
            }
        ));
        assert!(session.state().is_cancelled());

        let report = session.wait();
        assert!(report.reader.is_none());
        assert!(matches!(report.outcome(), Err(SessionError::Cancelled)));
    }

    #[test]
    fn test_processor_taken_once() {
        let mut session = Session::new(&SessionConfig::default().with_ring_size(256));
        session.spawn_writer(NullSink(PathBuf::from("out.wav"), 1)).unwrap();
        session.spawn_reader(source(44100), 44100).unwrap();

        let processor = session.take_processor().unwrap();
        assert_eq!(processor.playback_channels(), 2);
        assert_eq!(processor.capture_channels(), 1);
        assert!(session.take_processor().is_err());

        session.cancel_handle().cancel();
        let report = session.wait();
        assert!(matches!(report.outcome(), Err(SessionError::Cancelled)));
    }

    #[test]
    fn test_ring_smaller_than_a_frame_is_rejected() {
        let mut session = Session::new(&SessionConfig::default().with_ring_size(1));
        let err = session
            .spawn_writer(NullSink(PathBuf::from("out.wav"), 2))
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::RingTooSmall {
                ring_size: 1,
                channels: 2,
                ..
            }
        ));

        // Mono capture fits, the stereo source does not
        session.spawn_writer(NullSink(PathBuf::from("out.wav"), 1)).unwrap();
        let err = session.spawn_reader(source(44100), 44100).unwrap_err();
        assert!(matches!(err, SessionError::RingTooSmall { channels: 2, .. }));
        assert_eq!(err.exit_code(), EXIT_FAILURE);
        assert!(session.take_processor().is_err());
    }
}
