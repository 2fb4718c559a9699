//! Session error types

use std::path::PathBuf;

use thiserror::Error;

use crate::audio::AudioError;
use crate::audio_file::AudioFileError;

/// Exit status used when the session was cancelled (matches `EPIPE`)
pub const EXIT_CANCELLED: i32 = 32;

/// Exit status for every other failure
pub const EXIT_FAILURE: i32 = 1;

/// Errors that end a session or one of its workers
#[derive(Error, Debug)]
pub enum SessionError {
    /// Source or destination file could not be opened
    #[error("Cannot open {path:?}: {source}")]
    FileOpen {
        path: PathBuf,
        #[source]
        source: AudioFileError,
    },

    /// Source file rate differs from the engine rate
    #[error("Sample rate mismatch: {path:?} is {file}Hz but the engine runs at {engine}Hz")]
    SampleRateMismatch {
        path: PathBuf,
        file: u32,
        engine: u32,
    },

    /// Codec failure while the session was running
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: AudioFileError,
    },

    /// Two consecutive short reads that were not end of file
    #[error("Cannot read {path:?}: short read of {got} frames (expected {expected}) after an earlier short read")]
    ShortRead {
        path: PathBuf,
        got: usize,
        expected: usize,
    },

    /// Codec accepted fewer frames than supplied
    #[error("Cannot write {path:?}: wrote {written} of {expected} frames")]
    ShortWrite {
        path: PathBuf,
        written: usize,
        expected: usize,
    },

    /// Ring too small to hold a single frame of a file
    #[error("Ring of {ring_size} samples cannot hold one {channels}-channel frame of {path:?}, use a bigger -b")]
    RingTooSmall {
        path: PathBuf,
        ring_size: usize,
        channels: usize,
    },

    /// Worker thread could not be started
    #[error("Failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// Worker thread panicked
    #[error("{0} thread panicked")]
    WorkerPanicked(&'static str),

    /// A step of the startup sequence was skipped
    #[error("Session not ready: {0}")]
    NotReady(&'static str),

    /// Audio engine failure (client, ports, connections)
    #[error(transparent)]
    Audio(#[from] AudioError),

    /// Stopped by a signal or by the audio engine shutting down
    #[error("Session cancelled")]
    Cancelled,

    /// Realtime dropouts occurred
    #[error("Session finished with {overruns} overruns and {underruns} underruns")]
    Xruns { overruns: u64, underruns: u64 },
}

impl SessionError {
    /// Process exit status for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            SessionError::Cancelled => EXIT_CANCELLED,
            _ => EXIT_FAILURE,
        }
    }

    /// Whether this is a worker I/O failure (highest reporting priority)
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            SessionError::Io { .. }
                | SessionError::ShortRead { .. }
                | SessionError::ShortWrite { .. }
                | SessionError::WorkerPanicked(_)
        )
    }
}

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;
