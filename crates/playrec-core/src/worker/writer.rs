//! Writer task: capture ring → destination file

use std::sync::Arc;

use super::{ChunkOutcome, IoTask};
use crate::audio_file::FrameSink;
use crate::ring::RingReader;
use crate::session::{SessionError, SessionResult, SessionState};
use crate::types::{whole_frames, Sample, StreamStatus};

/// Drains the capture ring into the destination file
///
/// Finishes once playback is done and the ring has been emptied, so every
/// frame captured before the last playback cycle reaches the file.
pub struct WriterTask<K: FrameSink> {
    sink: K,
    ring: RingReader,
    state: Arc<SessionState>,
    channels: usize,
    scratch: Vec<Sample>,
}

impl<K: FrameSink> WriterTask<K> {
    pub fn new(sink: K, ring: RingReader, state: Arc<SessionState>) -> Self {
        let channels = sink.channels();
        let scratch = vec![0.0; ring.capacity()];
        Self {
            sink,
            ring,
            state,
            channels,
            scratch,
        }
    }
}

impl<K: FrameSink> IoTask for WriterTask<K> {
    fn name(&self) -> &'static str {
        "writer"
    }

    fn can_run(&self) -> bool {
        self.state.is_armed()
    }

    fn is_done(&self) -> bool {
        // Load `playing` first: the callback stops capturing before it
        // publishes Done, so an empty ring seen afterwards stays empty
        self.state.playing() == StreamStatus::Done && self.ring.is_empty()
    }

    fn available(&self) -> usize {
        self.ring.readable()
    }

    fn perform_chunk(&mut self, available: usize) -> SessionResult<ChunkOutcome> {
        let frames = whole_frames(available.min(self.scratch.len()), self.channels);
        if frames == 0 {
            return Ok(ChunkOutcome::Continue);
        }

        let len = frames * self.channels;
        let read = self.ring.read(&mut self.scratch[..len]);
        debug_assert_eq!(read, len);

        let written = self
            .sink
            .write_frames(&self.scratch[..len])
            .map_err(|source| SessionError::Io {
                path: self.sink.path().to_path_buf(),
                source,
            })?;
        if written < frames {
            return Err(SessionError::ShortWrite {
                path: self.sink.path().to_path_buf(),
                written,
                expected: frames,
            });
        }
        log::debug!("wrote {:5} frames", frames);
        Ok(ChunkOutcome::Continue)
    }

    fn close(&mut self) -> SessionResult<()> {
        let path = self.sink.path().to_path_buf();
        self.sink
            .close()
            .map_err(|source| SessionError::Io { path, source })
    }
}
