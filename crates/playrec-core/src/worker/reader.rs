//! Reader task: source file → playback ring

use std::sync::Arc;

use super::{ChunkOutcome, IoTask};
use crate::audio_file::FrameSource;
use crate::ring::RingWriter;
use crate::session::{SessionError, SessionResult, SessionState};
use crate::types::{whole_frames, Sample, StreamStatus};

/// Decodes the source file into the playback ring, one chunk per wake-up
///
/// # End of file
///
/// A read returning fewer frames than requested cannot be told apart from a
/// slow device, so the first short read only raises `underfill`. Exactly
/// zero frames is the end of file, whether or not `underfill` is set. A
/// second short, non-zero read in a row is an I/O error. A full read clears
/// the flag again.
pub struct ReaderTask<S: FrameSource> {
    source: S,
    ring: RingWriter,
    state: Arc<SessionState>,
    channels: usize,
    /// Decode buffer, sized to the ring once so no chunk allocates
    scratch: Vec<Sample>,
    underfill: bool,
    underruns: u64,
}

impl<S: FrameSource> ReaderTask<S> {
    pub fn new(source: S, ring: RingWriter, state: Arc<SessionState>) -> Self {
        let channels = source.channels();
        let scratch = vec![0.0; ring.capacity()];
        Self {
            source,
            ring,
            state,
            channels,
            scratch,
            underfill: false,
            underruns: 0,
        }
    }

    fn fail(&self, error: SessionError) -> SessionResult<ChunkOutcome> {
        // Let playback drain what was read so the writer can still finish
        self.state.advance_reading(StreamStatus::Done);
        Err(error)
    }
}

impl<S: FrameSource> IoTask for ReaderTask<S> {
    fn name(&self) -> &'static str {
        "reader"
    }

    fn can_run(&self) -> bool {
        self.state.is_armed()
    }

    fn is_done(&self) -> bool {
        self.state.reading() == StreamStatus::Done
    }

    fn available(&self) -> usize {
        self.ring.writable()
    }

    fn perform_chunk(&mut self, available: usize) -> SessionResult<ChunkOutcome> {
        let requested = whole_frames(available.min(self.scratch.len()), self.channels);
        if requested == 0 {
            // Less than one frame of space: decoding would look like EOF
            return Ok(ChunkOutcome::Continue);
        }

        let len = requested * self.channels;
        let frames = match self.source.read_frames(&mut self.scratch[..len]) {
            Ok(frames) => frames,
            Err(source) => {
                let path = self.source.path().to_path_buf();
                return self.fail(SessionError::Io { path, source });
            }
        };
        if self.state.is_cancelled() {
            return Err(SessionError::Cancelled);
        }

        if frames == 0 {
            log::debug!("Reached end of {:?}", self.source.path());
            self.state.advance_reading(StreamStatus::Done);
            return Ok(ChunkOutcome::Finished);
        }

        if frames < requested && self.underfill {
            let path = self.source.path().to_path_buf();
            return self.fail(SessionError::ShortRead {
                path,
                got: frames,
                expected: requested,
            });
        }

        let samples = frames * self.channels;
        if self.ring.write(&self.scratch[..samples]) < samples {
            self.underruns += 1;
            log::warn!("reader: buffer underrun (ring accepted less than decoded)");
        }
        log::debug!("read {:6} frames", frames);
        self.state.advance_reading(StreamStatus::Running);

        if frames < requested {
            log::debug!(
                "expected {} frames but only read {}, waiting one cycle to make sure",
                requested,
                frames
            );
            self.underfill = true;
        } else {
            self.underfill = false;
        }
        Ok(ChunkOutcome::Continue)
    }

    fn dropped_events(&self) -> u64 {
        self.underruns
    }

    fn close(&mut self) -> SessionResult<()> {
        let path = self.source.path().to_path_buf();
        self.source
            .close()
            .map_err(|source| SessionError::Io { path, source })
    }
}
