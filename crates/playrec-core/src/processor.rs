//! Realtime processor: moves samples between engine ports and the rings
//!
//! [`Processor::process_cycle`] is called once per engine cycle from the
//! realtime thread. It never blocks, never allocates and never logs; every
//! problem it sees is folded into [`ProcessStats`] for the coordinator to
//! report from an ordinary thread.
//!
//! Per cycle, in order:
//!
//! 1. Nothing happens until the session is armed.
//! 2. Once playback is done every output is zeroed.
//! 3. While the reader has started: capture inputs → capture ring, then
//!    playback ring → outputs.
//! 4. Both workers get a best-effort wake-up.

use std::sync::Arc;

use crate::ring::{RingReader, RingWriter};
use crate::session::{ProcessStats, SessionState};
use crate::types::{whole_frames, Sample, StreamStatus, MAX_BLOCK_FRAMES};
use crate::worker::WorkerSignal;

/// Per-cycle view of the engine's port buffers
///
/// Buffers are only valid for the cycle that produced them and must be
/// fetched again every cycle.
pub trait CycleBuffers {
    /// Samples captured on input port `channel` this cycle
    fn input(&self, channel: usize) -> &[Sample];

    /// Buffer to fill for output port `channel` this cycle
    fn output(&mut self, channel: usize) -> &mut [Sample];
}

/// State owned by the realtime callback
pub struct Processor {
    state: Arc<SessionState>,
    stats: Arc<ProcessStats>,
    playback: RingReader,
    capture: RingWriter,
    playback_channels: usize,
    capture_channels: usize,
    reader_signal: Arc<WorkerSignal>,
    writer_signal: Arc<WorkerSignal>,
    /// Interleave buffer for one block of `MAX_BLOCK_FRAMES` frames
    scratch: Vec<Sample>,
}

impl Processor {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        state: Arc<SessionState>,
        stats: Arc<ProcessStats>,
        playback: RingReader,
        playback_channels: usize,
        capture: RingWriter,
        capture_channels: usize,
        reader_signal: Arc<WorkerSignal>,
        writer_signal: Arc<WorkerSignal>,
    ) -> Self {
        let widest = playback_channels.max(capture_channels).max(1);
        Self {
            state,
            stats,
            playback,
            capture,
            playback_channels,
            capture_channels,
            reader_signal,
            writer_signal,
            scratch: vec![0.0; MAX_BLOCK_FRAMES * widest],
        }
    }

    /// Number of output ports this processor feeds
    pub fn playback_channels(&self) -> usize {
        self.playback_channels
    }

    /// Number of input ports this processor records
    pub fn capture_channels(&self) -> usize {
        self.capture_channels
    }

    /// Process one engine cycle of `frames` frames
    pub fn process_cycle<B: CycleBuffers>(&mut self, buffers: &mut B, frames: usize) {
        if !self.state.is_armed() {
            return;
        }

        if self.state.playing() == StreamStatus::Done {
            self.mute(buffers, frames);
        } else if self.state.reading() != StreamStatus::Idle {
            self.capture_inputs(buffers, frames);
            self.play_outputs(buffers, frames);
        }

        self.reader_signal.try_notify();
        self.writer_signal.try_notify();
    }

    /// Interleave the input ports into the capture ring
    fn capture_inputs<B: CycleBuffers>(&mut self, buffers: &B, frames: usize) {
        let channels = self.capture_channels;
        if channels == 0 {
            return;
        }

        let mut offset = 0;
        while offset < frames {
            let block = (frames - offset).min(MAX_BLOCK_FRAMES);
            let room = whole_frames(self.capture.writable(), channels);
            let fit = block.min(room);

            for ch in 0..channels {
                let input = &buffers.input(ch)[offset..offset + fit];
                for (frame, &sample) in input.iter().enumerate() {
                    self.scratch[frame * channels + ch] = sample;
                }
            }
            self.capture.write(&self.scratch[..fit * channels]);

            if fit < block {
                // Drop the rest of this cycle rather than split a frame
                self.stats.record_overrun();
                return;
            }
            offset += block;
        }
    }

    /// De-interleave the playback ring into the output ports
    fn play_outputs<B: CycleBuffers>(&mut self, buffers: &mut B, frames: usize) {
        let channels = self.playback_channels;
        if channels == 0 {
            return;
        }

        // Load `reading` before looking at the ring: once Done is seen,
        // nothing more will ever be written to it
        let reading = self.state.reading();
        if reading == StreamStatus::Done && self.playback.is_empty() {
            self.state.advance_playing(StreamStatus::Done);
            self.mute(buffers, frames);
            return;
        }

        let mut offset = 0;
        while offset < frames {
            let block = (frames - offset).min(MAX_BLOCK_FRAMES);
            let want = block * channels;
            let got = self.playback.read(&mut self.scratch[..want]);

            if got < want && reading == StreamStatus::Done {
                // End-of-stream tail: silence through the end of the cycle,
                // including any blocks after this one
                self.scratch[got..want].fill(0.0);
                self.scatter(buffers, offset, want);
                for ch in 0..channels {
                    buffers.output(ch)[offset + block..frames].fill(0.0);
                }
                return;
            }
            self.scatter(buffers, offset, got);

            if got < want {
                self.stats.record_underrun();
                return;
            }
            offset += block;
        }
    }

    /// Copy the first `samples` interleaved samples of scratch to the outputs
    fn scatter<B: CycleBuffers>(&self, buffers: &mut B, offset: usize, samples: usize) {
        let channels = self.playback_channels;
        for ch in 0..channels {
            let Some(column) = self.scratch.get(ch..samples) else {
                break;
            };
            let output = &mut buffers.output(ch)[offset..];
            for (slot, &sample) in output.iter_mut().zip(column.iter().step_by(channels)) {
                *slot = sample;
            }
        }
    }

    fn mute<B: CycleBuffers>(&self, buffers: &mut B, frames: usize) {
        for ch in 0..self.playback_channels {
            buffers.output(ch)[..frames].fill(0.0);
        }
    }
}
