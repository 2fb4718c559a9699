//! Audio file access for the disk threads
//!
//! The session only needs two blocking primitives, "read N interleaved
//! frames" and "write N interleaved frames", expressed by [`FrameSource`]
//! and [`FrameSink`]. Both are only ever called from the reader/writer
//! threads, never from the realtime callback.
//!
//! The WAV implementations use `hound`:
//!
//! - [`WavSource`] reads 8/16/24/32-bit integer or 32-bit float WAV and
//!   converts to `f32` in [-1.0, 1.0)
//! - [`WavSink`] writes 32-bit float WAV and finalizes the header on close
//!   (or on drop, if the thread exits any other way)

mod error;
mod wav;

pub use error::{AudioFileError, AudioFileResult};
pub use wav::{WavSink, WavSource};

use std::path::Path;

use crate::types::Sample;

/// Blocking source of interleaved frames
pub trait FrameSource: Send + 'static {
    /// Number of interleaved channels per frame
    fn channels(&self) -> usize;

    /// Sample rate of the stream in Hz
    fn sample_rate(&self) -> u32;

    /// Path used in log and error messages
    fn path(&self) -> &Path;

    /// Fill `buf` (a whole number of frames) and return the frames read
    ///
    /// Zero means end of stream. Fewer than requested is ambiguous: it may
    /// be the end of the stream or a transient short read.
    fn read_frames(&mut self, buf: &mut [Sample]) -> AudioFileResult<usize>;

    /// Release the underlying file
    fn close(&mut self) -> AudioFileResult<()> {
        Ok(())
    }
}

/// Blocking sink for interleaved frames
pub trait FrameSink: Send + 'static {
    /// Number of interleaved channels per frame
    fn channels(&self) -> usize;

    /// Path used in log and error messages
    fn path(&self) -> &Path;

    /// Write `buf` (a whole number of frames) and return the frames accepted
    fn write_frames(&mut self, buf: &[Sample]) -> AudioFileResult<usize>;

    /// Flush and close the underlying file
    fn close(&mut self) -> AudioFileResult<()>;
}
