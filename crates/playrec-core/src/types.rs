//! Common types for playrec
//!
//! Sample and frame vocabulary shared by the rings, the workers and the
//! realtime processor.

/// Audio sample type (32-bit float, the JACK native sample format)
pub type Sample = f32;

/// Size of one sample in bytes
pub const SAMPLE_SIZE: usize = std::mem::size_of::<Sample>();

/// Largest block the realtime processor handles in one pass (frames)
///
/// Cycles longer than this are split into several passes over the same
/// pre-allocated scratch buffer. Covers every common JACK period size.
pub const MAX_BLOCK_FRAMES: usize = 8192;

/// Progress of one stream direction
///
/// Ordered: a stream only ever moves forward, Idle → Running → Done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum StreamStatus {
    /// Nothing has happened yet
    Idle = 0,
    /// Data is flowing
    Running = 1,
    /// End of stream reached
    Done = 2,
}

impl StreamStatus {
    /// Convert from the stored byte representation
    #[inline]
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => StreamStatus::Idle,
            1 => StreamStatus::Running,
            _ => StreamStatus::Done,
        }
    }

    /// Get the name of this status
    pub fn name(&self) -> &'static str {
        match self {
            StreamStatus::Idle => "idle",
            StreamStatus::Running => "running",
            StreamStatus::Done => "done",
        }
    }
}

/// Number of whole frames contained in `samples` interleaved samples
#[inline]
pub fn whole_frames(samples: usize, channels: usize) -> usize {
    if channels == 0 {
        0
    } else {
        samples / channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_status_ordering() {
        assert!(StreamStatus::Idle < StreamStatus::Running);
        assert!(StreamStatus::Running < StreamStatus::Done);
        assert_eq!(StreamStatus::from_u8(StreamStatus::Running as u8), StreamStatus::Running);
        assert_eq!(StreamStatus::from_u8(7), StreamStatus::Done);
    }

    #[test]
    fn test_whole_frames() {
        assert_eq!(whole_frames(10, 2), 5);
        assert_eq!(whole_frames(11, 2), 5);
        assert_eq!(whole_frames(2, 3), 0);
        assert_eq!(whole_frames(100, 0), 0);
    }
}
