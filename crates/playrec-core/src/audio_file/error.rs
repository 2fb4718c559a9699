//! Audio file error types

use thiserror::Error;

/// Errors that can occur while reading or writing audio files
#[derive(Error, Debug)]
pub enum AudioFileError {
    /// Codec-level failure (bad header, truncated data, disk error)
    #[error("WAV codec error: {0}")]
    Codec(#[from] hound::Error),

    /// File uses a sample layout we cannot convert to f32
    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),

    /// Channel count outside the range a WAV file can hold
    #[error("Invalid channel count: {0}")]
    InvalidChannelCount(usize),

    /// File has already been closed
    #[error("File already closed")]
    Closed,
}

/// Result type for audio file operations
pub type AudioFileResult<T> = Result<T, AudioFileError>;
