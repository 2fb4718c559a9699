//! WAV reader/writer built on hound

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use super::{AudioFileError, AudioFileResult, FrameSink, FrameSource};
use crate::types::Sample;

/// Sample layout of an opened source file
#[derive(Debug, Clone, Copy)]
enum SourceLayout {
    Float,
    /// Integer PCM with the scale mapping full range onto [-1.0, 1.0)
    Int { scale: f32 },
}

/// WAV file opened for reading
///
/// A data chunk shorter than its header claims ends the stream early: the
/// read that hits the cut returns the whole frames before it, every later
/// read returns zero.
pub struct WavSource {
    path: PathBuf,
    reader: WavReader<BufReader<File>>,
    spec: WavSpec,
    layout: SourceLayout,
    truncated: bool,
}

impl WavSource {
    /// Open a WAV file and inspect its format
    pub fn open<P: AsRef<Path>>(path: P) -> AudioFileResult<Self> {
        let path = path.as_ref().to_path_buf();
        let reader = WavReader::open(&path)?;
        let spec = reader.spec();
        if spec.channels == 0 {
            return Err(AudioFileError::InvalidChannelCount(0));
        }

        let layout = match (spec.sample_format, spec.bits_per_sample) {
            (SampleFormat::Float, 32) => SourceLayout::Float,
            (SampleFormat::Int, bits @ 8..=32) => SourceLayout::Int {
                scale: 1.0 / (1u64 << (bits - 1)) as f32,
            },
            (format, bits) => {
                return Err(AudioFileError::UnsupportedFormat(format!(
                    "{:?} with {} bits per sample",
                    format, bits
                )))
            }
        };

        log::debug!(
            "Opened {:?} for reading ({} channels, {}Hz, {} bits {:?})",
            path,
            spec.channels,
            spec.sample_rate,
            spec.bits_per_sample,
            spec.sample_format
        );

        Ok(Self {
            path,
            reader,
            spec,
            layout,
            truncated: false,
        })
    }

    /// Total frames in the file according to its header
    pub fn frame_count(&self) -> u64 {
        self.reader.duration() as u64
    }
}

impl FrameSource for WavSource {
    fn channels(&self) -> usize {
        self.spec.channels as usize
    }

    fn sample_rate(&self) -> u32 {
        self.spec.sample_rate
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn read_frames(&mut self, buf: &mut [Sample]) -> AudioFileResult<usize> {
        if self.truncated {
            return Ok(0);
        }
        let channels = self.channels();
        let want = buf.len() - buf.len() % channels;

        let (filled, stopped) = match self.layout {
            SourceLayout::Float => fill(&mut buf[..want], self.reader.samples::<f32>(), |s| s),
            SourceLayout::Int { scale } => {
                fill(&mut buf[..want], self.reader.samples::<i32>(), |s| s as f32 * scale)
            }
        };

        match stopped {
            None => {}
            Some(e) if is_truncation(&e) => {
                log::warn!(
                    "{:?} is shorter than its header says, ending playback there",
                    self.path
                );
                self.truncated = true;
            }
            Some(e) => return Err(e.into()),
        }

        // A truncated trailing frame is dropped
        Ok(filled / channels)
    }
}

/// Convert samples into `slots` until either runs out or a sample fails
fn fill<S, I>(slots: &mut [Sample], samples: I, convert: impl Fn(S) -> Sample) -> (usize, Option<hound::Error>)
where
    I: Iterator<Item = hound::Result<S>>,
{
    let mut filled = 0;
    for (slot, sample) in slots.iter_mut().zip(samples) {
        match sample {
            Ok(sample) => {
                *slot = convert(sample);
                filled += 1;
            }
            Err(e) => return (filled, Some(e)),
        }
    }
    (filled, None)
}

/// Whether a decode error means the data simply stopped early
///
/// hound reports a short data chunk as an `Other` I/O error.
fn is_truncation(error: &hound::Error) -> bool {
    match error {
        hound::Error::IoError(e) => matches!(
            e.kind(),
            std::io::ErrorKind::UnexpectedEof | std::io::ErrorKind::Other
        ),
        _ => false,
    }
}

/// 32-bit float WAV file opened for writing
///
/// The header is finalized by [`FrameSink::close`]. If the sink is dropped
/// without being closed (a panicking thread, an early return) the drop
/// handler finalizes it instead so the file is never left corrupt.
pub struct WavSink {
    path: PathBuf,
    writer: Option<WavWriter<BufWriter<File>>>,
    channels: usize,
    frames_written: u64,
}

impl WavSink {
    /// Create (or truncate) a WAV file with the given layout
    pub fn create<P: AsRef<Path>>(
        path: P,
        channels: usize,
        sample_rate: u32,
    ) -> AudioFileResult<Self> {
        let path = path.as_ref().to_path_buf();
        let channels_u16 = u16::try_from(channels)
            .ok()
            .filter(|c| *c > 0)
            .ok_or(AudioFileError::InvalidChannelCount(channels))?;

        let spec = WavSpec {
            channels: channels_u16,
            sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let writer = WavWriter::create(&path, spec)?;

        log::debug!(
            "Opened {:?} for writing ({} channels, {}Hz, 32-bit float)",
            path,
            channels,
            sample_rate
        );

        Ok(Self {
            path,
            writer: Some(writer),
            channels,
            frames_written: 0,
        })
    }

    /// Frames written so far
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }
}

impl FrameSink for WavSink {
    fn channels(&self) -> usize {
        self.channels
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn write_frames(&mut self, buf: &[Sample]) -> AudioFileResult<usize> {
        let writer = self.writer.as_mut().ok_or(AudioFileError::Closed)?;
        let frames = buf.len() / self.channels;
        for &sample in &buf[..frames * self.channels] {
            writer.write_sample(sample)?;
        }
        self.frames_written += frames as u64;
        Ok(frames)
    }

    fn close(&mut self) -> AudioFileResult<()> {
        match self.writer.take() {
            Some(writer) => {
                writer.finalize()?;
                log::debug!("Closed {:?} after {} frames", self.path, self.frames_written);
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl Drop for WavSink {
    fn drop(&mut self) {
        if self.writer.is_some() {
            if let Err(e) = self.close() {
                log::error!("Failed to finalize {:?}: {}", self.path, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_file_written_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("float.wav");

        let mut sink = WavSink::create(&path, 2, 44100).unwrap();
        let frames = [0.0, 0.5, -0.5, 0.25, 1.0, -1.0];
        assert_eq!(sink.write_frames(&frames).unwrap(), 3);
        sink.close().unwrap();
        assert_eq!(sink.frames_written(), 3);

        let mut source = WavSource::open(&path).unwrap();
        assert_eq!(source.channels(), 2);
        assert_eq!(source.sample_rate(), 44100);
        assert_eq!(source.frame_count(), 3);

        let mut buf = [9.0f32; 4];
        assert_eq!(source.read_frames(&mut buf).unwrap(), 2);
        assert_eq!(buf, [0.0, 0.5, -0.5, 0.25]);
        assert_eq!(source.read_frames(&mut buf).unwrap(), 1);
        assert_eq!(&buf[..2], &[1.0, -1.0]);
        assert_eq!(source.read_frames(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_16bit_source_is_scaled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("int16.wav");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 48000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        writer.write_sample(i16::MIN).unwrap();
        writer.write_sample(0i16).unwrap();
        writer.write_sample(16384i16).unwrap();
        writer.finalize().unwrap();

        let mut source = WavSource::open(&path).unwrap();
        let mut buf = [0.0f32; 3];
        assert_eq!(source.read_frames(&mut buf).unwrap(), 3);
        assert_eq!(buf, [-1.0, 0.0, 0.5]);
    }

    #[test]
    fn test_dropped_sink_is_still_readable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dropped.wav");
        {
            let mut sink = WavSink::create(&path, 1, 44100).unwrap();
            sink.write_frames(&[0.1, 0.2, 0.3]).unwrap();
        }
        let reader = WavReader::open(&path).unwrap();
        assert_eq!(reader.duration(), 3);
    }

    #[test]
    fn test_zero_channel_sink_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let result = WavSink::create(dir.path().join("none.wav"), 0, 44100);
        assert!(matches!(result, Err(AudioFileError::InvalidChannelCount(0))));
    }

    #[test]
    fn test_missing_source_fails() {
        assert!(WavSource::open("/nonexistent/source.wav").is_err());
    }

    /// Write a 16-bit stereo ramp and cut `cut` bytes off the end of the file
    fn truncated_ramp(path: &Path, frames: usize, cut: u64) {
        let spec = WavSpec {
            channels: 2,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for i in 0..(frames * 2) as i16 {
            writer.write_sample(i).unwrap();
        }
        writer.finalize().unwrap();

        let file = std::fs::OpenOptions::new().write(true).open(path).unwrap();
        let len = file.metadata().unwrap().len();
        file.set_len(len - cut).unwrap();
    }

    #[test]
    fn test_truncated_data_ends_stream_after_last_whole_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("truncated.wav");
        // 400 bytes = 100 stereo 16-bit frames missing; 2 more bytes split a frame
        truncated_ramp(&path, 1000, 402);

        let mut source = WavSource::open(&path).unwrap();
        assert_eq!(source.frame_count(), 1000);

        let mut buf = vec![0.0f32; 512 * 2];
        assert_eq!(source.read_frames(&mut buf).unwrap(), 512);
        assert_eq!(buf[1023], 1023.0 / 32768.0);

        assert_eq!(source.read_frames(&mut buf).unwrap(), 387);
        assert_eq!(buf[0], 1024.0 / 32768.0);
        assert_eq!(buf[387 * 2 - 1], (899 * 2 - 2 + 1) as f32 / 32768.0);

        assert_eq!(source.read_frames(&mut buf).unwrap(), 0);
        assert_eq!(source.read_frames(&mut buf).unwrap(), 0);
    }
}
