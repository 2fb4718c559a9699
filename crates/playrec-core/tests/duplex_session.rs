//! Full sessions over real WAV files, driven by a simulated engine thread
//!
//! The fake engine runs fixed-size cycles on its own thread and loops every
//! output port back into the matching input port one cycle later, so the
//! recording should be the source delayed by exactly one cycle.

use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use playrec_core::audio_file::{WavSink, WavSource};
use playrec_core::config::SessionConfig;
use playrec_core::processor::{CycleBuffers, Processor};
use playrec_core::session::{Session, SessionError, SessionState, EXIT_CANCELLED};
use playrec_core::types::{Sample, StreamStatus};

const RATE: u32 = 44100;
const CHANNELS: usize = 2;
const PERIOD: usize = 256;

/// Port buffers where each input hears the previous cycle's output
struct LoopbackBuffers {
    inputs: Vec<Vec<Sample>>,
    outputs: Vec<Vec<Sample>>,
}

impl LoopbackBuffers {
    fn new(channels: usize, frames: usize) -> Self {
        Self {
            inputs: vec![vec![0.0; frames]; channels],
            outputs: vec![vec![0.0; frames]; channels],
        }
    }

    fn loop_back(&mut self) {
        for (input, output) in self.inputs.iter_mut().zip(&self.outputs) {
            input.copy_from_slice(output);
        }
    }
}

impl CycleBuffers for LoopbackBuffers {
    fn input(&self, channel: usize) -> &[Sample] {
        &self.inputs[channel]
    }

    fn output(&mut self, channel: usize) -> &mut [Sample] {
        &mut self.outputs[channel]
    }
}

/// Run cycles until playback is done or the session is cancelled
fn spawn_engine(mut processor: Processor, state: Arc<SessionState>) -> JoinHandle<usize> {
    thread::spawn(move || {
        let mut buffers = LoopbackBuffers::new(CHANNELS, PERIOD);
        let mut cycles = 0;
        while !state.is_cancelled() && state.playing() != StreamStatus::Done {
            processor.process_cycle(&mut buffers, PERIOD);
            buffers.loop_back();
            cycles += 1;
            thread::sleep(Duration::from_millis(1));
        }
        cycles
    })
}

fn source_sample(frame: usize, channel: usize) -> i16 {
    ((frame * 7 + channel * 1000) % 20000) as i16 - 10000
}

/// Write a 16-bit stereo source file of `frames` frames
fn write_source(path: &Path, frames: usize, rate: u32) {
    let spec = WavSpec {
        channels: CHANNELS as u16,
        sample_rate: rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec).unwrap();
    for frame in 0..frames {
        for channel in 0..CHANNELS {
            writer.write_sample(source_sample(frame, channel)).unwrap();
        }
    }
    writer.finalize().unwrap();
}

fn read_recording(path: &Path) -> (WavSpec, Vec<f32>) {
    let mut reader = WavReader::open(path).unwrap();
    let spec = reader.spec();
    let samples = reader.samples::<f32>().map(|s| s.unwrap()).collect();
    (spec, samples)
}

fn start_session(source: &Path, dest: &Path) -> (Session, JoinHandle<usize>) {
    let config = SessionConfig::default().with_capture_channels(CHANNELS);
    let mut session = Session::new(&config);
    session
        .spawn_writer(WavSink::create(dest, CHANNELS, RATE).unwrap())
        .unwrap();
    session
        .spawn_reader(WavSource::open(source).unwrap(), RATE)
        .unwrap();

    let engine = spawn_engine(session.take_processor().unwrap(), session.state().clone());
    session.arm();
    (session, engine)
}

#[test]
fn test_loopback_session_records_every_frame() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("source.wav");
    let dest = dir.path().join("dest.wav");
    let frames = RATE as usize;
    write_source(&source, frames, RATE);

    let (mut session, engine) = start_session(&source, &dest);
    let report = session.wait();
    engine.join().unwrap();

    assert_eq!(report.xruns(), 0);
    report.outcome().unwrap();

    let (spec, recorded) = read_recording(&dest);
    assert_eq!(spec.channels as usize, CHANNELS);
    assert_eq!(spec.sample_rate, RATE);
    assert_eq!(spec.bits_per_sample, 32);
    assert_eq!(spec.sample_format, SampleFormat::Float);

    let recorded_frames = recorded.len() / CHANNELS;
    assert!(recorded_frames >= frames, "only {} frames recorded", recorded_frames);
    assert!(recorded_frames <= frames + 3 * PERIOD, "{} frames recorded", recorded_frames);

    // One cycle of silence, then the source, then the zero-filled tail
    let delay = PERIOD * CHANNELS;
    assert!(recorded[..delay].iter().all(|s| *s == 0.0));
    for frame in 0..frames {
        for channel in 0..CHANNELS {
            let expected = source_sample(frame, channel) as f32 / 32768.0;
            assert_eq!(recorded[delay + frame * CHANNELS + channel], expected);
        }
    }
    assert!(recorded[delay + frames * CHANNELS..].iter().all(|s| *s == 0.0));
}

#[test]
fn test_cancelled_session_stops_promptly_and_leaves_valid_file() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("long.wav");
    let dest = dir.path().join("partial.wav");
    write_source(&source, RATE as usize * 30, RATE);

    let (mut session, engine) = start_session(&source, &dest);
    let cancel = session.cancel_handle();
    thread::sleep(Duration::from_millis(100));

    let started = Instant::now();
    cancel.cancel();
    let report = session.wait();
    engine.join().unwrap();
    assert!(started.elapsed() < Duration::from_secs(2));

    let err = report.outcome().unwrap_err();
    assert!(matches!(err, SessionError::Cancelled));
    assert_eq!(err.exit_code(), EXIT_CANCELLED);

    // Header finalized: the file opens and every sample decodes
    let (spec, recorded) = read_recording(&dest);
    assert_eq!(spec.channels as usize, CHANNELS);
    assert_eq!(recorded.len() % CHANNELS, 0);
    assert!(recorded.len() < RATE as usize * 30 * CHANNELS);
}

#[test]
fn test_sample_rate_mismatch_aborts_before_any_audio() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("48k.wav");
    let dest = dir.path().join("never.wav");
    write_source(&source, 4800, 48000);

    let mut session = Session::new(&SessionConfig::default());
    session
        .spawn_writer(WavSink::create(&dest, CHANNELS, RATE).unwrap())
        .unwrap();
    let err = session
        .spawn_reader(WavSource::open(&source).unwrap(), RATE)
        .unwrap_err();
    assert!(matches!(err, SessionError::SampleRateMismatch { file: 48000, engine: RATE, .. }));

    let report = session.wait();
    assert!(matches!(report.outcome(), Err(SessionError::Cancelled)));

    let (_, recorded) = read_recording(&dest);
    assert!(recorded.is_empty());
}

#[test]
fn test_dropping_unstarted_session_closes_destination() {
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("abandoned.wav");
    {
        let mut session = Session::new(&SessionConfig::default());
        session
            .spawn_writer(WavSink::create(&dest, 1, RATE).unwrap())
            .unwrap();
    }
    let reader = WavReader::open(&dest).unwrap();
    assert_eq!(reader.duration(), 0);
}

#[test]
fn test_truncated_source_plays_what_is_there() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("cut.wav");
    let dest = dir.path().join("dest.wav");
    let frames = 4410;
    write_source(&source, frames, RATE);
    // Drop the last 100 frames without fixing the header
    let file = std::fs::OpenOptions::new().write(true).open(&source).unwrap();
    file.set_len(file.metadata().unwrap().len() - 100 * CHANNELS as u64 * 2).unwrap();
    let kept = frames - 100;

    let (mut session, engine) = start_session(&source, &dest);
    let report = session.wait();
    engine.join().unwrap();

    assert_eq!(report.xruns(), 0);
    report.outcome().unwrap();

    let (_, recorded) = read_recording(&dest);
    let delay = PERIOD * CHANNELS;
    assert!(recorded.len() >= delay + kept * CHANNELS);
    for frame in 0..kept {
        for channel in 0..CHANNELS {
            let expected = source_sample(frame, channel) as f32 / 32768.0;
            assert_eq!(recorded[delay + frame * CHANNELS + channel], expected);
        }
    }
    assert!(recorded[delay + kept * CHANNELS..].iter().all(|s| *s == 0.0));
}

