//! playrec - play a file through JACK while recording from JACK into another
//!
//! ```text
//! playrec [-b samples] [-i in1,in2] [-o out1,out2] SOURCE DEST
//! ```
//!
//! Exit status: 0 on success, 32 when cancelled by a signal or by the JACK
//! server going away, 1 on any other failure (including dropouts).

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use playrec_core::config::{default_config_path, load_config, save_config, SessionConfig};
use playrec_core::session::{SessionError, EXIT_CANCELLED, EXIT_FAILURE};

#[derive(Parser, Debug)]
#[command(name = "playrec", version)]
#[command(about = "Play an audio file through JACK while recording JACK inputs to another file")]
struct Args {
    /// Audio file to play (its sample rate must match the JACK server's)
    source: PathBuf,

    /// File to record into (32-bit float WAV)
    dest: PathBuf,

    /// Ring buffer size in samples, per direction
    #[arg(short, long, value_name = "SAMPLES")]
    bufsize: Option<usize>,

    /// Comma-separated JACK ports to record from, one per channel
    #[arg(short, long, value_name = "PORTS", value_delimiter = ',')]
    inports: Option<Vec<String>>,

    /// Comma-separated JACK ports to play to, one per source channel
    #[arg(short, long, value_name = "PORTS", value_delimiter = ',')]
    outports: Option<Vec<String>>,

    /// Channels to record (default: one per input port)
    #[arg(short, long)]
    channels: Option<usize>,

    /// JACK client name
    #[arg(short = 'n', long)]
    client_name: Option<String>,

    /// Config file (default: <config dir>/playrec/config.yaml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write the merged settings back to the config file before starting
    #[arg(long)]
    save_config: bool,
}

impl Args {
    /// Config file values overridden by whatever was given on the command line
    fn apply(&self, mut config: SessionConfig) -> SessionConfig {
        if let Some(name) = &self.client_name {
            config.client_name = name.clone();
        }
        if let Some(samples) = self.bufsize {
            config.ring_size = samples;
        }
        if let Some(ports) = &self.inports {
            config.capture_ports = port_list(ports);
        }
        if let Some(ports) = &self.outports {
            config.playback_ports = port_list(ports);
        }
        if let Some(channels) = self.channels {
            config.capture_channels = Some(channels);
        }
        config
    }
}

/// Load the config file, apply the command line and optionally persist the result
fn prepare_config(args: &Args) -> Result<SessionConfig> {
    let path = args.config.clone().unwrap_or_else(default_config_path);
    let config = args.apply(load_config(&path));
    if args.save_config {
        save_config(&config, &path)?;
    }
    Ok(config)
}

/// Run `handler` on a dedicated thread each time SIGQUIT arrives
///
/// ctrlc covers SIGINT, SIGTERM and SIGHUP only.
#[cfg(unix)]
#[cfg_attr(not(all(target_os = "linux", feature = "jack-backend")), allow(dead_code))]
fn on_quit<F>(handler: F) -> Result<()>
where
    F: Fn() + Send + 'static,
{
    use anyhow::Context;
    use signal_hook::consts::SIGQUIT;
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGQUIT]).context("Failed to set SIGQUIT handler")?;
    std::thread::Builder::new()
        .name("sigquit".into())
        .spawn(move || {
            for _ in signals.forever() {
                handler();
            }
        })
        .context("Failed to spawn SIGQUIT thread")?;
    Ok(())
}

#[cfg(not(unix))]
#[cfg_attr(not(all(target_os = "linux", feature = "jack-backend")), allow(dead_code))]
fn on_quit<F>(_handler: F) -> Result<()>
where
    F: Fn() + Send + 'static,
{
    Ok(())
}

/// Drop the empty entries a stray comma leaves behind
fn port_list(names: &[String]) -> Vec<String> {
    names
        .iter()
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // Usage goes to stderr on misuse, stdout for --help/--version
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(EXIT_FAILURE as u8)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let config = match prepare_config(&args) {
        Ok(config) => config,
        Err(e) => {
            log::error!("{:#}", e);
            return ExitCode::from(EXIT_FAILURE as u8);
        }
    };

    match run(&args, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let code = e
                .downcast_ref::<SessionError>()
                .map_or(EXIT_FAILURE, SessionError::exit_code);
            if code == EXIT_CANCELLED {
                log::warn!("{}", e);
            } else {
                log::error!("{:#}", e);
            }
            ExitCode::from(code as u8)
        }
    }
}

#[cfg(all(target_os = "linux", feature = "jack-backend"))]
fn run(args: &Args, config: &SessionConfig) -> Result<()> {
    use anyhow::Context;
    use playrec_core::audio::JackEngine;
    use playrec_core::audio_file::{WavSink, WavSource};
    use playrec_core::session::Session;

    config.validate()?;

    let mut session = Session::new(config);
    let cancel = session.cancel_handle();
    ctrlc::set_handler(move || {
        log::warn!("Termination signal received, stopping");
        cancel.cancel();
    })
    .context("Failed to set signal handler")?;
    let cancel = session.cancel_handle();
    on_quit(move || {
        log::warn!("Quit signal received, stopping");
        cancel.cancel();
    })?;

    let engine = JackEngine::open(&config.client_name)?;
    let rate = engine.sample_rate();

    let sink = WavSink::create(&args.dest, config.capture_channel_count(), rate).map_err(
        |source| SessionError::FileOpen {
            path: args.dest.clone(),
            source,
        },
    )?;
    session.spawn_writer(sink)?;

    let source = WavSource::open(&args.source).map_err(|source| SessionError::FileOpen {
        path: args.source.clone(),
        source,
    })?;
    session.spawn_reader(source, rate)?;

    let active = engine.activate(session.take_processor()?, session.cancel_handle())?;
    active.connect(&config.capture_ports, &config.playback_ports)?;

    session.arm();
    let report = session.wait();
    if let Err(e) = active.deactivate() {
        log::warn!("{}", e);
    }

    report.outcome()?;
    log::info!("Finished: {:?} recorded", args.dest);
    Ok(())
}

#[cfg(not(all(target_os = "linux", feature = "jack-backend")))]
fn run(_args: &Args, config: &SessionConfig) -> Result<()> {
    config.validate()?;
    anyhow::bail!("playrec was built without JACK support (enable the jack-backend feature)")
}
