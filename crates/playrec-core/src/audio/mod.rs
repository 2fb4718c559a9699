//! Audio engine adapter
//!
//! The session core is engine-agnostic: it only needs a periodic callback
//! that hands it per-port sample buffers ([`crate::processor::CycleBuffers`])
//! and a way to cancel on engine shutdown. On Linux with the `jack-backend`
//! feature this module provides that over JACK:
//!
//! ```text
//! JackEngine::open ──► activate(processor, cancel) ──► ActiveEngine::connect
//!   (client,            (register input_<i>/output_<i>,   (wire to the named
//!    rate, period)        start the process callback)       system ports)
//! ```
//!
//! # Example
//!
//! ```ignore
//! let engine = JackEngine::open("playrec")?;
//! let active = engine.activate(session.take_processor()?, session.cancel_handle())?;
//! active.connect(&config.capture_ports, &config.playback_ports)?;
//! session.arm();
//! ```

mod error;

#[cfg(all(target_os = "linux", feature = "jack-backend"))]
mod jack_backend;

pub use error::{AudioError, AudioResult};

#[cfg(all(target_os = "linux", feature = "jack-backend"))]
pub use jack_backend::{capture_port_name, playback_port_name, ActiveEngine, JackEngine};
