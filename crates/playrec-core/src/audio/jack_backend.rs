//! JACK engine adapter for Linux
//!
//! Registers one input port per recorded channel and one output port per
//! source channel, runs the [`Processor`] in the JACK process callback and
//! cancels the session if the server shuts the client down.
//!
//! # Ports
//!
//! Ports are named `<client>:input_<i>` and `<client>:output_<i>`, counting
//! from zero in channel order. They are registered before activation and
//! connected after it (JACK refuses connections to inactive clients).

use jack::{
    AsyncClient, AudioIn, AudioOut, Client, ClientOptions, ClientStatus, Control, Port,
    ProcessScope,
};

use super::error::{AudioError, AudioResult};
use crate::processor::{CycleBuffers, Processor};
use crate::session::CancelHandle;
use crate::types::Sample;

/// Short name of capture port `index`
pub fn capture_port_name(index: usize) -> String {
    format!("input_{}", index)
}

/// Short name of playback port `index`
pub fn playback_port_name(index: usize) -> String {
    format!("output_{}", index)
}

/// JACK client opened but not yet running
pub struct JackEngine {
    client: Client,
    sample_rate: u32,
    buffer_size: u32,
}

impl JackEngine {
    /// Connect to a running JACK server (never starts one)
    pub fn open(client_name: &str) -> AudioResult<Self> {
        let (client, _status) = Client::new(client_name, ClientOptions::NO_START_SERVER)
            .map_err(|e| AudioError::ClientOpen(e.to_string()))?;

        let sample_rate = client.sample_rate() as u32;
        let buffer_size = client.buffer_size();

        log::info!(
            "JACK client '{}' created (sample rate: {}Hz, buffer: {} frames, latency: {:.1}ms)",
            client.name(),
            sample_rate,
            buffer_size,
            (buffer_size as f32 / sample_rate as f32) * 1000.0
        );

        Ok(Self {
            client,
            sample_rate,
            buffer_size,
        })
    }

    /// Name the server assigned (may differ from the requested one)
    pub fn name(&self) -> &str {
        self.client.name()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Frames per process cycle
    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }

    /// Register the ports and start calling `processor` every cycle
    ///
    /// `cancel` fires when the server shuts the client down.
    pub fn activate(self, processor: Processor, cancel: CancelHandle) -> AudioResult<ActiveEngine> {
        let client_name = self.client.name().to_string();

        let mut inputs = Vec::with_capacity(processor.capture_channels());
        for i in 0..processor.capture_channels() {
            inputs.push(register(&self.client, capture_port_name(i), AudioIn::default())?);
        }
        let mut outputs = Vec::with_capacity(processor.playback_channels());
        for i in 0..processor.playback_channels() {
            outputs.push(register(&self.client, playback_port_name(i), AudioOut::default())?);
        }

        let capture_ports = full_names(&client_name, inputs.len(), capture_port_name);
        let playback_ports = full_names(&client_name, outputs.len(), playback_port_name);

        let handler = JackProcessor {
            processor,
            inputs,
            outputs,
        };
        let client = self
            .client
            .activate_async(JackNotifications { cancel }, handler)
            .map_err(|e| AudioError::Activation(e.to_string()))?;

        log::info!(
            "JACK client activated ({} inputs, {} outputs)",
            capture_ports.len(),
            playback_ports.len()
        );

        Ok(ActiveEngine {
            client,
            capture_ports,
            playback_ports,
        })
    }
}

fn register<S: jack::PortSpec>(client: &Client, name: String, spec: S) -> AudioResult<Port<S>> {
    client
        .register_port(&name, spec)
        .map_err(|e| AudioError::PortRegistration {
            name,
            reason: e.to_string(),
        })
}

fn full_names(client_name: &str, count: usize, short: fn(usize) -> String) -> Vec<String> {
    (0..count)
        .map(|i| format!("{}:{}", client_name, short(i)))
        .collect()
}

/// Running JACK client; drop or [`deactivate`](Self::deactivate) to stop it
pub struct ActiveEngine {
    client: AsyncClient<JackNotifications, JackProcessor>,
    capture_ports: Vec<String>,
    playback_ports: Vec<String>,
}

impl ActiveEngine {
    /// Full names of our input ports, in channel order
    pub fn capture_ports(&self) -> &[String] {
        &self.capture_ports
    }

    /// Full names of our output ports, in channel order
    pub fn playback_ports(&self) -> &[String] {
        &self.playback_ports
    }

    /// Wire input port `i` from `sources[i]` and output port `i` to `targets[i]`
    ///
    /// Ports without a name stay unconnected. Any failed connection fails
    /// the whole call.
    pub fn connect(&self, sources: &[String], targets: &[String]) -> AudioResult<()> {
        let client = self.client.as_client();

        for (source, port) in sources.iter().zip(&self.capture_ports) {
            connect(client, source, port)?;
        }
        for (port, target) in self.playback_ports.iter().zip(targets) {
            connect(client, port, target)?;
        }

        if sources.len() > self.capture_ports.len() {
            log::warn!(
                "Ignoring {} capture port name(s) beyond the {} recorded channels",
                sources.len() - self.capture_ports.len(),
                self.capture_ports.len()
            );
        }
        if targets.len() > self.playback_ports.len() {
            log::warn!(
                "Ignoring {} playback port name(s): the source only has {} channels",
                targets.len() - self.playback_ports.len(),
                self.playback_ports.len()
            );
        }
        Ok(())
    }

    /// Stop the process callback and close the client
    pub fn deactivate(self) -> AudioResult<()> {
        self.client
            .deactivate()
            .map_err(|e| AudioError::Deactivation(e.to_string()))?;
        log::debug!("JACK client deactivated");
        Ok(())
    }
}

fn connect(client: &Client, from: &str, to: &str) -> AudioResult<()> {
    client
        .connect_ports_by_name(from, to)
        .map_err(|e| AudioError::Connection {
            from: from.to_string(),
            to: to.to_string(),
            reason: e.to_string(),
        })?;
    log::info!("Connected {} -> {}", from, to);
    Ok(())
}

/// JACK process handler
///
/// Owns the processor exclusively; the session reaches it only through
/// atomics and the rings.
struct JackProcessor {
    processor: Processor,
    inputs: Vec<Port<AudioIn>>,
    outputs: Vec<Port<AudioOut>>,
}

impl jack::ProcessHandler for JackProcessor {
    fn process(&mut self, _client: &Client, ps: &ProcessScope) -> Control {
        let frames = ps.n_frames() as usize;
        let mut cycle = JackCycle {
            inputs: &self.inputs,
            outputs: &mut self.outputs,
            scope: ps,
        };
        self.processor.process_cycle(&mut cycle, frames);
        Control::Continue
    }
}

/// Port buffers of one process cycle
struct JackCycle<'a> {
    inputs: &'a [Port<AudioIn>],
    outputs: &'a mut [Port<AudioOut>],
    scope: &'a ProcessScope,
}

impl CycleBuffers for JackCycle<'_> {
    #[inline]
    fn input(&self, channel: usize) -> &[Sample] {
        self.inputs[channel].as_slice(self.scope)
    }

    #[inline]
    fn output(&mut self, channel: usize) -> &mut [Sample] {
        self.outputs[channel].as_mut_slice(self.scope)
    }
}

/// JACK notification handler
struct JackNotifications {
    cancel: CancelHandle,
}

impl jack::NotificationHandler for JackNotifications {
    unsafe fn shutdown(&mut self, status: ClientStatus, reason: &str) {
        log::error!("JACK server shut down ({:?}): {}", status, reason);
        self.cancel.cancel();
    }

    fn sample_rate(&mut self, _client: &Client, srate: jack::Frames) -> Control {
        log::info!("JACK sample rate is {}", srate);
        Control::Continue
    }

    fn xrun(&mut self, _client: &Client) -> Control {
        log::warn!("JACK xrun detected");
        Control::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_names_count_from_zero() {
        assert_eq!(capture_port_name(0), "input_0");
        assert_eq!(playback_port_name(3), "output_3");
    }

    #[test]
    fn test_full_names_prefix_client() {
        assert_eq!(
            full_names("playrec", 2, capture_port_name),
            vec!["playrec:input_0".to_string(), "playrec:input_1".to_string()]
        );
        assert!(full_names("playrec", 0, playback_port_name).is_empty());
    }
}
