//! Session configuration

use std::time::Duration;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::ring::DEFAULT_RING_SIZE;

/// Default JACK client name
pub const DEFAULT_CLIENT_NAME: &str = "playrec";

/// Default time allowed for a cancelled worker to exit (milliseconds)
pub const DEFAULT_JOIN_TIMEOUT_MS: u64 = 2000;

/// Everything needed to set up one play+record session
///
/// Read from the config file, then overridden field by field from the
/// command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Name the client registers with the audio engine
    pub client_name: String,

    /// Capacity of each ring in samples
    /// Default: 65536
    pub ring_size: usize,

    /// Engine ports to record from; input port `i` connects from entry `i`
    pub capture_ports: Vec<String>,

    /// Engine ports to play to; output port `i` connects to entry `i`
    pub playback_ports: Vec<String>,

    /// Number of channels to record
    /// Default: one per entry of `capture_ports`
    pub capture_channels: Option<usize>,

    /// How long a cancelled worker gets to close its file before it is
    /// abandoned, in milliseconds
    pub join_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            client_name: DEFAULT_CLIENT_NAME.to_string(),
            ring_size: DEFAULT_RING_SIZE,
            capture_ports: Vec::new(),
            playback_ports: Vec::new(),
            capture_channels: None,
            join_timeout_ms: DEFAULT_JOIN_TIMEOUT_MS,
        }
    }
}

impl SessionConfig {
    pub fn with_client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = name.into();
        self
    }

    pub fn with_ring_size(mut self, samples: usize) -> Self {
        self.ring_size = samples;
        self
    }

    pub fn with_capture_ports(mut self, ports: Vec<String>) -> Self {
        self.capture_ports = ports;
        self
    }

    pub fn with_playback_ports(mut self, ports: Vec<String>) -> Self {
        self.playback_ports = ports;
        self
    }

    pub fn with_capture_channels(mut self, channels: usize) -> Self {
        self.capture_channels = Some(channels);
        self
    }

    /// Channels in the destination file
    pub fn capture_channel_count(&self) -> usize {
        self.capture_channels.unwrap_or(self.capture_ports.len())
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    /// Reject settings no session can run with
    pub fn validate(&self) -> Result<()> {
        if self.client_name.is_empty() {
            bail!("client name must not be empty");
        }
        if self.ring_size == 0 {
            bail!("ring size must be at least one sample");
        }
        if self.capture_channel_count() == 0 {
            bail!("nothing to record: give capture ports with -i or a channel count with -c");
        }
        if let Some(channels) = self.capture_channels {
            if channels < self.capture_ports.len() {
                bail!(
                    "{} capture ports given but only {} channels recorded",
                    self.capture_ports.len(),
                    channels
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.client_name, "playrec");
        assert_eq!(config.ring_size, 65536);
        assert_eq!(config.join_timeout(), Duration::from_secs(2));
        assert_eq!(config.capture_channel_count(), 0);
    }

    #[test]
    fn test_capture_channels_follow_ports() {
        let config = SessionConfig::default()
            .with_capture_ports(vec!["system:capture_1".into(), "system:capture_2".into()]);
        assert_eq!(config.capture_channel_count(), 2);
        assert!(config.validate().is_ok());

        let config = config.with_capture_channels(4);
        assert_eq!(config.capture_channel_count(), 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_unusable_settings() {
        assert!(SessionConfig::default().validate().is_err());

        let ports = vec!["a:1".to_string(), "a:2".to_string()];
        let config = SessionConfig::default().with_capture_ports(ports.clone());
        assert!(config.clone().with_ring_size(0).validate().is_err());
        assert!(config.clone().with_client_name("").validate().is_err());
        assert!(config.with_capture_channels(1).validate().is_err());
    }
}
