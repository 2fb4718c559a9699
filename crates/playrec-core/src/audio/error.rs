//! Audio engine error types

use thiserror::Error;

/// Errors that can occur while setting up the audio engine
#[derive(Error, Debug)]
pub enum AudioError {
    /// Could not open a client on the audio server
    #[error("Failed to open JACK client: {0}")]
    ClientOpen(String),

    /// Port registration failed
    #[error("Cannot register port \"{name}\": {reason}")]
    PortRegistration { name: String, reason: String },

    /// Port connection failed
    #[error("Cannot connect port \"{from}\" to \"{to}\": {reason}")]
    Connection {
        from: String,
        to: String,
        reason: String,
    },

    /// Client activation failed
    #[error("Failed to activate JACK client: {0}")]
    Activation(String),

    /// Client deactivation failed
    #[error("Failed to deactivate JACK client: {0}")]
    Deactivation(String),
}

/// Result type for audio operations
pub type AudioResult<T> = Result<T, AudioError>;
