//! Playrec Core - play one audio file through JACK while recording another

pub mod audio;
pub mod audio_file;
pub mod config;
pub mod processor;
pub mod ring;
pub mod session;
pub mod types;
pub mod worker;

pub use types::*;
