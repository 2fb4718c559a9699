//! Configuration for playrec sessions
//!
//! - [`SessionConfig`]: client name, ring size, port wiring, timeouts
//! - Generic YAML loading/saving
//! - Standard config file location
//!
//! # Usage
//!
//! ```ignore
//! use playrec_core::config::{default_config_path, load_config, SessionConfig};
//!
//! let config: SessionConfig = load_config(&default_config_path());
//! ```

mod io;
mod paths;
mod session;

pub use io::{load_config, save_config};
pub use paths::{default_config_dir, default_config_path};
pub use session::{SessionConfig, DEFAULT_CLIENT_NAME, DEFAULT_JOIN_TIMEOUT_MS};
