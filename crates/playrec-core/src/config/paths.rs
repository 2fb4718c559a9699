//! Standard locations of playrec files

use std::path::PathBuf;

/// Directory holding playrec's configuration
///
/// Returns: `<config dir>/playrec` (e.g. `~/.config/playrec` on Linux)
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("playrec")
}

/// Default config file path: `<config dir>/playrec/config.yaml`
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.yaml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_path_is_inside_config_dir() {
        let path = default_config_path();
        assert!(path.ends_with("playrec/config.yaml"));
        assert!(path.starts_with(default_config_dir()));
    }
}
