//! Persistent configuration for adbpilot.
//!
//! Stores user settings in `~/.adbpilot/config.json`: timing and dump-path
//! overrides applied when device sessions are created.
//!
//! # Example
//!
//! ```no_run
//! use adbpilot_core::config::PilotConfig;
//!
//! // Load (returns defaults if file doesn't exist)
//! let config = PilotConfig::load();
//!
//! if let Some(ms) = config.default_sleep_ms {
//!     println!("poll tick override: {ms} ms");
//! }
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

const CONFIG_FILENAME: &str = "config.json";

/// Returns the adbpilot data directory (`~/.adbpilot`), creating it if
/// needed.
pub fn adbpilot_dir() -> PathBuf {
    let dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".adbpilot");
    std::fs::create_dir_all(&dir).ok();
    dir
}

/// Persistent adbpilot configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PilotConfig {
    /// Override for the default poll tick between wait attempts, in
    /// milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_sleep_ms: Option<u64>,

    /// Override for the on-device hierarchy dump path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dump_path: Option<String>,
}

impl PilotConfig {
    /// Load config from `~/.adbpilot/config.json`.
    ///
    /// Returns [`Default`] if the file does not exist or cannot be parsed.
    pub fn load() -> Self {
        let path = adbpilot_dir().join(CONFIG_FILENAME);
        std::fs::read_to_string(&path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    /// Save config to `~/.adbpilot/config.json`.
    pub fn save(&self) -> std::io::Result<()> {
        let path = adbpilot_dir().join(CONFIG_FILENAME);
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_no_overrides() {
        let config = PilotConfig::default();
        assert!(config.default_sleep_ms.is_none());
        assert!(config.dump_path.is_none());
    }

    #[test]
    fn roundtrip_serialization() {
        let config = PilotConfig {
            default_sleep_ms: Some(750),
            dump_path: Some("/data/local/tmp/dump.xml".to_string()),
        };
        let json = serde_json::to_string(&config).unwrap();
        let loaded: PilotConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded.default_sleep_ms, config.default_sleep_ms);
        assert_eq!(loaded.dump_path, config.dump_path);
    }

    #[test]
    fn deserialize_empty_json() {
        let loaded: PilotConfig = serde_json::from_str("{}").unwrap();
        assert!(loaded.default_sleep_ms.is_none());
        assert!(loaded.dump_path.is_none());
    }

    #[test]
    fn load_returns_default_for_missing_file() {
        // PilotConfig::load() should not panic even if the file is absent.
        let _ = PilotConfig::load();
    }
}
