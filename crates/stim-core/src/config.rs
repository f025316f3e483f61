//! Persistent configuration for stim.
//!
//! Stores user settings in `~/.stim/config.json`. Every field is optional;
//! command-line flags take precedence over anything set here.
//!
//! # Example
//!
//! ```no_run
//! use stim_core::config::StimConfig;
//!
//! // Load (returns defaults if file doesn't exist)
//! let config = StimConfig::load();
//! println!("source extension: .{}", config.extension());
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::StimError;

const CONFIG_FILENAME: &str = "config.json";

/// Extension required for command source files unless configured otherwise.
pub const DEFAULT_EXTENSION: &str = "stim";

/// Returns `~/.stim`, or `None` when the home directory is unknown.
pub fn stim_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".stim"))
}

/// Persistent stim configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct StimConfig {
    /// Directory that global installs write to, instead of
    /// `~/.claude/commands`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commands_dir: Option<PathBuf>,

    /// Source file extension, without the leading dot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
}

impl StimConfig {
    /// Load config from `~/.stim/config.json`.
    ///
    /// Returns [`Default`] if the file does not exist or cannot be parsed.
    pub fn load() -> Self {
        stim_dir()
            .and_then(|dir| std::fs::read_to_string(dir.join(CONFIG_FILENAME)).ok())
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    /// Save config to `~/.stim/config.json`.
    pub fn save(&self) -> Result<(), StimError> {
        let dir = stim_dir().ok_or(StimError::NoHomeDir)?;
        std::fs::create_dir_all(&dir)?;
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(dir.join(CONFIG_FILENAME), json)?;
        Ok(())
    }

    pub fn extension(&self) -> &str {
        self.extension.as_deref().unwrap_or(DEFAULT_EXTENSION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_empty() {
        let config = StimConfig::default();
        assert!(config.commands_dir.is_none());
        assert_eq!(config.extension(), "stim");
    }

    #[test]
    fn roundtrip_serialization() {
        let config = StimConfig {
            commands_dir: Some(PathBuf::from("/Users/test/commands")),
            extension: Some("flow".into()),
        };
        let json = serde_json::to_string(&config).unwrap();
        let loaded: StimConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.extension(), "flow");
    }

    #[test]
    fn deserialize_empty_json() {
        let loaded: StimConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(loaded, StimConfig::default());
    }

    #[test]
    fn load_does_not_panic() {
        // The real config file may or may not exist on this machine.
        let _ = StimConfig::load();
    }
}
