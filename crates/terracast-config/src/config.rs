//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Network / multiplayer settings.
    pub network: NetworkConfig,
    /// Debug / development settings.
    pub debug: DebugConfig,
}

/// Network and multiplayer configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkConfig {
    /// Server address for the client to connect to.
    pub server_address: String,
    /// Gameplay datagram port.
    pub server_port: u16,
    /// Server display name shown in listings.
    pub server_name: String,
    /// Maximum number of players (server only).
    pub max_players: u32,
    /// Simulation tick rate in Hz.
    pub tick_rate: u32,
    /// Ticks between client command flushes.
    pub command_interval_ticks: u32,
    /// Ticks between server snapshot dispatches.
    pub snapshot_interval_ticks: u32,
    /// Seconds between pings to each client.
    pub ping_interval_seconds: u32,
    /// Seconds of silence before a client is disconnected.
    pub timeout_seconds: u32,
    /// HTTP port for the registry listing endpoint (`0` disables it).
    pub registry_port: u16,
    /// World-transfer packets sent per client per tick.
    pub transfer_packets_per_tick: u32,
    /// Capacity of the unconfirmed-edit ring.
    pub edit_ring_capacity: u32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            server_address: "127.0.0.1".to_owned(),
            server_port: 5687,
            server_name: "terracast server".to_owned(),
            max_players: 16,
            tick_rate: 60,
            command_interval_ticks: 3,
            snapshot_interval_ticks: 6,
            ping_interval_seconds: 2,
            timeout_seconds: 10,
            registry_port: 5688,
            transfer_packets_per_tick: 2,
            edit_ring_capacity: 64,
        }
    }
}

/// Debug / development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log filter, e.g. `"info"` or `"terracast_server=debug"`. Empty means
    /// use the built-in default.
    pub log_level: String,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: String::new(),
        }
    }
}

impl Config {
    /// Loads configuration from a RON file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        ron::from_str(&content).map_err(ConfigError::ParseError)
    }

    /// Loads configuration, falling back to defaults if the file is absent.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] only for an unreadable or malformed file, not
    /// for a missing one.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Saves configuration as pretty-printed RON.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if serialization or the write fails.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let pretty = ron::ser::PrettyConfig::default();
        let content =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigError::WriteError)?;
        }
        std::fs::write(path, content).map_err(ConfigError::WriteError)
    }

    /// Default location of the config file.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("terracast")
            .join("config.ron")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.ron");

        let mut config = Config::default();
        config.network.server_port = 7001;
        config.network.max_players = 4;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(&dir.path().join("nope.ron")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.ron");
        std::fs::write(&path, "(network: (server_port: 9999))").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.network.server_port, 9999);
        assert_eq!(config.network.tick_rate, 60);
    }

    #[test]
    fn test_malformed_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.ron");
        std::fs::write(&path, "this is not ron {").unwrap();
        assert!(matches!(
            Config::load(&path),
            Err(ConfigError::ParseError(_))
        ));
    }
}
