//! Command-line overrides for the dedicated server.

use std::path::PathBuf;

use clap::Parser;

use crate::config::Config;

/// Dedicated terracast server.
#[derive(Debug, Parser)]
#[command(name = "terracast-server", version, about)]
pub struct ServerArgs {
    /// Path to a RON config file (defaults to the platform config dir).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Gameplay datagram port.
    #[arg(long)]
    pub port: Option<u16>,

    /// Server display name.
    #[arg(long)]
    pub name: Option<String>,

    /// Maximum number of players.
    #[arg(long)]
    pub max_players: Option<u32>,

    /// HTTP port for the registry listing endpoint (`0` disables it).
    #[arg(long)]
    pub registry_port: Option<u16>,

    /// Log filter, e.g. `info` or `terracast_server=debug`.
    #[arg(long)]
    pub log_level: Option<String>,
}

impl ServerArgs {
    /// Applies the flags that were given on top of a loaded config.
    pub fn apply(&self, config: &mut Config) {
        if let Some(port) = self.port {
            config.network.server_port = port;
        }
        if let Some(name) = &self.name {
            config.network.server_name = name.clone();
        }
        if let Some(max_players) = self.max_players {
            config.network.max_players = max_players;
        }
        if let Some(registry_port) = self.registry_port {
            config.network.registry_port = registry_port;
        }
        if let Some(log_level) = &self.log_level {
            config.debug.log_level = log_level.clone();
        }
    }
}
