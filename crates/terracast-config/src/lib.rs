//! Configuration for terracast peers: RON-persisted settings with sensible
//! defaults plus command-line overrides for the server entry point.

pub mod cli;
pub mod config;
pub mod error;

pub use cli::ServerArgs;
pub use config::{Config, DebugConfig, NetworkConfig};
pub use error::ConfigError;
