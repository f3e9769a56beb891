//! Structured logging setup for terracast peers.
//!
//! Console output via the `tracing` ecosystem with environment-based
//! filtering (`RUST_LOG` wins), plus an optional plain-text file layer for
//! post-mortem analysis of dedicated servers.

use std::path::Path;

use terracast_config::Config;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter when neither `RUST_LOG` nor the config specify one.
const DEFAULT_FILTER: &str = "info";

/// Initializes the global tracing subscriber.
///
/// Filter precedence: `RUST_LOG` env var, then `config.debug.log_level`,
/// then `"info"`. When `log_dir` is given, a non-ANSI file layer writes to
/// `terracast.log` inside it.
///
/// Call once per process; later calls are ignored.
pub fn init_logging(log_dir: Option<&Path>, config: Option<&Config>) {
    let filter_str = config
        .map(|c| c.debug.log_level.as_str())
        .filter(|level| !level.is_empty())
        .unwrap_or(DEFAULT_FILTER);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_str));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_timer(fmt::time::uptime());

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    let file_layer = log_dir.and_then(|dir| {
        std::fs::create_dir_all(dir).ok()?;
        let file = std::fs::File::create(dir.join("terracast.log")).ok()?;
        Some(fmt::layer().with_writer(file).with_ansi(false))
    });

    let result = match file_layer {
        Some(layer) => registry.with(layer).try_init(),
        None => registry.try_init(),
    };
    if result.is_err() {
        tracing::debug!("logging already initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init_logging(None, None);
        init_logging(None, Some(&Config::default()));
        tracing::info!("logging works");
    }
}
