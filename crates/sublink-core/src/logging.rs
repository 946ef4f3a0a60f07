//! Tracing subscriber setup for host applications

use crate::error::Result;
use sublink_config::{LogFormat, LoggingConfig};
use tracing_subscriber::EnvFilter;

/// Install a global stderr subscriber for `config`.
///
/// `RUST_LOG` takes precedence over the configured level. Returns `false`
/// when a global subscriber was already installed.
pub fn init(config: &LoggingConfig) -> Result<bool> {
    config.validate()?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.to_lowercase()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let installed = match config.format {
        LogFormat::Text => builder.try_init().is_ok(),
        LogFormat::Json => builder.json().try_init().is_ok(),
    };
    Ok(installed)
}
