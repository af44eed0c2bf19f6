//! Logging setup for the aerodata binary
//!
//! Library code only emits `tracing` events; installing a subscriber is left
//! to the application.

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use crate::orm::config::LoggingConfig;

/// Log output format options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line, human-readable
    #[default]
    Pretty,
    /// One line per event
    Compact,
}

/// Pick the filter: an explicit directive wins, then `RUST_LOG`, then `info`
fn env_filter(level: Option<&str>) -> anyhow::Result<EnvFilter> {
    match level {
        Some(directive) if !directive.trim().is_empty() => Ok(EnvFilter::try_new(directive)?),
        _ => Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))),
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter(config.level.as_deref())?)
        .with_target(true);

    match config.format {
        LogFormat::Pretty => subscriber
            .pretty()
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize pretty logger: {}", e))?,
        LogFormat::Compact => subscriber
            .compact()
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize compact logger: {}", e))?,
    }

    tracing::debug!(format = ?config.format, level = ?config.level, "Logging initialized");
    Ok(())
}
