//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber from [`LoggingConfig`]
//! - Select text or JSON output
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, text format for development
//! - Log level configurable via config and environment

use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt, layer::SubscriberExt};

use crate::config::{LogFormat, LoggingConfig};

fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(config.level_filter()).into())
        .from_env_lossy()
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<(), TryInitError> {
    let registry = tracing_subscriber::registry().with(env_filter(config));

    match config.format() {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(false))
            .try_init(),
        LogFormat::Text => registry.with(fmt::layer()).try_init(),
    }
}
