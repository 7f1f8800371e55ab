//! Logging infrastructure.
//!
//! Structured logging via tracing-subscriber. The configured level is
//! the default filter; `RUST_LOG` overrides it when set.

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use crate::domain::models::LoggingSettings;

/// Initialize the global tracing subscriber. Safe to call once.
pub fn init(settings: &LoggingSettings) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.level.clone()));

    if settings.format == "json" {
        tracing_subscriber::fmt().with_env_filter(filter).json().try_init().ok();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).try_init().ok();
    }
    Ok(())
}
