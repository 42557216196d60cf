//! Logging setup. Record linkage decisions are audited through structured
//! `tracing` events rather than a metrics/export pipeline — what backend
//! collects those events (stdout, a log shipper, an OTLP collector) is a
//! deployment concern, not this crate's.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;
use crate::error::Result;

/// Install a global `tracing` subscriber that emits JSON events, honoring
/// `RUST_LOG` when set and otherwise falling back to `config.log_level`.
pub fn init_logging(config: &ObservabilityConfig) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().json())
        .try_init()
        .map_err(|err| crate::error::Error::internal(err.to_string()))?;

    Ok(())
}
