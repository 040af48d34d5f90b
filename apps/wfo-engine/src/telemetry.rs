//! Tracing Setup
//!
//! Installs a `tracing_subscriber` formatter on stderr so stdout stays free
//! for machine-readable output.
//!
//! # Configuration
//!
//! - `RUST_LOG`: filter directive; overrides `observability.logging.level`
//! - `observability.logging.format`: `json` or `pretty`
//!
//! # Usage
//!
//! ```rust,ignore
//! use wfo_engine::{config::LoggingConfig, telemetry::init_tracing};
//!
//! init_tracing(&LoggingConfig::default())?;
//! ```

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;

/// Initialize the global tracing subscriber.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), TryInitError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let span_events = if config.include_spans {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    if config.is_json() {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(config.include_spans)
            .with_span_list(false)
            .with_span_events(span_events)
            .with_writer(std::io::stderr);
        Registry::default().with(env_filter).with(fmt_layer).try_init()?;
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .pretty()
            .with_span_events(span_events)
            .with_writer(std::io::stderr);
        Registry::default().with(env_filter).with(fmt_layer).try_init()?;
    }

    tracing::debug!(
        level = %config.level,
        format = %config.format,
        "Tracing initialized"
    );
    Ok(())
}
