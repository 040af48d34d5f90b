//! Walk-Forward Engine Binary
//!
//! Loads a run configuration and prints the deterministic plan preview
//! (coverage trials and fixed-mode window layout) as JSON on stdout.
//! Strategy simulation is supplied by library callers, so no windows are
//! optimized here.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin wfo-engine -- runs/btc.yaml
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Log filter (default: `observability.logging.level`)
//! - Any `${VAR}` referenced by the configuration file

use anyhow::Context;
use wfo_engine::config::{DEFAULT_CONFIG_PATH, PlanPreview, load_config};
use wfo_engine::telemetry::init_tracing;

fn main() -> anyhow::Result<()> {
    let path = std::env::args().nth(1);
    let config = load_config(path.as_deref()).with_context(|| {
        format!(
            "loading {}",
            path.as_deref().unwrap_or(DEFAULT_CONFIG_PATH)
        )
    })?;

    init_tracing(&config.observability.logging).context("initializing tracing")?;

    tracing::info!(
        mode = ?config.walk_forward.mode,
        is_days = config.walk_forward.is_period_days,
        oos_days = config.walk_forward.oos_period_days,
        parameters = config.parameters.specs().len(),
        objectives = config.search.objectives.len(),
        "Building plan preview"
    );

    let preview = PlanPreview::build(&config).context("building plan preview")?;

    tracing::info!(
        bars = preview.bars,
        windows = preview.windows.as_ref().map(Vec::len),
        initial_trials = preview.initial_trials.len(),
        combinations = preview.coverage.combinations,
        "Plan preview ready"
    );

    println!("{}", serde_json::to_string_pretty(&preview)?);
    Ok(())
}
