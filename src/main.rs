//! Collision Dash command line entry point.

use anyhow::{Context, Result};
use clap::Parser;
use std::io;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use collision_dash::dashboard::DashboardSession;
use collision_dash::data::{CollisionLoader, DatasetCache};
use collision_dash::report::ReportRenderer;
use collision_dash::settings::Settings;

fn main() -> Result<()> {
    let settings = Settings::parse();
    setup_logging(&settings.log_level);

    tracing::info!("Collision Dash v{} starting", env!("CARGO_PKG_VERSION"));

    let loader = CollisionLoader::new(&settings.source)
        .with_timestamp_policy(settings.timestamp_policy);
    let cache = Arc::new(DatasetCache::new(loader));
    let mut session = DashboardSession::new(cache, settings.dashboard_params()?)?;

    let mut stdout = io::stdout().lock();
    if settings.interactive {
        session
            .run_interactive(io::stdin().lock(), &mut stdout, settings.format)
            .with_context(|| format!("dashboard over {}", settings.source.display()))?;
    } else {
        let report = session
            .render()
            .with_context(|| format!("failed to build dashboard for {}", settings.source.display()))?;
        ReportRenderer::render(&report, settings.format, &mut stdout)?;
    }

    Ok(())
}

/// Initialise the global `tracing` subscriber on stderr.
///
/// `RUST_LOG` wins over `log_level` when set.
fn setup_logging(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .init();
}
