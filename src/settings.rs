use clap::Parser;
use std::path::PathBuf;

use crate::dashboard::{DashboardParams, DEFAULT_ROW_LIMIT};
use crate::data::{AffectedType, TimestampPolicy};
use crate::report::ReportFormat;

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Motor vehicle collision dashboard over a CSV export
#[derive(Parser, Debug, Clone)]
#[command(
    name = "collision-dash",
    about = "Motor vehicle collision dashboard over a CSV export",
    version
)]
pub struct Settings {
    /// Collisions CSV file
    #[arg(env = "COLLISION_DASH_SOURCE")]
    pub source: PathBuf,

    /// Number of data rows to load
    #[arg(
        long,
        env = "COLLISION_DASH_ROWS",
        default_value_t = DEFAULT_ROW_LIMIT as u64,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub rows: u64,

    /// Minimum number of injured persons on the injury map (0-19)
    #[arg(
        long,
        env = "COLLISION_DASH_INJURED",
        default_value = "0",
        value_parser = clap::value_parser!(u32).range(0..=19)
    )]
    pub injured: u32,

    /// Hour of day for the density map and minute breakdown (0-23)
    #[arg(
        long,
        env = "COLLISION_DASH_HOUR",
        default_value = "0",
        value_parser = clap::value_parser!(u32).range(0..=23)
    )]
    pub hour: u32,

    /// Victim type used to rank dangerous streets
    #[arg(long, env = "COLLISION_DASH_AFFECTED", value_enum, default_value_t = AffectedType::Pedestrians)]
    pub affected: AffectedType,

    /// Include the raw data table
    #[arg(long)]
    pub show_raw: bool,

    /// What to do with rows whose crash date/time cannot be parsed
    #[arg(long, env = "COLLISION_DASH_TIMESTAMP_POLICY", value_enum, default_value_t = TimestampPolicy::Null)]
    pub timestamp_policy: TimestampPolicy,

    /// Output format
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,

    /// Read control commands from stdin and re-render after each one
    #[arg(long)]
    pub interactive: bool,

    /// Logging level (overridden by RUST_LOG)
    #[arg(long, env = "COLLISION_DASH_LOG_LEVEL", default_value = "info", value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: String,
}

impl Settings {
    /// Initial dashboard controls from the command line.
    pub fn dashboard_params(&self) -> anyhow::Result<DashboardParams> {
        Ok(DashboardParams {
            rows: usize::try_from(self.rows)?,
            injury_threshold: self.injured,
            hour: self.hour,
            affected: self.affected,
            show_raw: self.show_raw,
        })
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
