//! Report Renderer
//! Writes a dashboard pass as text tables or as JSON.
//!
//! Text layout, one section per dashboard panel:
//! 1. Injury locations (lat/lon table)
//! 2. Collisions during the selected hour (density table + map midpoint)
//! 3. Per-minute breakdown (bar per non-empty minute)
//! 4. Top dangerous streets for the affected type
//! 5. Raw data, when toggled on

use polars::prelude::*;
use serde_json::{Map, Number, Value};
use std::io::{self, Write};
use thiserror::Error;

use crate::dashboard::DashboardReport;
use crate::data::columns::{DATE_TIME, LATITUDE, LONGITUDE, ON_STREET_NAME};
use crate::data::{Coordinate, DensityPoint, StreetRanking};
use crate::stats::MinuteHistogram;

/// Widest histogram bar, in characters.
const BAR_WIDTH: u64 = 40;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Failed to write report: {0}")]
    Io(#[from] io::Error),
    #[error("Failed to build table: {0}")]
    Polars(#[from] PolarsError),
    #[error("Failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ReportFormat {
    /// Section headers followed by tables.
    #[default]
    Text,
    /// One pretty-printed JSON document per pass.
    Json,
}

pub struct ReportRenderer;

impl ReportRenderer {
    pub fn render<W: Write>(
        report: &DashboardReport,
        format: ReportFormat,
        out: &mut W,
    ) -> Result<(), RenderError> {
        match format {
            ReportFormat::Text => Self::render_text(report, out),
            ReportFormat::Json => Self::render_json(report, out),
        }
    }

    fn render_text<W: Write>(report: &DashboardReport, out: &mut W) -> Result<(), RenderError> {
        let stats = &report.load_stats;
        writeln!(out, "Motor Vehicle Collisions")?;
        writeln!(
            out,
            "{} rows loaded ({} read, {} without coordinates, {} without a valid date/time)",
            stats.rows_kept,
            stats.rows_read,
            stats.dropped_missing_coordinates,
            stats.unparsed_timestamps
        )?;

        writeln!(out)?;
        writeln!(out, "== Where are the most people injured? ==")?;
        writeln!(
            out,
            "{} collisions with at least {} injured",
            report.injury_locations.len(),
            report.params.injury_threshold
        )?;
        writeln!(out, "{}", locations_frame(&report.injury_locations)?)?;

        writeln!(out)?;
        writeln!(out, "== How many collisions occurred during a given time of day? ==")?;
        writeln!(
            out,
            "Vehicle collisions between {}: {}",
            report.hour_window,
            report.hourly_density.len()
        )?;
        if let Some(midpoint) = report.midpoint {
            writeln!(
                out,
                "Map midpoint: {:.5}, {:.5}",
                midpoint.latitude, midpoint.longitude
            )?;
        }
        writeln!(out, "{}", density_frame(&report.hourly_density)?)?;

        writeln!(out)?;
        writeln!(
            out,
            "== Breakdown of collisions by minute between {} ==",
            report.hour_window
        )?;
        write_histogram(&report.minute_histogram, out)?;

        writeln!(out)?;
        writeln!(out, "== 5 most dangerous streets by affected type ==")?;
        writeln!(out, "Affected type: {}", report.affected)?;
        writeln!(
            out,
            "{}",
            streets_frame(&report.dangerous_streets, report.affected.column())?
        )?;

        if let Some(raw) = &report.raw_data {
            writeln!(out)?;
            writeln!(out, "== Raw Data ==")?;
            writeln!(out, "{raw}")?;
        }
        Ok(())
    }

    fn render_json<W: Write>(report: &DashboardReport, out: &mut W) -> Result<(), RenderError> {
        let mut document = serde_json::to_value(report)?;
        if let (Some(raw), Some(fields)) = (&report.raw_data, document.as_object_mut()) {
            fields.insert("raw_data".to_string(), Value::Array(frame_records(raw)?));
        }
        serde_json::to_writer_pretty(&mut *out, &document)?;
        writeln!(out)?;
        Ok(())
    }
}

fn write_histogram<W: Write>(histogram: &MinuteHistogram, out: &mut W) -> Result<(), RenderError> {
    let Some((peak_minute, peak)) = histogram.peak() else {
        writeln!(out, "(no collisions)")?;
        return Ok(());
    };
    writeln!(out, "Busiest minute: :{peak_minute:02} ({peak} crashes)")?;
    for (minute, &count) in histogram.counts().iter().enumerate() {
        if count == 0 {
            continue;
        }
        let width = (count * BAR_WIDTH).div_ceil(peak);
        writeln!(
            out,
            ":{minute:02} | {} {count}",
            "#".repeat(width as usize)
        )?;
    }
    Ok(())
}

fn locations_frame(locations: &[Coordinate]) -> PolarsResult<DataFrame> {
    DataFrame::new(vec![
        Column::new(
            LATITUDE.into(),
            locations.iter().map(|c| c.latitude).collect::<Vec<_>>(),
        ),
        Column::new(
            LONGITUDE.into(),
            locations.iter().map(|c| c.longitude).collect::<Vec<_>>(),
        ),
    ])
}

fn density_frame(points: &[DensityPoint]) -> PolarsResult<DataFrame> {
    DataFrame::new(vec![
        Column::new(
            DATE_TIME.into(),
            points.iter().map(|p| p.date_time).collect::<Vec<_>>(),
        ),
        Column::new(
            LATITUDE.into(),
            points.iter().map(|p| p.latitude).collect::<Vec<_>>(),
        ),
        Column::new(
            LONGITUDE.into(),
            points.iter().map(|p| p.longitude).collect::<Vec<_>>(),
        ),
    ])
}

fn streets_frame(ranking: &[StreetRanking], count_column: &str) -> PolarsResult<DataFrame> {
    DataFrame::new(vec![
        Column::new(
            ON_STREET_NAME.into(),
            ranking.iter().map(|r| r.street.clone()).collect::<Vec<_>>(),
        ),
        Column::new(
            count_column.into(),
            ranking.iter().map(|r| r.injured).collect::<Vec<_>>(),
        ),
    ])
}

/// Rows of a frame as JSON objects keyed by column name.
fn frame_records(df: &DataFrame) -> PolarsResult<Vec<Value>> {
    (0..df.height())
        .map(|i| {
            let mut record = Map::new();
            for column in df.get_columns() {
                record.insert(column.name().to_string(), any_value_to_json(column.get(i)?));
            }
            Ok(Value::Object(record))
        })
        .collect()
}

fn any_value_to_json(value: AnyValue<'_>) -> Value {
    match value {
        AnyValue::Null => Value::Null,
        AnyValue::Boolean(b) => Value::Bool(b),
        AnyValue::Int32(v) => Value::from(v),
        AnyValue::Int64(v) => Value::from(v),
        AnyValue::UInt32(v) => Value::from(v),
        AnyValue::UInt64(v) => Value::from(v),
        AnyValue::Float64(v) => Number::from_f64(v).map_or(Value::Null, Value::Number),
        AnyValue::String(s) => Value::String(s.to_string()),
        other => Value::String(other.to_string().trim_matches('"').to_string()),
    }
}
