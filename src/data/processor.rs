//! Collision Views Module
//! Filtered and aggregated views over a cleaned collisions table.
//!
//! Every view is a pure function of the table it is given and its own
//! parameters. Street rankings are expected to receive the full table, the
//! density and histogram views the hour-filtered copy.

use polars::prelude::*;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

use super::columns::{
    DATE_TIME, INJURED_CYCLISTS, INJURED_MOTORISTS, INJURED_PEDESTRIANS, INJURED_PERSONS,
    LATITUDE, LONGITUDE, ON_STREET_NAME,
};
use super::loader::has_coordinates;
use crate::stats::{Midpoint, MinuteHistogram, StatsCalculator};

/// Largest accepted injured-persons threshold.
pub const MAX_INJURY_THRESHOLD: u32 = 19;
/// Largest accepted hour of day.
pub const MAX_HOUR: u32 = 23;
/// Streets returned by the ranking.
pub const TOP_STREETS: usize = 5;

#[derive(Error, Debug)]
pub enum ViewError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Table has no column {0}")]
    MissingColumn(String),
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
}

/// Category of collision victim used to rank streets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AffectedType {
    #[default]
    Pedestrians,
    Cyclists,
    Motorists,
}

impl AffectedType {
    pub const ALL: [AffectedType; 3] = [Self::Pedestrians, Self::Cyclists, Self::Motorists];

    /// Injury-count column ranked for this category.
    pub fn column(self) -> &'static str {
        match self {
            Self::Pedestrians => INJURED_PEDESTRIANS,
            Self::Cyclists => INJURED_CYCLISTS,
            Self::Motorists => INJURED_MOTORISTS,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Pedestrians => "Pedestrians",
            Self::Cyclists => "Cyclists",
            Self::Motorists => "Motorists",
        }
    }
}

impl fmt::Display for AffectedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AffectedType {
    type Err = ViewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                ViewError::InvalidArgument(format!(
                    "unknown affected type '{s}' (expected pedestrians, cyclists or motorists)"
                ))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

/// One row of the hourly density table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DensityPoint {
    #[serde(rename = "date/time")]
    pub date_time: chrono::NaiveDateTime,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreetRanking {
    pub street: String,
    pub injured: u64,
}

/// Builds the dashboard views from a collisions table.
pub struct CollisionViews;

impl CollisionViews {
    /// Locations of collisions with at least `threshold` injured persons.
    ///
    /// A missing injured count counts as zero, so threshold 0 returns every row.
    pub fn injury_locations(
        table: &DataFrame,
        threshold: u32,
    ) -> Result<Vec<Coordinate>, ViewError> {
        check_range("injury threshold", threshold, MAX_INJURY_THRESHOLD)?;
        require_columns(table, &[INJURED_PERSONS, LATITUDE, LONGITUDE])?;

        let located = table
            .clone()
            .lazy()
            .filter(
                col(INJURED_PERSONS)
                    .cast(DataType::Int64)
                    .fill_null(lit(0i64))
                    .gt_eq(lit(i64::from(threshold))),
            )
            .select([
                col(LATITUDE).cast(DataType::Float64),
                col(LONGITUDE).cast(DataType::Float64),
            ])
            .filter(has_coordinates())
            .collect()?;

        let coordinates = located
            .column(LATITUDE)?
            .f64()?
            .into_iter()
            .zip(located.column(LONGITUDE)?.f64()?.into_iter())
            .filter_map(|(latitude, longitude)| {
                Some(Coordinate {
                    latitude: latitude?,
                    longitude: longitude?,
                })
            })
            .collect::<Vec<_>>();
        debug!(
            "{} locations with >= {} injured",
            coordinates.len(),
            threshold
        );
        Ok(coordinates)
    }

    /// Rows whose crash hour equals `hour`. Rows without a timestamp never match.
    pub fn filter_by_hour(table: &DataFrame, hour: u32) -> Result<DataFrame, ViewError> {
        check_range("hour", hour, MAX_HOUR)?;
        require_columns(table, &[DATE_TIME])?;

        let filtered = table
            .clone()
            .lazy()
            .filter(
                col(DATE_TIME)
                    .dt()
                    .hour()
                    .cast(DataType::Int64)
                    .eq(lit(i64::from(hour))),
            )
            .collect()?;
        debug!("{} collisions during hour {}", filtered.height(), hour);
        Ok(filtered)
    }

    /// (`date/time`, `latitude`, `longitude`) rows for density rendering.
    pub fn hourly_density(hour_table: &DataFrame) -> Result<Vec<DensityPoint>, ViewError> {
        require_columns(hour_table, &[DATE_TIME, LATITUDE, LONGITUDE])?;

        let projected = hour_table
            .clone()
            .lazy()
            .select([
                col(DATE_TIME)
                    .cast(DataType::Datetime(TimeUnit::Milliseconds, None))
                    .cast(DataType::Int64),
                col(LATITUDE).cast(DataType::Float64),
                col(LONGITUDE).cast(DataType::Float64),
            ])
            .collect()?;

        let millis = projected.column(DATE_TIME)?.i64()?;
        let latitudes = projected.column(LATITUDE)?.f64()?;
        let longitudes = projected.column(LONGITUDE)?.f64()?;

        let points = millis
            .into_iter()
            .zip(latitudes.into_iter())
            .zip(longitudes.into_iter())
            .filter_map(|((ms, latitude), longitude)| {
                Some(DensityPoint {
                    date_time: chrono::DateTime::from_timestamp_millis(ms?)?.naive_utc(),
                    latitude: latitude?,
                    longitude: longitude?,
                })
            })
            .collect();
        Ok(points)
    }

    /// Mean position of a table, `None` when it has no rows.
    pub fn map_midpoint(table: &DataFrame) -> Result<Option<Midpoint>, ViewError> {
        require_columns(table, &[LATITUDE, LONGITUDE])?;

        let latitudes = float_values(table, LATITUDE)?;
        let longitudes = float_values(table, LONGITUDE)?;
        Ok(StatsCalculator::midpoint(&latitudes, &longitudes))
    }

    /// Crash counts per minute of the hour-filtered table.
    pub fn minute_histogram(hour_table: &DataFrame) -> Result<MinuteHistogram, ViewError> {
        require_columns(hour_table, &[DATE_TIME])?;

        let minutes = hour_table
            .clone()
            .lazy()
            .select([col(DATE_TIME)
                .dt()
                .minute()
                .cast(DataType::Int64)
                .alias("minute")])
            .collect()?;

        let histogram =
            MinuteHistogram::from_minutes(minutes.column("minute")?.i64()?.into_iter().flatten());
        Ok(histogram)
    }

    /// The five streets with the most injured victims of `affected` type.
    ///
    /// Equal counts keep their order in the table.
    pub fn top_dangerous_streets(
        original: &DataFrame,
        affected: AffectedType,
    ) -> Result<Vec<StreetRanking>, ViewError> {
        let count_col = affected.column();
        require_columns(original, &[ON_STREET_NAME, count_col])?;

        let injured = original
            .clone()
            .lazy()
            .select([
                col(ON_STREET_NAME).cast(DataType::String),
                col(count_col).cast(DataType::Int64),
            ])
            .filter(
                col(count_col)
                    .gt_eq(lit(1i64))
                    .and(col(ON_STREET_NAME).is_not_null()),
            )
            .collect()?;

        let streets = injured.column(ON_STREET_NAME)?.str()?;
        let counts = injured.column(count_col)?.i64()?;

        let mut ranking: Vec<StreetRanking> = streets
            .into_iter()
            .zip(counts.into_iter())
            .filter_map(|(street, count)| {
                Some(StreetRanking {
                    street: street?.to_string(),
                    injured: u64::try_from(count?).ok()?,
                })
            })
            .collect();

        // sort_by is stable: ties keep input order
        ranking.sort_by(|a, b| b.injured.cmp(&a.injured));
        ranking.truncate(TOP_STREETS);
        Ok(ranking)
    }
}

fn check_range(what: &str, value: u32, max: u32) -> Result<(), ViewError> {
    if value > max {
        return Err(ViewError::InvalidArgument(format!(
            "{what} must be between 0 and {max}, got {value}"
        )));
    }
    Ok(())
}

fn require_columns(table: &DataFrame, names: &[&str]) -> Result<(), ViewError> {
    for name in names {
        if table.column(name).is_err() {
            return Err(ViewError::MissingColumn((*name).to_string()));
        }
    }
    Ok(())
}

fn float_values(table: &DataFrame, name: &str) -> Result<Vec<f64>, ViewError> {
    let values = table.column(name)?.cast(&DataType::Float64)?;
    Ok(values.f64()?.into_iter().flatten().collect())
}
