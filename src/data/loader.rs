//! Collision Data Loader Module
//! Reads a bounded prefix of a collisions CSV with Polars and normalizes it.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use polars::prelude::*;
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::columns::{CRASH_DATE, CRASH_TIME, DATE_TIME, LATITUDE, LONGITUDE};

/// Rows scanned for schema inference.
const INFER_SCHEMA_ROWS: usize = 10_000;

const DATE_FORMATS: [&str; 2] = ["%m/%d/%Y", "%Y-%m-%d"];
const TIME_FORMATS: [&str; 3] = ["%H:%M", "%H:%M:%S", "%H:%M:%S%.f"];

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Source unavailable: {path}: {source}")]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Missing required column: {0}")]
    MissingColumn(String),
    #[error("Column name collides after lowercasing: {0}")]
    DuplicateColumn(String),
    #[error("Failed to parse CSV: {0}")]
    Parse(#[from] PolarsError),
}

/// What happens to a row whose crash date or time cannot be parsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum TimestampPolicy {
    /// Keep the row with a null `date/time`.
    #[default]
    Null,
    /// Remove the row from the table.
    Drop,
}

/// Counters collected while cleaning one load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadStats {
    pub rows_read: usize,
    pub dropped_missing_coordinates: usize,
    pub unparsed_timestamps: usize,
    pub rows_kept: usize,
}

/// A cleaned collisions table.
///
/// Every row has a latitude and a longitude, every column name is lowercase
/// and the combined crash timestamp is the first column, named `date/time`.
#[derive(Debug, Clone)]
pub struct CollisionTable {
    df: DataFrame,
    stats: LoadStats,
}

impl CollisionTable {
    /// Clean a raw frame as read from the source.
    pub fn from_raw(raw: DataFrame, policy: TimestampPolicy) -> Result<Self, LoaderError> {
        let rows_read = raw.height();

        let date_name = find_column(&raw, CRASH_DATE)?;
        let time_name = find_column(&raw, CRASH_TIME)?;
        find_column(&raw, LATITUDE)?;
        find_column(&raw, LONGITUDE)?;

        let stamps = combine_date_time(raw.column(&date_name)?, raw.column(&time_name)?)?;

        let mut seen: HashSet<String> = HashSet::from([DATE_TIME.to_string()]);
        let mut columns = Vec::with_capacity(raw.width().saturating_sub(1));
        columns.push(
            Column::new(DATE_TIME.into(), stamps)
                .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?,
        );

        for column in raw.get_columns() {
            let name = column.name().as_str();
            if name == date_name || name == time_name {
                continue;
            }
            let lower = name.to_lowercase();
            if !seen.insert(lower.clone()) {
                return Err(LoaderError::DuplicateColumn(lower));
            }
            columns.push(column.clone().with_name(lower.into()));
        }

        let located = DataFrame::new(columns)?
            .lazy()
            .with_columns([
                col(LATITUDE).cast(DataType::Float64),
                col(LONGITUDE).cast(DataType::Float64),
            ])
            .filter(has_coordinates())
            .collect()?;

        let dropped_missing_coordinates = rows_read - located.height();
        let unparsed_timestamps = located.column(DATE_TIME)?.null_count();
        if unparsed_timestamps > 0 {
            warn!(
                "{} rows have an unparseable crash date/time ({:?} policy)",
                unparsed_timestamps, policy
            );
        }

        let df = match policy {
            TimestampPolicy::Null => located,
            TimestampPolicy::Drop => located
                .lazy()
                .filter(col(DATE_TIME).is_not_null())
                .collect()?,
        };

        let stats = LoadStats {
            rows_read,
            dropped_missing_coordinates,
            unparsed_timestamps,
            rows_kept: df.height(),
        };

        Ok(Self { df, stats })
    }

    /// Get a reference to the cleaned DataFrame.
    pub fn dataframe(&self) -> &DataFrame {
        &self.df
    }

    pub fn stats(&self) -> LoadStats {
        self.stats
    }

    /// Get the number of rows in the table.
    pub fn row_count(&self) -> usize {
        self.df.height()
    }

    /// Get list of column names, in table order.
    pub fn column_names(&self) -> Vec<String> {
        self.df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect()
    }
}

/// Loads collision tables from one CSV source.
#[derive(Debug, Clone)]
pub struct CollisionLoader {
    path: PathBuf,
    policy: TimestampPolicy,
}

impl CollisionLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            policy: TimestampPolicy::default(),
        }
    }

    pub fn with_timestamp_policy(mut self, policy: TimestampPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Get file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reject a row limit before any file access.
    pub fn check_row_limit(rows: usize) -> Result<(), LoaderError> {
        if rows == 0 {
            return Err(LoaderError::InvalidArgument(
                "row limit must be a positive integer".to_string(),
            ));
        }
        Ok(())
    }

    /// Last modification time of the source, `None` when the platform
    /// does not report one.
    pub fn source_modified(&self) -> Result<Option<SystemTime>, LoaderError> {
        let metadata = fs::metadata(&self.path).map_err(|source| self.unavailable(source))?;
        if !metadata.is_file() {
            return Err(self.unavailable(io::Error::new(
                io::ErrorKind::InvalidInput,
                "not a regular file",
            )));
        }
        Ok(metadata.modified().ok())
    }

    /// Read at most `rows` data rows and clean them.
    pub fn load(&self, rows: usize) -> Result<CollisionTable, LoaderError> {
        Self::check_row_limit(rows)?;
        self.source_modified()?;

        info!("Loading up to {} rows from {}", rows, self.path.display());

        let raw = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(INFER_SCHEMA_ROWS))
            .with_ignore_errors(true)
            .with_n_rows(Some(rows))
            .try_into_reader_with_file_path(Some(self.path.clone()))?
            .finish()?;
        debug!("Raw CSV shape: {:?}", raw.shape());

        let table = CollisionTable::from_raw(raw, self.policy)?;
        let stats = table.stats();
        info!(
            "Loaded {} rows ({} read, {} without coordinates)",
            stats.rows_kept, stats.rows_read, stats.dropped_missing_coordinates
        );
        Ok(table)
    }

    fn unavailable(&self, source: io::Error) -> LoaderError {
        LoaderError::SourceUnavailable {
            path: self.path.clone(),
            source,
        }
    }
}

/// Both coordinates present and finite. `NaN` and `inf` count as missing.
pub(crate) fn has_coordinates() -> Expr {
    col(LATITUDE)
        .is_not_null()
        .and(col(LATITUDE).is_finite())
        .and(col(LONGITUDE).is_not_null())
        .and(col(LONGITUDE).is_finite())
}

/// Case-insensitive column lookup returning the name as spelled in the source.
fn find_column(df: &DataFrame, wanted: &str) -> Result<String, LoaderError> {
    df.get_column_names()
        .iter()
        .find(|name| name.as_str().eq_ignore_ascii_case(wanted))
        .map(|name| name.to_string())
        .ok_or_else(|| LoaderError::MissingColumn(wanted.to_string()))
}

fn combine_date_time(
    dates: &Column,
    times: &Column,
) -> Result<Vec<Option<NaiveDateTime>>, LoaderError> {
    let dates = dates.cast(&DataType::String)?;
    let times = times.cast(&DataType::String)?;

    let stamps = dates
        .str()?
        .into_iter()
        .zip(times.str()?.into_iter())
        .map(|(date, time)| parse_crash_timestamp(date?, time?))
        .collect();
    Ok(stamps)
}

/// Combine a crash date and a crash time into one timestamp.
pub fn parse_crash_timestamp(date: &str, time: &str) -> Option<NaiveDateTime> {
    Some(parse_crash_date(date)?.and_time(parse_crash_time(time)?))
}

fn parse_crash_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    // ISO exports carry a zeroed time part after the date
    let date = raw.split_once('T').map_or(raw, |(date, _)| date);
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(date, format).ok())
}

fn parse_crash_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    TIME_FORMATS
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(raw, format).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::{write_csv, HEADER};
    use chrono::Timelike;

    fn stamp(date: &str, time: &str) -> NaiveDateTime {
        parse_crash_timestamp(date, time).expect("valid timestamp")
    }

    #[test]
    fn test_parse_crash_timestamp_formats() {
        let expected = NaiveDate::from_ymd_opt(2021, 7, 12)
            .unwrap()
            .and_hms_opt(2, 39, 0)
            .unwrap();
        assert_eq!(stamp("07/12/2021", "2:39"), expected);
        assert_eq!(stamp("2021-07-12", "02:39:00"), expected);
        assert_eq!(stamp("2021-07-12T00:00:00.000", "2:39"), expected);
        assert_eq!(stamp(" 07/12/2021 ", " 2:39 "), expected);
    }

    #[test]
    fn test_parse_crash_timestamp_rejects_garbage() {
        assert!(parse_crash_timestamp("yesterday", "2:39").is_none());
        assert!(parse_crash_timestamp("07/12/2021", "25:00").is_none());
        assert!(parse_crash_timestamp("", "").is_none());
    }

    #[test]
    fn test_load_drops_rows_without_coordinates() {
        let file = write_csv(&[
            "07/01/2021,8:05,QUEENS,40.7,-73.9,MAIN ST,1,1,0,0",
            "07/01/2021,8:10,QUEENS,,-73.9,MAIN ST,2,0,0,2",
            "07/01/2021,8:15,BRONX,40.8,,BROADWAY,0,0,0,0",
            "07/01/2021,9:00,BRONX,40.9,-73.8,,3,0,3,0",
        ]);

        let table = CollisionLoader::new(file.path()).load(100).unwrap();

        assert_eq!(table.row_count(), 2);
        let df = table.dataframe();
        assert_eq!(df.column(LATITUDE).unwrap().null_count(), 0);
        assert_eq!(df.column(LONGITUDE).unwrap().null_count(), 0);

        let stats = table.stats();
        assert_eq!(stats.rows_read, 4);
        assert_eq!(stats.dropped_missing_coordinates, 2);
        assert_eq!(stats.rows_kept, 2);
    }

    #[test]
    fn test_load_treats_non_finite_coordinates_as_missing() {
        let file = write_csv(&[
            "07/01/2021,8:05,QUEENS,40.7,-73.9,MAIN ST,1,1,0,0",
            "07/01/2021,8:10,QUEENS,NaN,-73.9,MAIN ST,2,0,0,2",
            "07/01/2021,8:15,BRONX,40.8,nan,BROADWAY,0,0,0,0",
            "07/01/2021,8:20,BRONX,inf,-73.8,BROADWAY,0,0,0,0",
        ]);

        let table = CollisionLoader::new(file.path()).load(100).unwrap();

        assert_eq!(table.row_count(), 1);
        assert_eq!(table.stats().dropped_missing_coordinates, 3);
        let latitudes: Vec<Option<f64>> = table
            .dataframe()
            .column(LATITUDE)
            .unwrap()
            .f64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(latitudes, vec![Some(40.7)]);
    }

    #[test]
    fn test_load_normalizes_column_names() {
        let file = write_csv(&["07/01/2021,8:05,QUEENS,40.7,-73.9,MAIN ST,1,1,0,0"]);

        let table = CollisionLoader::new(file.path()).load(10).unwrap();

        assert_eq!(
            table.column_names(),
            vec![
                "date/time",
                "borough",
                "latitude",
                "longitude",
                "on_street_name",
                "injured_persons",
                "injured_pedestrians",
                "injured_cyclists",
                "injured_motorists",
            ]
        );
        assert!(matches!(
            table.dataframe().column(DATE_TIME).unwrap().dtype(),
            DataType::Datetime(_, _)
        ));
    }

    #[test]
    fn test_load_respects_row_limit_and_order() {
        let file = write_csv(&[
            "07/01/2021,1:00,QUEENS,40.1,-73.9,A ST,0,0,0,0",
            "07/01/2021,2:00,QUEENS,40.2,-73.9,B ST,0,0,0,0",
            "07/01/2021,3:00,QUEENS,40.3,-73.9,C ST,0,0,0,0",
        ]);

        let table = CollisionLoader::new(file.path()).load(2).unwrap();

        assert_eq!(table.row_count(), 2);
        let streets: Vec<Option<&str>> = table
            .dataframe()
            .column("on_street_name")
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(streets, vec![Some("A ST"), Some("B ST")]);
    }

    #[test]
    fn test_load_is_deterministic() {
        let file = write_csv(&[
            "07/01/2021,1:00,QUEENS,40.1,-73.9,A ST,1,0,0,1",
            "bad date,2:00,QUEENS,40.2,-73.9,B ST,0,0,0,0",
            "07/01/2021,3:00,QUEENS,,-73.9,C ST,0,0,0,0",
        ]);
        let loader = CollisionLoader::new(file.path());

        let first = loader.load(100).unwrap();
        let second = loader.load(100).unwrap();

        assert!(first.dataframe().equals_missing(second.dataframe()));
        assert_eq!(first.stats(), second.stats());
    }

    #[test]
    fn test_unparseable_timestamp_kept_as_null_by_default() {
        let file = write_csv(&[
            "07/01/2021,8:05,QUEENS,40.7,-73.9,MAIN ST,1,1,0,0",
            "not a date,8:10,QUEENS,40.7,-73.9,MAIN ST,2,0,0,2",
        ]);

        let table = CollisionLoader::new(file.path()).load(10).unwrap();

        assert_eq!(table.row_count(), 2);
        assert_eq!(table.stats().unparsed_timestamps, 1);
        assert_eq!(table.dataframe().column(DATE_TIME).unwrap().null_count(), 1);
    }

    #[test]
    fn test_unparseable_timestamp_dropped_with_drop_policy() {
        let file = write_csv(&[
            "07/01/2021,8:05,QUEENS,40.7,-73.9,MAIN ST,1,1,0,0",
            "07/01/2021,noon,QUEENS,40.7,-73.9,MAIN ST,2,0,0,2",
        ]);

        let table = CollisionLoader::new(file.path())
            .with_timestamp_policy(TimestampPolicy::Drop)
            .load(10)
            .unwrap();

        assert_eq!(table.row_count(), 1);
        assert_eq!(table.stats().unparsed_timestamps, 1);
        let hours: Vec<Option<i8>> = table
            .dataframe()
            .clone()
            .lazy()
            .select([col(DATE_TIME).dt().hour().alias("hour")])
            .collect()
            .unwrap()
            .column("hour")
            .unwrap()
            .cast(&DataType::Int8)
            .unwrap()
            .i8()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(hours, vec![Some(8)]);
    }

    #[test]
    fn test_column_lookup_is_case_insensitive() {
        let raw = df!(
            "crash_date" => ["07/01/2021"],
            "Crash_Time" => ["23:59"],
            "Latitude" => [40.7],
            "LONGITUDE" => [-73.9],
        )
        .unwrap();

        let table = CollisionTable::from_raw(raw, TimestampPolicy::Null).unwrap();

        assert_eq!(table.column_names(), vec!["date/time", "latitude", "longitude"]);
        let ms = table
            .dataframe()
            .column(DATE_TIME)
            .unwrap()
            .cast(&DataType::Int64)
            .unwrap()
            .i64()
            .unwrap()
            .get(0)
            .unwrap();
        let parsed = chrono::DateTime::from_timestamp_millis(ms).unwrap().naive_utc();
        assert_eq!((parsed.hour(), parsed.minute()), (23, 59));
    }

    #[test]
    fn test_missing_required_column() {
        let raw = df!(
            "CRASH_DATE" => ["07/01/2021"],
            "LATITUDE" => [40.7],
            "LONGITUDE" => [-73.9],
        )
        .unwrap();

        let err = CollisionTable::from_raw(raw, TimestampPolicy::Null).unwrap_err();
        assert!(matches!(err, LoaderError::MissingColumn(ref c) if c == CRASH_TIME));
    }

    #[test]
    fn test_duplicate_column_after_lowercasing() {
        let raw = df!(
            "CRASH_DATE" => ["07/01/2021"],
            "CRASH_TIME" => ["1:00"],
            "LATITUDE" => [40.7],
            "LONGITUDE" => [-73.9],
            "BOROUGH" => ["QUEENS"],
            "borough" => ["queens"],
        )
        .unwrap();

        let err = CollisionTable::from_raw(raw, TimestampPolicy::Null).unwrap_err();
        assert!(matches!(err, LoaderError::DuplicateColumn(ref c) if c == "borough"));
    }

    #[test]
    fn test_zero_row_limit_rejected_before_file_access() {
        let err = CollisionLoader::new("/definitely/not/here.csv")
            .load(0)
            .unwrap_err();
        assert!(matches!(err, LoaderError::InvalidArgument(_)));
    }

    #[test]
    fn test_missing_source_is_unavailable() {
        let err = CollisionLoader::new("/definitely/not/here.csv")
            .load(10)
            .unwrap_err();
        assert!(matches!(err, LoaderError::SourceUnavailable { .. }));
        assert!(err.to_string().contains("/definitely/not/here.csv"));
    }

    #[test]
    fn test_header_only_source_loads_empty_table() {
        let file = write_csv(&[]);
        let table = CollisionLoader::new(file.path()).load(10).unwrap();
        assert_eq!(table.row_count(), 0);
        assert_eq!(table.column_names().len(), HEADER.split(',').count() - 1);
    }
}
