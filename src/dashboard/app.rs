//! Collision Dashboard Session
//! Holds one user's control state and evaluates every view per interaction.

use polars::prelude::DataFrame;
use serde::Serialize;
use std::io::{BufRead, Write};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use super::control_panel::{ControlAction, DashboardParams, HELP};
use crate::data::{
    AffectedType, CollisionViews, Coordinate, DatasetCache, DensityPoint, LoadStats, LoaderError,
    StreetRanking, ViewError,
};
use crate::report::{RenderError, ReportFormat, ReportRenderer};
use crate::stats::{Midpoint, MinuteHistogram};

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Unknown command: '{0}' (type 'help')")]
    UnknownCommand(String),
    #[error(transparent)]
    Loader(#[from] LoaderError),
    #[error(transparent)]
    View(#[from] ViewError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DashboardError {
    /// Errors caused by user input, after which the session can go on.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument(_)
                | Self::UnknownCommand(_)
                | Self::Loader(LoaderError::InvalidArgument(_))
                | Self::View(ViewError::InvalidArgument(_))
        )
    }
}

/// Everything one rendering pass produces.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardReport {
    pub params: DashboardParams,
    pub load_stats: LoadStats,
    /// Collisions with at least `params.injury_threshold` injured persons.
    pub injury_locations: Vec<Coordinate>,
    pub hour_window: String,
    pub midpoint: Option<Midpoint>,
    pub hourly_density: Vec<DensityPoint>,
    pub minute_histogram: MinuteHistogram,
    pub affected: AffectedType,
    pub dangerous_streets: Vec<StreetRanking>,
    #[serde(skip)]
    pub raw_data: Option<DataFrame>,
}

/// One dashboard user: private parameters over a possibly shared cache.
pub struct DashboardSession {
    cache: Arc<DatasetCache>,
    params: DashboardParams,
}

impl DashboardSession {
    pub fn new(cache: Arc<DatasetCache>, params: DashboardParams) -> Result<Self, DashboardError> {
        params.validate()?;
        Ok(Self { cache, params })
    }

    pub fn params(&self) -> &DashboardParams {
        &self.params
    }

    pub fn apply(&mut self, action: &ControlAction) -> Result<(), DashboardError> {
        if self.params.apply(action)? {
            info!("Row limit changed to {}", self.params.rows);
        }
        Ok(())
    }

    /// Evaluate every view for the current parameters.
    pub fn render(&self) -> Result<DashboardReport, DashboardError> {
        self.params.validate()?;
        let params = &self.params;

        let original = self.cache.get_or_load(params.rows)?;
        let data = original.dataframe();

        let injury_locations = CollisionViews::injury_locations(data, params.injury_threshold)?;

        let hourly = CollisionViews::filter_by_hour(data, params.hour)?;
        let midpoint = CollisionViews::map_midpoint(&hourly)?;
        let hourly_density = CollisionViews::hourly_density(&hourly)?;
        let minute_histogram = CollisionViews::minute_histogram(&hourly)?;

        let dangerous_streets = CollisionViews::top_dangerous_streets(data, params.affected)?;

        debug!(
            "Rendered {} locations, {} hourly rows, {} streets",
            injury_locations.len(),
            hourly.height(),
            dangerous_streets.len()
        );

        Ok(DashboardReport {
            params: params.clone(),
            load_stats: original.stats(),
            injury_locations,
            hour_window: params.hour_window(),
            midpoint,
            hourly_density,
            minute_histogram,
            affected: params.affected,
            dangerous_streets,
            raw_data: params.show_raw.then(|| data.clone()),
        })
    }

    /// Read control commands line by line, re-rendering after each change.
    ///
    /// Input mistakes are reported and the previous state is kept; load
    /// failures end the loop.
    pub fn run_interactive<R, W>(
        &mut self,
        input: R,
        output: &mut W,
        format: ReportFormat,
    ) -> Result<(), DashboardError>
    where
        R: BufRead,
        W: Write,
    {
        ReportRenderer::render(&self.render()?, format, output)?;

        for line in input.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let action = match line.parse::<ControlAction>() {
                Ok(action) => action,
                Err(err) => {
                    writeln!(output, "error: {err}")?;
                    continue;
                }
            };

            match action {
                ControlAction::Quit => break,
                ControlAction::Help => {
                    writeln!(output, "{HELP}")?;
                    continue;
                }
                _ => {}
            }

            if let Err(err) = self.apply(&action) {
                writeln!(output, "error: {err}")?;
                continue;
            }

            match self.render() {
                Ok(report) => ReportRenderer::render(&report, format, output)?,
                Err(err) if err.is_recoverable() => writeln!(output, "error: {err}")?,
                Err(err) => return Err(err),
            }
        }
        output.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::write_csv;
    use crate::data::CollisionLoader;
    use crate::stats::MINUTE_BINS;

    const ROWS: [&str; 5] = [
        "07/01/2021,8:05,QUEENS,40.70,-73.90,A ST,0,0,0,0",
        "07/01/2021,8:05,QUEENS,40.71,-73.91,B ST,1,1,0,0",
        "07/01/2021,8:40,BRONX,40.72,-73.92,C ST,3,0,3,0",
        "07/01/2021,9:15,BRONX,40.73,-73.93,D ST,5,2,0,3",
        "07/01/2021,9:59,BROOKLYN,,-73.94,E ST,2,2,0,0",
    ];

    fn session(file: &tempfile::NamedTempFile, params: DashboardParams) -> DashboardSession {
        let cache = Arc::new(DatasetCache::new(CollisionLoader::new(file.path())));
        DashboardSession::new(cache, params).unwrap()
    }

    #[test]
    fn test_render_all_views() {
        let file = write_csv(&ROWS);
        let session = session(
            &file,
            DashboardParams {
                injury_threshold: 1,
                hour: 8,
                affected: AffectedType::Cyclists,
                ..Default::default()
            },
        );

        let report = session.render().unwrap();

        assert_eq!(report.load_stats.rows_kept, 4);
        assert_eq!(report.load_stats.dropped_missing_coordinates, 1);
        assert_eq!(report.injury_locations.len(), 3);
        assert_eq!(report.hour_window, "8:00 and 9:00");
        assert_eq!(report.hourly_density.len(), 3);
        assert_eq!(report.minute_histogram.counts().len(), MINUTE_BINS);
        assert_eq!(report.minute_histogram.total(), 3);
        assert_eq!(
            report.dangerous_streets,
            vec![StreetRanking {
                street: "C ST".to_string(),
                injured: 3
            }]
        );
        assert!(report.raw_data.is_none());
    }

    #[test]
    fn test_street_ranking_ignores_hour_filter() {
        let file = write_csv(&ROWS);
        let session = session(
            &file,
            DashboardParams {
                hour: 3,
                affected: AffectedType::Motorists,
                ..Default::default()
            },
        );

        let report = session.render().unwrap();

        assert!(report.hourly_density.is_empty());
        assert!(report.midpoint.is_none());
        assert_eq!(report.dangerous_streets.len(), 1);
        assert_eq!(report.dangerous_streets[0].street, "D ST");
    }

    #[test]
    fn test_raw_toggle_returns_full_table() {
        let file = write_csv(&ROWS);
        let session = session(
            &file,
            DashboardParams {
                show_raw: true,
                ..Default::default()
            },
        );

        let raw = session.render().unwrap().raw_data.unwrap();
        assert_eq!(raw.height(), 4);
    }

    #[test]
    fn test_invalid_params_rejected_at_construction() {
        let file = write_csv(&ROWS);
        let cache = Arc::new(DatasetCache::new(CollisionLoader::new(file.path())));
        let params = DashboardParams {
            hour: 24,
            ..Default::default()
        };

        assert!(matches!(
            DashboardSession::new(cache, params),
            Err(DashboardError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_sessions_share_cache_not_params() {
        let file = write_csv(&ROWS);
        let cache = Arc::new(DatasetCache::new(CollisionLoader::new(file.path())));
        let mut first = DashboardSession::new(Arc::clone(&cache), DashboardParams::default()).unwrap();
        let second = DashboardSession::new(Arc::clone(&cache), DashboardParams::default()).unwrap();

        first.apply(&ControlAction::SetHour(9)).unwrap();
        let a = first.render().unwrap();
        let b = second.render().unwrap();

        assert_eq!(cache.len(), 1);
        assert_eq!(a.hourly_density.len(), 1);
        assert_eq!(b.params.hour, 0);
        assert!(b.hourly_density.is_empty());
    }

    #[test]
    fn test_interactive_session() {
        let file = write_csv(&ROWS);
        let mut session = session(&file, DashboardParams::default());
        let input = "hour 8\nbogus\nhour 99\naffected motorists\nrows 2\nquit\nhour 9\n";
        let mut output = Vec::new();

        session
            .run_interactive(input.as_bytes(), &mut output, ReportFormat::Json)
            .unwrap();

        let text = String::from_utf8(output).unwrap();
        assert!(text.contains("error: Unknown command: 'bogus'"));
        assert!(text.contains("error: Invalid argument: hour must be between 0 and 23"));
        assert_eq!(session.params().hour, 8);
        assert_eq!(session.params().affected, AffectedType::Motorists);
        assert_eq!(session.params().rows, 2);
    }

    #[test]
    fn test_interactive_stops_on_missing_source() {
        let file = write_csv(&ROWS);
        let path = file.path().to_path_buf();
        let mut session = session(&file, DashboardParams::default());
        let mut output = Vec::new();
        session
            .run_interactive("".as_bytes(), &mut output, ReportFormat::Text)
            .unwrap();

        drop(file);
        assert!(!path.exists());
        let err = session
            .run_interactive("show\n".as_bytes(), &mut output, ReportFormat::Text)
            .unwrap_err();
        assert!(matches!(
            err,
            DashboardError::Loader(LoaderError::SourceUnavailable { .. })
        ));
    }
}
