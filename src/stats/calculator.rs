//! Statistics Calculator Module
//! Per-minute crash histogram and map midpoint.

use polars::prelude::*;
use serde::Serialize;

/// Number of one-minute bins covering [0, 60).
pub const MINUTE_BINS: usize = 60;

/// Dense crash counts per minute of the hour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MinuteHistogram {
    counts: Vec<u64>,
}

impl Default for MinuteHistogram {
    fn default() -> Self {
        Self {
            counts: vec![0; MINUTE_BINS],
        }
    }
}

impl MinuteHistogram {
    /// Bucket minute values. Values outside [0, 60) are ignored.
    pub fn from_minutes<I>(minutes: I) -> Self
    where
        I: IntoIterator<Item = i64>,
    {
        let mut histogram = Self::default();
        for minute in minutes {
            let Ok(bin) = usize::try_from(minute) else {
                continue;
            };
            if let Some(slot) = histogram.counts.get_mut(bin) {
                *slot += 1;
            }
        }
        histogram
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Count for one minute, 0 for anything past the last bin.
    pub fn count(&self, minute: usize) -> u64 {
        self.counts.get(minute).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Busiest minute; the earliest wins a tie. `None` when every bin is empty.
    pub fn peak(&self) -> Option<(usize, u64)> {
        self.counts
            .iter()
            .copied()
            .enumerate()
            .filter(|&(_, count)| count > 0)
            .fold(None, |best, (minute, count)| match best {
                Some((_, best_count)) if best_count >= count => best,
                _ => Some((minute, count)),
            })
    }

    /// Chart table with columns `minute` and `number of crashes`.
    pub fn to_frame(&self) -> PolarsResult<DataFrame> {
        let minutes: Vec<u32> = (0..MINUTE_BINS as u32).collect();
        DataFrame::new(vec![
            Column::new("minute".into(), minutes),
            Column::new("number of crashes".into(), self.counts.clone()),
        ])
    }
}

/// Center of the hourly density map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Midpoint {
    pub latitude: f64,
    pub longitude: f64,
}

pub struct StatsCalculator;

impl StatsCalculator {
    /// Arithmetic mean, ignoring NaN. `None` for an empty input.
    pub fn mean(values: &[f64]) -> Option<f64> {
        let (sum, n) = values
            .iter()
            .filter(|v| !v.is_nan())
            .fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
        (n > 0).then(|| sum / n as f64)
    }

    /// Average position of a set of points.
    pub fn midpoint(latitudes: &[f64], longitudes: &[f64]) -> Option<Midpoint> {
        Some(Midpoint {
            latitude: Self::mean(latitudes)?,
            longitude: Self::mean(longitudes)?,
        })
    }
}
