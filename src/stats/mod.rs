//! Stats module - Histogram and midpoint computations

mod calculator;

pub use calculator::{Midpoint, MinuteHistogram, StatsCalculator, MINUTE_BINS};
