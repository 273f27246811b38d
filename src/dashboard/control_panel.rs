//! Control Panel Module
//! Widget state as explicit parameters, and the actions that change it.

use serde::Serialize;
use std::str::FromStr;

use super::app::DashboardError;
use crate::data::{AffectedType, CollisionLoader, MAX_HOUR, MAX_INJURY_THRESHOLD};

/// Rows loaded when no limit is given.
pub const DEFAULT_ROW_LIMIT: usize = 100_000;

/// Every input the dashboard views depend on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardParams {
    pub rows: usize,
    pub injury_threshold: u32,
    pub hour: u32,
    pub affected: AffectedType,
    pub show_raw: bool,
}

impl Default for DashboardParams {
    fn default() -> Self {
        Self {
            rows: DEFAULT_ROW_LIMIT,
            injury_threshold: 0,
            hour: 0,
            affected: AffectedType::default(),
            show_raw: false,
        }
    }
}

impl DashboardParams {
    /// Reject out-of-range values before any table is scanned.
    pub fn validate(&self) -> Result<(), DashboardError> {
        CollisionLoader::check_row_limit(self.rows)?;
        if self.injury_threshold > MAX_INJURY_THRESHOLD {
            return Err(DashboardError::InvalidArgument(format!(
                "injury threshold must be between 0 and {MAX_INJURY_THRESHOLD}, got {}",
                self.injury_threshold
            )));
        }
        if self.hour > MAX_HOUR {
            return Err(DashboardError::InvalidArgument(format!(
                "hour must be between 0 and {MAX_HOUR}, got {}",
                self.hour
            )));
        }
        Ok(())
    }

    /// Apply a widget change. On error the parameters are left untouched.
    ///
    /// Returns `true` when the change requires a new table load.
    pub fn apply(&mut self, action: &ControlAction) -> Result<bool, DashboardError> {
        let mut next = self.clone();
        match *action {
            ControlAction::SetRows(rows) => next.rows = rows,
            ControlAction::SetInjuryThreshold(threshold) => next.injury_threshold = threshold,
            ControlAction::SetHour(hour) => next.hour = hour,
            ControlAction::SetAffected(affected) => next.affected = affected,
            ControlAction::ShowRaw(show) => next.show_raw = show,
            ControlAction::Show | ControlAction::Help | ControlAction::Quit => {}
        }
        next.validate()?;

        let reload = next.rows != self.rows;
        *self = next;
        Ok(reload)
    }

    /// "H:00 and H+1:00", wrapping at midnight.
    pub fn hour_window(&self) -> String {
        format!("{}:00 and {}:00", self.hour, (self.hour + 1) % 24)
    }
}

/// One interaction with the dashboard controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    SetRows(usize),
    SetInjuryThreshold(u32),
    SetHour(u32),
    SetAffected(AffectedType),
    ShowRaw(bool),
    Show,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  rows <n>          number of rows to load
  injured <0-19>    minimum injured persons on the map
  hour <0-23>       hour of day for density and histogram
  affected <type>   pedestrians | cyclists | motorists
  raw on|off        show the raw data table
  show              render again
  help              this text
  quit              leave";

impl FromStr for ControlAction {
    type Err = DashboardError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let command = words.next().unwrap_or_default().to_ascii_lowercase();
        let argument = words.next();
        if words.next().is_some() {
            return Err(DashboardError::UnknownCommand(line.trim().to_string()));
        }

        let action = match (command.as_str(), argument) {
            ("rows", Some(n)) => Self::SetRows(parse_number(&command, n)?),
            ("injured", Some(n)) => Self::SetInjuryThreshold(parse_number(&command, n)?),
            ("hour", Some(n)) => Self::SetHour(parse_number(&command, n)?),
            ("affected", Some(kind)) => Self::SetAffected(kind.parse()?),
            ("raw", Some(toggle)) => Self::ShowRaw(parse_toggle(toggle)?),
            ("show", None) => Self::Show,
            ("help", None) => Self::Help,
            ("quit" | "exit", None) => Self::Quit,
            _ => return Err(DashboardError::UnknownCommand(line.trim().to_string())),
        };
        Ok(action)
    }
}

fn parse_number<T: FromStr>(command: &str, raw: &str) -> Result<T, DashboardError> {
    raw.parse().map_err(|_| {
        DashboardError::InvalidArgument(format!(
            "{command} expects a non-negative integer, got '{raw}'"
        ))
    })
}

fn parse_toggle(raw: &str) -> Result<bool, DashboardError> {
    match raw.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" => Ok(true),
        "off" | "false" | "no" => Ok(false),
        _ => Err(DashboardError::InvalidArgument(format!(
            "raw expects on or off, got '{raw}'"
        ))),
    }
}
