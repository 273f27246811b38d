//! Dashboard module - Session state and interactive controls

mod app;
mod control_panel;

pub use app::{DashboardError, DashboardReport, DashboardSession};
pub use control_panel::{ControlAction, DashboardParams, DEFAULT_ROW_LIMIT};
