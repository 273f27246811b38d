//! Report module - Text and JSON rendering of a dashboard pass

mod renderer;

pub use renderer::{RenderError, ReportFormat, ReportRenderer};
