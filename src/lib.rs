//! Collision Dash - Motor Vehicle Collision Dashboard
//!
//! Loads a bounded slice of a collisions CSV and builds the injury map,
//! hour-of-day density, per-minute breakdown and most dangerous streets
//! as plain tables for any renderer.

pub mod dashboard;
pub mod data;
pub mod report;
pub mod settings;
pub mod stats;
