//! Column names of the collisions table.

/// Source columns, matched case-insensitively.
pub const CRASH_DATE: &str = "CRASH_DATE";
pub const CRASH_TIME: &str = "CRASH_TIME";

/// Normalized columns.
pub const DATE_TIME: &str = "date/time";
pub const LATITUDE: &str = "latitude";
pub const LONGITUDE: &str = "longitude";
pub const ON_STREET_NAME: &str = "on_street_name";
pub const INJURED_PERSONS: &str = "injured_persons";
pub const INJURED_PEDESTRIANS: &str = "injured_pedestrians";
pub const INJURED_CYCLISTS: &str = "injured_cyclists";
pub const INJURED_MOTORISTS: &str = "injured_motorists";
