//! Data module - CSV loading, caching and derived views

mod cache;
pub mod columns;
mod loader;
mod processor;

#[cfg(test)]
pub(crate) mod fixtures;

pub use cache::DatasetCache;
pub use loader::{CollisionLoader, CollisionTable, LoadStats, LoaderError, TimestampPolicy};
pub use processor::{
    AffectedType, CollisionViews, Coordinate, DensityPoint, StreetRanking, ViewError,
    MAX_HOUR, MAX_INJURY_THRESHOLD,
};
