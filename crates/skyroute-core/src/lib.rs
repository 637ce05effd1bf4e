pub mod atlas;
pub mod boundary;
pub mod cache;
pub mod color;
pub mod config;
pub mod country;
pub mod feed;
pub mod period;
pub mod rankings;
pub mod trail;
pub mod views;

pub use atlas::{RouteAtlas, Selection};
pub use color::PassengerColorScale;
pub use boundary::{BoundaryDataset, CountryBoundary};
pub use config::{AtlasConfig, PerformanceMode, RenderSettings};
pub use country::{CountryAssigner, CountryAssignment, CountrySelection, ReferenceRegion};
pub use feed::{Airport, CoordKey, FlightRecord, RecordId, RecordStore};
pub use period::Period;
pub use rankings::{PeriodStats, RankChange, RouteChanges, TopCountries};
pub use trail::{TrailAnimator, TrailSegment};
pub use views::{DerivedViews, SeriesSelector, TimeSeries, TimeSeriesPoint};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SkyrouteError {
    #[error("Flight feed error: {0}")]
    Feed(#[from] feed::FeedError),
    #[error("Boundary dataset error: {0}")]
    Boundary(#[from] boundary::BoundaryError),
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Invalid period: {0}")]
    Period(#[from] period::PeriodError),
}

/// Directory holding `settings.json`.
pub fn get_config_root() -> PathBuf {
    directories::ProjectDirs::from("org", "skyroute", "skyroute")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}
