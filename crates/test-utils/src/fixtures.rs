//! Common test fixtures for grid-file tests.
//!
//! This module provides pre-defined grids and time axes that represent
//! common simulation setups.

use chrono::{NaiveDate, NaiveDateTime};
use grid_common::{EpsgCode, SpatialGrid, TimeAxis};

/// Midnight on 2000-01-01, the start of most fixture runs.
pub fn start_2000() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2000, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .expect("valid fixture date")
}

/// Daily time axis of `count` steps starting 2000-01-01.
pub fn daily_axis(count: usize) -> TimeAxis {
    TimeAxis::new(start_2000(), 86400, count).expect("valid fixture axis")
}

/// Hourly time axis of `count` steps starting 2000-01-01.
pub fn hourly_axis(count: usize) -> TimeAxis {
    TimeAxis::new(start_2000(), 3600, count).expect("valid fixture axis")
}

/// 2x2 geographic grid of 1 degree cells with its north-west corner at 52N 4E.
pub fn tiny_geographic_grid() -> SpatialGrid {
    SpatialGrid::new(2, 2, 1.0, 4.0, 52.0, EpsgCode::WGS84).expect("valid fixture grid")
}

/// `rows x cols` geographic grid of 0.1 degree cells over the Rhine basin.
pub fn geographic_grid(rows: usize, cols: usize) -> SpatialGrid {
    SpatialGrid::new(rows, cols, 0.1, 6.0, 52.0, EpsgCode::WGS84).expect("valid fixture grid")
}

/// `rows x cols` UTM 31N grid of 1 km cells near Amsterdam.
pub fn utm_grid(rows: usize, cols: usize) -> SpatialGrid {
    SpatialGrid::new(
        rows,
        cols,
        1000.0,
        626_000.0,
        5_806_000.0,
        EpsgCode::new(32631),
    )
    .expect("valid fixture grid")
}
