//! Common grid fixtures.
//!
//! Regional grids come in pairs covering the same cells in the [0, 360) and
//! [-180, 180) longitude conventions, the situation met when a reanalysis
//! climatology is applied to a forecast subset.

use climate_common::SpatialGrid;

/// Longitude span of a fixture grid, in its own convention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSpec {
    pub lat_start: f64,
    pub lat_step: f64,
    pub nlat: usize,
    pub lon_start: f64,
    pub lon_step: f64,
    pub nlon: usize,
}

impl GridSpec {
    pub fn grid(&self) -> SpatialGrid {
        SpatialGrid::regular(
            self.lat_start,
            self.lat_step,
            self.nlat,
            self.lon_start,
            self.lon_step,
            self.nlon,
        )
        .expect("fixture grid is valid")
    }
}

/// Central US at 0.5°, north to south, longitudes in [0, 360) (reanalysis layout).
pub const CENTRAL_US_POSITIVE: GridSpec = GridSpec {
    lat_start: 45.0,
    lat_step: -0.5,
    nlat: 21,
    lon_start: 260.0,
    lon_step: 0.5,
    nlon: 25,
};

/// A forecast subset inside [`CENTRAL_US_POSITIVE`] at 0.25°, south to north,
/// longitudes in [-180, 180).
pub const CENTRAL_US_SIGNED: GridSpec = GridSpec {
    lat_start: 36.0,
    lat_step: 0.25,
    nlat: 17,
    lon_start: -98.0,
    lon_step: 0.25,
    nlon: 21,
};

/// Global 1° grid, longitudes 0..359, north to south.
pub const GLOBAL_1DEG: GridSpec = GridSpec {
    lat_start: 90.0,
    lat_step: -1.0,
    nlat: 181,
    lon_start: 0.0,
    lon_step: 1.0,
    nlon: 360,
};

/// Tiny grid for unit-sized tests.
pub const SIMPLE_3X4: GridSpec = GridSpec {
    lat_start: 40.0,
    lat_step: 1.0,
    nlat: 3,
    lon_start: -100.0,
    lon_step: 1.0,
    nlon: 4,
};

/// Grid straddling the 0° meridian at 1°, longitudes in [-180, 180).
pub fn meridian_signed() -> SpatialGrid {
    SpatialGrid::regular(50.0, -1.0, 6, -5.0, 1.0, 11).expect("fixture grid is valid")
}

/// Grid with no overlap with the central US fixtures.
pub fn southern_ocean() -> SpatialGrid {
    SpatialGrid::regular(-60.0, 1.0, 5, 20.0, 1.0, 5).expect("fixture grid is valid")
}
