//! Gridded field specifications for near-surface atmospheric data.
//!
//! Values are stored row-major as `[time][lat][lon]` with `f32::NAN` as the
//! missing sentinel, matching the fill value used by the array stores.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{GridError, GridResult};
use crate::BoundingBox;

/// The missing-value sentinel shared by every field.
pub const MISSING: f32 = f32::NAN;

/// Returns true if a cell holds the missing sentinel.
#[inline]
pub fn is_missing(value: f32) -> bool {
    value.is_nan()
}

/// Largest non-missing value, or `None` if every cell is missing.
pub fn max_finite(values: &[f32]) -> Option<f32> {
    values
        .iter()
        .copied()
        .filter(|v| !is_missing(*v))
        .fold(None, |acc, v| Some(acc.map_or(v, |m: f32| m.max(v))))
}

/// A rectilinear latitude/longitude grid.
///
/// Both axes must be non-empty, finite and strictly monotonic. Either
/// direction is accepted; consumers that need ascending order sort on their
/// side. Longitudes are monotonic modulo 360: an axis may jump once across
/// the seam of its convention (`358, 359, 0, 1` or `179, -180`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialGrid {
    latitudes: Vec<f64>,
    longitudes: Vec<f64>,
}

impl SpatialGrid {
    /// Create a grid, validating both coordinate axes.
    pub fn new(latitudes: Vec<f64>, longitudes: Vec<f64>) -> GridResult<Self> {
        validate_axis("latitude", &latitudes, false)?;
        validate_axis("longitude", &longitudes, true)?;
        Ok(Self {
            latitudes,
            longitudes,
        })
    }

    /// Create a regular grid from a start point, step and count per axis.
    pub fn regular(
        lat_start: f64,
        lat_step: f64,
        nlat: usize,
        lon_start: f64,
        lon_step: f64,
        nlon: usize,
    ) -> GridResult<Self> {
        let latitudes = (0..nlat).map(|j| lat_start + j as f64 * lat_step).collect();
        let longitudes = (0..nlon).map(|i| lon_start + i as f64 * lon_step).collect();
        Self::new(latitudes, longitudes)
    }

    pub fn latitudes(&self) -> &[f64] {
        &self.latitudes
    }

    pub fn longitudes(&self) -> &[f64] {
        &self.longitudes
    }

    pub fn nlat(&self) -> usize {
        self.latitudes.len()
    }

    pub fn nlon(&self) -> usize {
        self.longitudes.len()
    }

    /// Number of cells in one 2D snapshot.
    pub fn len(&self) -> usize {
        self.nlat() * self.nlon()
    }

    /// Always false for a validated grid; provided for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.latitudes.is_empty() || self.longitudes.is_empty()
    }

    /// Bounding box spanned by the cell centers.
    pub fn bbox(&self) -> BoundingBox {
        let (min_lat, max_lat) = min_max(&self.latitudes);
        let (min_lon, max_lon) = min_max(&self.longitudes);
        BoundingBox::new(min_lon, min_lat, max_lon, max_lat)
    }
}

fn validate_axis(axis: &'static str, values: &[f64], periodic: bool) -> GridResult<()> {
    if values.is_empty() {
        return Err(GridError::EmptyAxis { axis });
    }
    if let Some(index) = values.iter().position(|v| !v.is_finite()) {
        return Err(GridError::NonFiniteCoordinate { axis, index });
    }
    if values.len() > 1
        && !monotonic(values, 1.0, periodic)
        && !monotonic(values, -1.0, periodic)
    {
        return Err(GridError::NonMonotonicAxis { axis });
    }
    Ok(())
}

/// Strictly monotonic in `direction` (1 or -1). A periodic axis may take one
/// step of more than 180° against the direction, read as crossing the seam,
/// as long as the unwrapped span stays under a full turn.
fn monotonic(values: &[f64], direction: f64, periodic: bool) -> bool {
    let mut wraps = 0;
    let mut span = 0.0;
    for w in values.windows(2) {
        let step = (w[1] - w[0]) * direction;
        if step > 0.0 {
            span += step;
        } else if periodic && step < -180.0 {
            wraps += 1;
            span += step + 360.0;
        } else {
            return false;
        }
    }
    wraps == 0 || (wraps == 1 && span < 360.0)
}

fn min_max(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
}

/// A named physical variable over (time, lat, lon).
#[derive(Debug, Clone, PartialEq)]
pub struct GriddedField {
    name: String,
    units: Option<String>,
    times: Vec<DateTime<Utc>>,
    grid: SpatialGrid,
    values: Vec<f32>,
}

impl GriddedField {
    /// Create a field, checking that the value count matches the axes.
    pub fn new(
        name: impl Into<String>,
        units: Option<String>,
        times: Vec<DateTime<Utc>>,
        grid: SpatialGrid,
        values: Vec<f32>,
    ) -> GridResult<Self> {
        let name = name.into();
        if times.is_empty() {
            return Err(GridError::EmptyAxis { axis: "time" });
        }
        let expected = times.len() * grid.len();
        if values.len() != expected {
            return Err(GridError::ShapeMismatch {
                name,
                expected,
                actual: values.len(),
            });
        }
        Ok(Self {
            name,
            units,
            times,
            grid,
            values,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn units(&self) -> Option<&str> {
        self.units.as_deref()
    }

    pub fn times(&self) -> &[DateTime<Utc>] {
        &self.times
    }

    pub fn grid(&self) -> &SpatialGrid {
        &self.grid
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn ntimes(&self) -> usize {
        self.times.len()
    }

    /// Decompose into (name, units, times, grid, values).
    pub fn into_parts(self) -> (String, Option<String>, Vec<DateTime<Utc>>, SpatialGrid, Vec<f32>) {
        (self.name, self.units, self.times, self.grid, self.values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn grid_3x4() -> SpatialGrid {
        SpatialGrid::regular(40.0, -1.0, 3, 260.0, 1.0, 4).unwrap()
    }

    #[test]
    fn test_grid_rejects_empty_axis() {
        let err = SpatialGrid::new(vec![], vec![0.0]).unwrap_err();
        assert_eq!(err, GridError::EmptyAxis { axis: "latitude" });
    }

    #[test]
    fn test_grid_rejects_non_monotonic_axis() {
        let err = SpatialGrid::new(vec![0.0, 2.0, 1.0], vec![0.0]).unwrap_err();
        assert_eq!(err, GridError::NonMonotonicAxis { axis: "latitude" });
    }

    #[test]
    fn test_longitudes_may_cross_the_seam_once() {
        assert!(SpatialGrid::new(vec![50.0], vec![358.0, 359.0, 0.0, 1.0]).is_ok());
        assert!(SpatialGrid::new(vec![45.0], vec![-1.0, -0.5, 0.0, 179.0, -180.0]).is_ok());
        assert!(SpatialGrid::new(vec![45.0], vec![1.0, 0.0, 359.0]).is_ok());

        // Latitudes never wrap
        let err = SpatialGrid::new(vec![80.0, 89.0, -90.0], vec![0.0]).unwrap_err();
        assert_eq!(err, GridError::NonMonotonicAxis { axis: "latitude" });
    }

    #[test]
    fn test_longitudes_rejected_when_wrap_is_ambiguous() {
        // Small step backwards is not a seam crossing
        let err = SpatialGrid::new(vec![0.0], vec![10.0, 20.0, 15.0]).unwrap_err();
        assert_eq!(err, GridError::NonMonotonicAxis { axis: "longitude" });

        // Two crossings cover more than a full turn
        let err = SpatialGrid::new(vec![0.0], vec![300.0, 10.0, 200.0, 5.0]).unwrap_err();
        assert_eq!(err, GridError::NonMonotonicAxis { axis: "longitude" });

        // One crossing, but the unwrapped span reaches a full turn
        let err = SpatialGrid::new(vec![0.0], vec![0.0, 180.0, 359.0, 0.0]).unwrap_err();
        assert_eq!(err, GridError::NonMonotonicAxis { axis: "longitude" });
    }

    #[test]
    fn test_grid_rejects_nan_coordinate() {
        let err = SpatialGrid::new(vec![0.0], vec![0.0, f64::NAN]).unwrap_err();
        assert_eq!(
            err,
            GridError::NonFiniteCoordinate {
                axis: "longitude",
                index: 1
            }
        );
    }

    #[test]
    fn test_grid_bbox_and_orientation() {
        let grid = grid_3x4();
        let bbox = grid.bbox();
        assert_eq!(bbox.min_lat, 38.0);
        assert_eq!(bbox.max_lat, 40.0);
        assert_eq!(bbox.min_lon, 260.0);
        assert_eq!(bbox.max_lon, 263.0);
        assert_eq!(grid.len(), 12);
    }

    #[test]
    fn test_field_shape_validation() {
        let t = Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap();
        let err = GriddedField::new("t2m", None, vec![t], grid_3x4(), vec![0.0; 11]).unwrap_err();
        assert!(matches!(err, GridError::ShapeMismatch { expected: 12, actual: 11, .. }));
    }

    #[test]
    fn test_max_finite_skips_missing() {
        let t0 = Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2024, 7, 1, 1, 0, 0).unwrap();
        let mut values: Vec<f32> = (0..24).map(|i| i as f32).collect();
        values[23] = MISSING;
        let field = GriddedField::new("t2m", Some("K".into()), vec![t0, t1], grid_3x4(), values)
            .unwrap();

        assert_eq!(max_finite(field.values()), Some(22.0));
    }

    #[test]
    fn test_all_missing_has_no_max() {
        assert_eq!(max_finite(&[MISSING; 12]), None);
    }
}
