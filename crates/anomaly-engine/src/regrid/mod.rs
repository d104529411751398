//! Regridding of climatology fields onto a target grid.
//!
//! The source grid is put into a canonical form before any interpolation:
//! latitudes ascending (rows permuted to match) and longitudes expressed in
//! whichever convention, [-180, 180) or [0, 360), keeps them contiguous.
//! Target longitudes are wrapped into the same convention, so a target at
//! -1° finds a source column at 359°. A source that spans the full circle
//! interpolates across the seam between its last and first column.

pub mod interpolation;

pub use interpolation::{bilinear_interpolate, nearest_interpolate};

use std::fmt;

use climate_common::SpatialGrid;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{EngineError, Result};

/// Interpolation method for regridding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpolationMethod {
    /// Nearest neighbor (preserves exact source values).
    Nearest,
    /// Bilinear interpolation (smooth).
    #[default]
    Bilinear,
}

impl InterpolationMethod {
    /// Parse from string (case-insensitive). Unknown names give the default.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "nearest" | "nearest_neighbor" => Self::Nearest,
            _ => Self::Bilinear,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nearest => "nearest",
            Self::Bilinear => "bilinear",
        }
    }
}

impl fmt::Display for InterpolationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Longitude convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LonConvention {
    /// [-180, 180)
    Signed,
    /// [0, 360)
    Positive,
}

impl LonConvention {
    /// Convention a set of longitudes is written in.
    pub fn detect(longitudes: &[f64]) -> Self {
        if longitudes.iter().any(|&lon| lon >= 180.0) {
            Self::Positive
        } else {
            Self::Signed
        }
    }

    /// Express a longitude in this convention.
    pub fn wrap(&self, lon: f64) -> f64 {
        match self {
            Self::Signed => (lon + 180.0).rem_euclid(360.0) - 180.0,
            Self::Positive => lon.rem_euclid(360.0),
        }
    }
}

const COORD_EPSILON: f64 = 1e-9;

/// An ascending axis plus the source index of each position.
#[derive(Debug, Clone)]
struct SortedAxis {
    coords: Vec<f64>,
    order: Vec<usize>,
}

impl SortedAxis {
    fn new(values: impl IntoIterator<Item = f64>) -> Self {
        let mut pairs: Vec<(f64, usize)> = values
            .into_iter()
            .enumerate()
            .map(|(i, v)| (v, i))
            .collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
        // A source holding both 0° and 360° has a duplicate column after wrapping.
        pairs.dedup_by(|b, a| (b.0 - a.0).abs() < COORD_EPSILON);
        let (coords, order) = pairs.into_iter().unzip();
        Self { coords, order }
    }

    fn len(&self) -> usize {
        self.coords.len()
    }

    fn max_step(&self) -> f64 {
        self.coords
            .windows(2)
            .map(|w| w[1] - w[0])
            .fold(0.0, f64::max)
    }

    /// Fractional position of `value` inside the axis span.
    fn locate(&self, value: f64) -> Option<f64> {
        let n = self.coords.len();
        let first = self.coords[0];
        let last = self.coords[n - 1];
        if value < first - COORD_EPSILON || value > last + COORD_EPSILON {
            return None;
        }
        if n == 1 {
            return Some(0.0);
        }
        let i = self
            .coords
            .partition_point(|&c| c <= value)
            .saturating_sub(1)
            .min(n - 2);
        let step = self.coords[i + 1] - self.coords[i];
        let frac = ((value - self.coords[i]) / step).clamp(0.0, 1.0);
        Some(i as f64 + frac)
    }
}

/// Source longitudes in their contiguous convention.
#[derive(Debug, Clone)]
struct LonAxis {
    axis: SortedAxis,
    convention: LonConvention,
    /// Gap from the last column around to the first, if the axis closes the circle.
    seam_gap: Option<f64>,
}

impl LonAxis {
    fn new(longitudes: &[f64]) -> Self {
        let native = LonConvention::detect(longitudes);
        let candidates = [native, other_convention(native)];

        // Prefer the convention with the smallest interior gap; ties keep the native one.
        let mut best: Option<(f64, LonConvention, SortedAxis)> = None;
        for convention in candidates {
            let axis = SortedAxis::new(longitudes.iter().map(|&lon| convention.wrap(lon)));
            let step = axis.max_step();
            if best.as_ref().map_or(true, |(s, _, _)| step < *s - COORD_EPSILON) {
                best = Some((step, convention, axis));
            }
        }
        let (max_step, convention, axis) = match best {
            Some(b) => b,
            None => (0.0, native, SortedAxis::new(longitudes.iter().copied())),
        };

        let n = axis.len();
        let seam_gap = if n >= 2 {
            let gap = axis.coords[0] + 360.0 - axis.coords[n - 1];
            // Treat as global if the seam is no wider than the coarsest interior step.
            (gap > COORD_EPSILON && gap <= max_step * 1.5 + COORD_EPSILON).then_some(gap)
        } else {
            None
        };

        Self {
            axis,
            convention,
            seam_gap,
        }
    }

    fn locate(&self, lon: f64) -> Option<f64> {
        let lon = self.convention.wrap(lon);
        if let Some(pos) = self.axis.locate(lon) {
            return Some(pos);
        }
        let gap = self.seam_gap?;
        let n = self.axis.len();
        let last = self.axis.coords[n - 1];
        let past_last = if lon > last { lon - last } else { lon + 360.0 - last };
        (past_last >= 0.0 && past_last <= gap).then(|| (n - 1) as f64 + past_last / gap)
    }
}

fn other_convention(convention: LonConvention) -> LonConvention {
    match convention {
        LonConvention::Signed => LonConvention::Positive,
        LonConvention::Positive => LonConvention::Signed,
    }
}

/// A regridded field and how much of the target the source covered.
#[derive(Debug, Clone, PartialEq)]
pub struct RegridOutput {
    /// Values on the target grid, missing outside source coverage.
    pub values: Vec<f32>,
    /// Target cells inside source coverage.
    pub covered_cells: usize,
    /// All target cells.
    pub total_cells: usize,
}

/// Interpolates fields from one source grid onto target grids.
#[derive(Debug, Clone)]
pub struct Regridder {
    source: SpatialGrid,
    lat: SortedAxis,
    lon: LonAxis,
    method: InterpolationMethod,
}

impl Regridder {
    pub fn new(source: &SpatialGrid, method: InterpolationMethod) -> Self {
        let lat = SortedAxis::new(source.latitudes().iter().copied());
        let lon = LonAxis::new(source.longitudes());
        debug!(
            nlat = source.nlat(),
            nlon = source.nlon(),
            lon_convention = ?lon.convention,
            wraps = lon.seam_gap.is_some(),
            method = %method,
            "Prepared regridder"
        );
        Self {
            source: source.clone(),
            lat,
            lon,
            method,
        }
    }

    pub fn source(&self) -> &SpatialGrid {
        &self.source
    }

    pub fn method(&self) -> InterpolationMethod {
        self.method
    }

    /// Precompute source positions for every target row and column.
    ///
    /// Fails with `GridMismatch` if no target cell falls inside the source.
    pub fn plan(&self, target: &SpatialGrid) -> Result<RegridPlan> {
        let rows: Vec<Option<f64>> = target
            .latitudes()
            .iter()
            .map(|&lat| self.lat.locate(lat))
            .collect();
        let cols: Vec<Option<f64>> = target
            .longitudes()
            .iter()
            .map(|&lon| self.lon.locate(lon))
            .collect();

        let covered_rows = rows.iter().filter(|r| r.is_some()).count();
        let covered_cols = cols.iter().filter(|c| c.is_some()).count();
        let covered_cells = covered_rows * covered_cols;
        let total_cells = target.len();

        if covered_cells == 0 {
            return Err(EngineError::grid_mismatch(format!(
                "target extent {} does not overlap source extent {}",
                target.bbox(),
                self.source.bbox()
            )));
        }
        if covered_cells < total_cells {
            warn!(
                covered_cells = covered_cells,
                total_cells = total_cells,
                "Target grid extends beyond climatology coverage; uncovered cells are missing"
            );
        }

        Ok(RegridPlan {
            regridder: self.clone(),
            target: target.clone(),
            rows,
            cols,
            covered_cells,
            total_cells,
        })
    }

    /// Regrid one 2D field from the source grid onto `target`.
    pub fn regrid(&self, data: &[f32], target: &SpatialGrid) -> Result<RegridOutput> {
        self.plan(target)?.apply(data)
    }

    /// Copy `data` into ascending-latitude, contiguous-longitude order.
    fn reorder(&self, data: &[f32]) -> Vec<f32> {
        let nlon_src = self.source.nlon();
        let mut sorted = Vec::with_capacity(self.lat.len() * self.lon.axis.len());
        for &row in &self.lat.order {
            let src_row = &data[row * nlon_src..(row + 1) * nlon_src];
            sorted.extend(self.lon.axis.order.iter().map(|&col| src_row[col]));
        }
        sorted
    }
}

/// Source positions for one (source, target) pair, reusable across variables
/// and time steps.
#[derive(Debug, Clone)]
pub struct RegridPlan {
    regridder: Regridder,
    target: SpatialGrid,
    rows: Vec<Option<f64>>,
    cols: Vec<Option<f64>>,
    covered_cells: usize,
    total_cells: usize,
}

impl RegridPlan {
    pub fn target(&self) -> &SpatialGrid {
        &self.target
    }

    pub fn covered_cells(&self) -> usize {
        self.covered_cells
    }

    pub fn total_cells(&self) -> usize {
        self.total_cells
    }

    /// Interpolate one source field.
    pub fn apply(&self, data: &[f32]) -> Result<RegridOutput> {
        let source = &self.regridder.source;
        if data.len() != source.len() {
            return Err(EngineError::grid_mismatch(format!(
                "field has {} values but source grid has {} cells",
                data.len(),
                source.len()
            )));
        }

        let sorted = self.regridder.reorder(data);
        let width = self.regridder.lon.axis.len();
        let height = self.regridder.lat.len();
        let wrap = self.regridder.lon.seam_gap.is_some();
        let interpolate: fn(&[f32], usize, usize, f64, f64, bool) -> f32 =
            match self.regridder.method {
                InterpolationMethod::Nearest => nearest_interpolate,
                InterpolationMethod::Bilinear => bilinear_interpolate,
            };

        let mut values = Vec::with_capacity(self.total_cells);
        for row in &self.rows {
            for col in &self.cols {
                let value = match (row, col) {
                    (Some(y), Some(x)) => interpolate(&sorted, width, height, *x, *y, wrap),
                    _ => f32::NAN,
                };
                values.push(value);
            }
        }

        Ok(RegridOutput {
            values,
            covered_cells: self.covered_cells,
            total_cells: self.total_cells,
        })
    }
}
