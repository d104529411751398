//! Anomaly computation against a climatology.
//!
//! The climatology bucket for the target's day-of-year is regridded onto the
//! target grid and subtracted per cell. Anomalies always live on the target
//! grid, never the climatology's.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, NaiveDate, Utc};
use climate_common::{day_of_year, valid_date, SpatialGrid, SurfaceFields, Variable};
use tracing::{debug, info};

use crate::climatology::Climatology;
use crate::config::EngineConfig;
use crate::dataset::SurfaceDataset;
use crate::error::{EngineError, Result};
use crate::regrid::{RegridPlan, Regridder};
use crate::store::StoredAnomalies;

/// Anomalies for one valid time, with the inputs that produced them.
#[derive(Debug, Clone, PartialEq)]
pub struct AnomalySet {
    pub valid_time: DateTime<Utc>,
    /// Day-of-year of the valid time.
    pub day_of_year: u16,
    /// Day-of-year of the climatology bucket actually used.
    pub climatology_day: u16,
    pub grid: SpatialGrid,
    /// Target values.
    pub actual: SurfaceFields<Vec<f32>>,
    /// Climatology regridded onto the target grid.
    pub baseline: SurfaceFields<Vec<f32>>,
    /// `actual - baseline`, per cell.
    pub anomalies: SurfaceFields<Vec<f32>>,
}

impl AnomalySet {
    pub fn valid_date(&self) -> NaiveDate {
        valid_date(&self.valid_time)
    }

    pub fn anomaly(&self, variable: Variable) -> &[f32] {
        self.anomalies.get(variable)
    }

    /// True if a neighboring bucket stood in for the exact day-of-year.
    pub fn used_fallback(&self) -> bool {
        self.day_of_year != self.climatology_day
    }
}

/// Computes anomalies for many targets on one grid, regridding setup done once.
#[derive(Debug)]
pub struct AnomalyComputer<'a> {
    climatology: &'a Climatology,
    config: &'a EngineConfig,
    regridder: Regridder,
    /// Plan for the most recent target grid.
    plan: RwLock<Option<Arc<RegridPlan>>>,
}

impl<'a> AnomalyComputer<'a> {
    pub fn new(climatology: &'a Climatology, config: &'a EngineConfig) -> Self {
        Self {
            climatology,
            config,
            regridder: Regridder::new(climatology.grid(), config.interpolation),
            plan: RwLock::new(None),
        }
    }

    /// Regrid plan onto `target`, built on first use and shared while the
    /// target grid stays the same.
    pub fn plan_for(&self, target: &SpatialGrid) -> Result<Arc<RegridPlan>> {
        {
            let slot = self.plan.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(plan) = slot.as_ref().filter(|p| p.target() == target) {
                return Ok(Arc::clone(plan));
            }
        }

        let mut slot = self.plan.write().unwrap_or_else(PoisonError::into_inner);
        // Another thread may have planned the same grid while we waited
        if let Some(plan) = slot.as_ref().filter(|p| p.target() == target) {
            return Ok(Arc::clone(plan));
        }
        let plan = Arc::new(self.regridder.plan(target)?);
        *slot = Some(Arc::clone(&plan));
        Ok(plan)
    }

    /// Anomalies for one time step of `target`.
    pub fn compute(&self, target: &SurfaceDataset, time_index: usize) -> Result<AnomalySet> {
        let valid_time = *target.times().get(time_index).ok_or_else(|| {
            EngineError::MissingValidTime(format!(
                "time index {} outside a {}-step target",
                time_index,
                target.ntimes()
            ))
        })?;
        let doy = day_of_year(&valid_time);
        let bucket = self.climatology.lookup(doy, self.config.bucket_fallback_days)?;

        let grid = target.grid();
        let plan = self.plan_for(grid)?;

        let actual = SurfaceFields::try_from_fn(|v| {
            target.snapshot(v, time_index).map(<[f32]>::to_vec)
        })?;
        let baseline = SurfaceFields::try_from_fn(|v| {
            plan.apply(bucket.values(v)).map(|out| out.values)
        })?;
        let anomalies = SurfaceFields::from_fn(|v| {
            actual
                .get(v)
                .iter()
                .zip(baseline.get(v))
                .map(|(a, b)| a - b)
                .collect::<Vec<f32>>()
        });

        info!(
            valid_time = %valid_time,
            day_of_year = doy,
            climatology_day = bucket.day_of_year,
            covered_cells = plan.covered_cells(),
            total_cells = plan.total_cells(),
            "Computed anomalies"
        );

        Ok(AnomalySet {
            valid_time,
            day_of_year: doy,
            climatology_day: bucket.day_of_year,
            grid: grid.clone(),
            actual,
            baseline,
            anomalies,
        })
    }

    /// Recover actual values for stored anomalies as regridded climatology
    /// plus anomaly.
    ///
    /// Uses the bucket recorded at write time; no fallback is applied again.
    pub fn rebuild(&self, stored: StoredAnomalies) -> Result<AnomalySet> {
        let bucket = self.climatology.bucket(stored.climatology_day)?;
        let plan = self.plan_for(&stored.grid)?;

        let baseline = SurfaceFields::try_from_fn(|v| {
            plan.apply(bucket.values(v)).map(|out| out.values)
        })?;
        let actual = SurfaceFields::from_fn(|v| {
            baseline
                .get(v)
                .iter()
                .zip(stored.anomalies.get(v))
                .map(|(b, a)| b + a)
                .collect::<Vec<f32>>()
        });

        debug!(
            valid_time = %stored.valid_time,
            climatology_day = stored.climatology_day,
            "Rebuilt anomaly set from stored anomalies"
        );

        Ok(AnomalySet {
            valid_time: stored.valid_time,
            day_of_year: stored.day_of_year,
            climatology_day: stored.climatology_day,
            grid: stored.grid,
            actual,
            baseline,
            anomalies: stored.anomalies,
        })
    }
}

/// Anomalies for the first time step of `target`.
pub fn compute_anomalies(
    target: &SurfaceDataset,
    climatology: &Climatology,
    config: &EngineConfig,
) -> Result<AnomalySet> {
    if target.ntimes() > 1 {
        debug!(
            steps = target.ntimes(),
            "Target has several time steps; using the first"
        );
    }
    compute_anomalies_at(target, 0, climatology, config)
}

/// Anomalies for one time step of `target`.
pub fn compute_anomalies_at(
    target: &SurfaceDataset,
    time_index: usize,
    climatology: &Climatology,
    config: &EngineConfig,
) -> Result<AnomalySet> {
    AnomalyComputer::new(climatology, config).compute(target, time_index)
}
