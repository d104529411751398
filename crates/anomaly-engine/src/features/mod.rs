//! Regional feature extraction.
//!
//! Every reduction runs over the whole spatial extent and skips missing
//! cells. A field with no finite cells gives `None` for the affected columns
//! instead of a fabricated zero.

pub mod table;

pub use table::FeatureTable;

use chrono::NaiveDate;
use climate_common::Variable;
use serde::{Deserialize, Serialize};

use crate::anomaly::AnomalySet;
use crate::degree_days::DegreeDayFields;

/// Extreme-area thresholds, in °C of temperature anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureThresholds {
    /// Cells with an anomaly strictly above this count as hot.
    pub hot_threshold: f32,
    /// Cells with an anomaly strictly below this count as cold.
    pub cold_threshold: f32,
}

impl Default for FeatureThresholds {
    fn default() -> Self {
        Self {
            hot_threshold: 8.0,
            cold_threshold: -8.0,
        }
    }
}

/// One scalar feature row per valid date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionalFeatures {
    pub valid_date: NaiveDate,
    pub doy: u16,
    pub t2m_anom_mean_c: Option<f64>,
    pub t2m_anom_max_c: Option<f64>,
    pub t2m_anom_min_c: Option<f64>,
    pub hot_area_frac: Option<f64>,
    pub cold_area_frac: Option<f64>,
    pub wind_anom_mag_mean: Option<f64>,
    pub cdd_mean: Option<f64>,
    pub hdd_mean: Option<f64>,
    pub cdd_anom_mean: Option<f64>,
    pub hdd_anom_mean: Option<f64>,
}

/// Summary of the finite cells of one field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSummary {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

impl FieldSummary {
    /// `None` if no cell is finite.
    pub fn of(values: &[f32]) -> Option<Self> {
        let (count, sum, min, max) = values.iter().filter(|v| v.is_finite()).fold(
            (0usize, 0.0f64, f64::INFINITY, f64::NEG_INFINITY),
            |(count, sum, min, max), &v| {
                let v = v as f64;
                (count + 1, sum + v, min.min(v), max.max(v))
            },
        );
        (count > 0).then(|| Self {
            count,
            mean: sum / count as f64,
            min,
            max,
        })
    }
}

/// Mean over finite cells.
pub fn finite_mean(values: &[f32]) -> Option<f64> {
    FieldSummary::of(values).map(|s| s.mean)
}

/// Fraction of finite cells matching `predicate`.
pub fn finite_fraction(values: &[f32], predicate: impl Fn(f32) -> bool) -> Option<f64> {
    let (finite, hits) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((0usize, 0usize), |(finite, hits), &v| {
            (finite + 1, hits + usize::from(predicate(v)))
        });
    (finite > 0).then(|| hits as f64 / finite as f64)
}

/// Per-cell magnitude of the wind anomaly; missing where either component is.
pub fn wind_anomaly_magnitude(u: &[f32], v: &[f32]) -> Vec<f32> {
    u.iter()
        .zip(v)
        .map(|(&u, &v)| {
            if u.is_nan() || v.is_nan() {
                f32::NAN
            } else {
                u.hypot(v)
            }
        })
        .collect()
}

/// Reduce one anomaly set and its degree days to a feature row.
pub fn extract_features(
    anomalies: &AnomalySet,
    degree_days: &DegreeDayFields,
    thresholds: &FeatureThresholds,
) -> RegionalFeatures {
    let t_anom = anomalies.anomaly(Variable::Temperature);
    let summary = FieldSummary::of(t_anom);
    let wind = wind_anomaly_magnitude(
        anomalies.anomaly(Variable::WindU),
        anomalies.anomaly(Variable::WindV),
    );

    RegionalFeatures {
        valid_date: anomalies.valid_date(),
        doy: anomalies.day_of_year,
        t2m_anom_mean_c: summary.map(|s| s.mean),
        t2m_anom_max_c: summary.map(|s| s.max),
        t2m_anom_min_c: summary.map(|s| s.min),
        hot_area_frac: finite_fraction(t_anom, |a| a > thresholds.hot_threshold),
        cold_area_frac: finite_fraction(t_anom, |a| a < thresholds.cold_threshold),
        wind_anom_mag_mean: finite_mean(&wind),
        cdd_mean: finite_mean(&degree_days.cooling),
        hdd_mean: finite_mean(&degree_days.heating),
        cdd_anom_mean: finite_mean(&degree_days.cooling_anom),
        hdd_anom_mean: finite_mean(&degree_days.heating_anom),
    }
}
