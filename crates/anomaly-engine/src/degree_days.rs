//! Heating and cooling degree days.
//!
//! Degree-day anomalies are the difference of clipped values,
//! `max(0, T - B) - max(0, Tc - B)`, never the clipped temperature anomaly
//! `max(0, T - Tc)`. The two disagree whenever the base lies between the
//! actual and climatological temperatures.

use climate_common::{GridError, Variable};

use crate::anomaly::AnomalySet;
use crate::error::Result;

/// Per-cell degree-day fields on one grid.
#[derive(Debug, Clone, PartialEq)]
pub struct DegreeDayFields {
    /// Base temperature in °C.
    pub base: f32,
    pub cooling: Vec<f32>,
    pub heating: Vec<f32>,
    pub cooling_clim: Vec<f32>,
    pub heating_clim: Vec<f32>,
    pub cooling_anom: Vec<f32>,
    pub heating_anom: Vec<f32>,
}

/// Cooling degree days for one temperature. Missing stays missing.
#[inline]
pub fn cooling_degree_days(temperature: f32, base: f32) -> f32 {
    if temperature.is_nan() {
        f32::NAN
    } else {
        (temperature - base).max(0.0)
    }
}

/// Heating degree days for one temperature. Missing stays missing.
#[inline]
pub fn heating_degree_days(temperature: f32, base: f32) -> f32 {
    if temperature.is_nan() {
        f32::NAN
    } else {
        (base - temperature).max(0.0)
    }
}

/// Degree-day fields from actual and climatological temperatures on the same grid.
pub fn compute_degree_days(
    actual: &[f32],
    climatology: &[f32],
    base: f32,
) -> Result<DegreeDayFields> {
    if actual.len() != climatology.len() {
        return Err(GridError::ShapeMismatch {
            name: "climatological temperature".to_string(),
            expected: actual.len(),
            actual: climatology.len(),
        }
        .into());
    }

    let cooling: Vec<f32> = actual.iter().map(|&t| cooling_degree_days(t, base)).collect();
    let heating: Vec<f32> = actual.iter().map(|&t| heating_degree_days(t, base)).collect();
    let cooling_clim: Vec<f32> = climatology
        .iter()
        .map(|&t| cooling_degree_days(t, base))
        .collect();
    let heating_clim: Vec<f32> = climatology
        .iter()
        .map(|&t| heating_degree_days(t, base))
        .collect();

    let cooling_anom = cooling.iter().zip(&cooling_clim).map(|(a, c)| a - c).collect();
    let heating_anom = heating.iter().zip(&heating_clim).map(|(a, c)| a - c).collect();

    Ok(DegreeDayFields {
        base,
        cooling,
        heating,
        cooling_clim,
        heating_clim,
        cooling_anom,
        heating_anom,
    })
}

/// Degree-day fields for the temperatures carried by an anomaly set.
pub fn degree_days_for(anomalies: &AnomalySet, base: f32) -> Result<DegreeDayFields> {
    compute_degree_days(
        anomalies.actual.get(Variable::Temperature),
        anomalies.baseline.get(Variable::Temperature),
        base,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_difference_of_clipped_values() {
        // actual below base, climatology above it
        let dd = compute_degree_days(&[15.0], &[21.0], 18.0).unwrap();

        assert_eq!(dd.cooling, vec![0.0]);
        assert_eq!(dd.cooling_clim, vec![3.0]);
        assert_eq!(dd.cooling_anom, vec![-3.0]);
        assert_eq!(dd.heating, vec![3.0]);
        assert_eq!(dd.heating_clim, vec![0.0]);
        assert_eq!(dd.heating_anom, vec![3.0]);

        // Clipping the anomaly instead would lose the signal entirely
        let clipped_anomaly = (15.0f32 - 21.0).max(0.0);
        assert_eq!(clipped_anomaly, 0.0);
        assert_ne!(dd.cooling_anom[0], clipped_anomaly);
    }

    #[test]
    fn test_warm_day() {
        let dd = compute_degree_days(&[25.0, 18.0], &[20.0, 18.0], 18.0).unwrap();
        assert_eq!(dd.cooling, vec![7.0, 0.0]);
        assert_eq!(dd.cooling_anom, vec![5.0, 0.0]);
        assert_eq!(dd.heating_anom, vec![0.0, 0.0]);
    }

    #[test]
    fn test_missing_propagates() {
        let dd = compute_degree_days(&[f32::NAN, 10.0], &[20.0, f32::NAN], 18.0).unwrap();
        assert!(dd.cooling[0].is_nan());
        assert!(dd.heating[0].is_nan());
        assert_eq!(dd.cooling_clim[0], 2.0);
        assert!(dd.cooling_anom[0].is_nan());
        assert_eq!(dd.heating[1], 8.0);
        assert!(dd.heating_clim[1].is_nan());
        assert!(dd.heating_anom[1].is_nan());
    }

    #[test]
    fn test_length_mismatch() {
        assert!(compute_degree_days(&[1.0, 2.0], &[1.0], 18.0).is_err());
    }
}
