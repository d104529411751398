//! Normalized surface datasets: canonical variables on shared axes.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use climate_common::{
    is_missing, GridError, GriddedField, SpatialGrid, SurfaceFields, Variable, MISSING,
};
use tracing::debug;

use crate::error::{EngineError, Result};

/// The three canonical variables on one time axis and one spatial grid.
///
/// Produced by the normalizer; every value array is `[time][lat][lon]`,
/// temperature is in °C and winds are in m/s.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceDataset {
    times: Vec<DateTime<Utc>>,
    grid: SpatialGrid,
    fields: SurfaceFields<Vec<f32>>,
}

impl SurfaceDataset {
    /// Create a dataset, checking every array against the axes.
    pub fn new(
        times: Vec<DateTime<Utc>>,
        grid: SpatialGrid,
        fields: SurfaceFields<Vec<f32>>,
    ) -> Result<Self> {
        if times.is_empty() {
            return Err(GridError::EmptyAxis { axis: "time" }.into());
        }
        let expected = times.len() * grid.len();
        for (variable, values) in fields.iter() {
            if values.len() != expected {
                return Err(GridError::ShapeMismatch {
                    name: variable.canonical_name().to_string(),
                    expected,
                    actual: values.len(),
                }
                .into());
            }
        }
        Ok(Self {
            times,
            grid,
            fields,
        })
    }

    /// Assemble from three fields that must share time and spatial axes.
    pub fn from_fields(fields: SurfaceFields<GriddedField>) -> Result<Self> {
        let reference = &fields.t2m;
        for (variable, field) in fields.iter() {
            if field.times() != reference.times() {
                return Err(EngineError::grid_mismatch(format!(
                    "time axis of {} differs from t2m",
                    variable
                )));
            }
            if field.grid() != reference.grid() {
                return Err(EngineError::grid_mismatch(format!(
                    "spatial grid of {} differs from t2m",
                    variable
                )));
            }
        }
        let times = reference.times().to_vec();
        let grid = reference.grid().clone();
        let values = fields.map(|_, field| field.into_parts().4);
        Self::new(times, grid, values)
    }

    pub fn times(&self) -> &[DateTime<Utc>] {
        &self.times
    }

    pub fn grid(&self) -> &SpatialGrid {
        &self.grid
    }

    pub fn ntimes(&self) -> usize {
        self.times.len()
    }

    /// All values of one variable.
    pub fn values(&self, variable: Variable) -> &[f32] {
        self.fields.get(variable)
    }

    /// The 2D snapshot of one variable at a time index.
    pub fn snapshot(&self, variable: Variable, index: usize) -> Result<&[f32]> {
        if index >= self.times.len() {
            return Err(GridError::TimeIndexOutOfRange {
                index,
                len: self.times.len(),
            }
            .into());
        }
        let n = self.grid.len();
        Ok(&self.fields.get(variable)[index * n..(index + 1) * n])
    }

    /// One variable as a standalone gridded field.
    pub fn field(&self, variable: Variable) -> Result<GriddedField> {
        Ok(GriddedField::new(
            variable.canonical_name(),
            Some(variable.canonical_units().to_string()),
            self.times.clone(),
            self.grid.clone(),
            self.fields.get(variable).clone(),
        )?)
    }

    /// Aggregate to one record per UTC calendar date.
    ///
    /// Each output cell is the mean of the non-missing input cells for that
    /// date, or missing if none exist. Output times are midnight UTC.
    pub fn daily_mean(&self) -> SurfaceDataset {
        let mut by_date: BTreeMap<NaiveDate, Vec<usize>> = BTreeMap::new();
        for (index, time) in self.times.iter().enumerate() {
            by_date.entry(time.date_naive()).or_default().push(index);
        }

        let n = self.grid.len();
        let dates: Vec<NaiveDate> = by_date.keys().copied().collect();
        let fields = SurfaceFields::from_fn(|variable| {
            let values = self.fields.get(variable);
            let mut out = Vec::with_capacity(dates.len() * n);
            for indices in by_date.values() {
                let slices: Vec<&[f32]> = indices
                    .iter()
                    .map(|&i| &values[i * n..(i + 1) * n])
                    .collect();
                out.extend(nan_mean_cells(&slices, n));
            }
            out
        });

        debug!(
            records = self.times.len(),
            days = dates.len(),
            "Aggregated records to daily means"
        );

        let times = dates.iter().map(|d| midnight_utc(*d)).collect();
        Self {
            times,
            grid: self.grid.clone(),
            fields,
        }
    }

    /// Concatenate datasets along time, sorting by valid time.
    ///
    /// All parts must share one spatial grid.
    pub fn concat(parts: Vec<SurfaceDataset>) -> Result<SurfaceDataset> {
        let grid = match parts.first() {
            Some(first) => first.grid.clone(),
            None => return Err(GridError::EmptyAxis { axis: "time" }.into()),
        };
        if parts.iter().any(|part| part.grid != grid) {
            return Err(EngineError::grid_mismatch(
                "cannot merge sources on different spatial grids",
            ));
        }

        // (valid time, part, time index within part)
        let mut records: Vec<(DateTime<Utc>, usize, usize)> = parts
            .iter()
            .enumerate()
            .flat_map(|(p, part)| part.times.iter().enumerate().map(move |(i, t)| (*t, p, i)))
            .collect();
        records.sort_by_key(|(time, _, _)| *time);

        let n = grid.len();
        let times = records.iter().map(|(t, _, _)| *t).collect();
        let fields = SurfaceFields::from_fn(|variable| {
            let mut out = Vec::with_capacity(records.len() * n);
            for &(_, p, i) in &records {
                let values = parts[p].fields.get(variable);
                out.extend_from_slice(&values[i * n..(i + 1) * n]);
            }
            out
        });

        debug!(parts = parts.len(), records = records.len(), "Merged sources along time");
        Self::new(times, grid, fields)
    }
}

/// Per-cell mean over several snapshots, skipping missing cells.
pub(crate) fn nan_mean_cells(slices: &[&[f32]], n: usize) -> Vec<f32> {
    (0..n)
        .map(|cell| {
            let (sum, count) = slices.iter().fold((0.0f64, 0u32), |(sum, count), s| {
                let v = s[cell];
                if is_missing(v) {
                    (sum, count)
                } else {
                    (sum + v as f64, count + 1)
                }
            });
            if count == 0 {
                MISSING
            } else {
                (sum / count as f64) as f32
            }
        })
        .collect()
}

fn midnight_utc(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::default()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> SpatialGrid {
        SpatialGrid::regular(10.0, 1.0, 2, 0.0, 1.0, 2).unwrap()
    }

    fn hour(day: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 1, day, h, 0, 0).unwrap()
    }

    fn dataset(times: Vec<DateTime<Utc>>, t2m: Vec<f32>) -> SurfaceDataset {
        let n = t2m.len();
        SurfaceDataset::new(
            times,
            grid(),
            SurfaceFields::new(t2m, vec![1.0; n], vec![-1.0; n]),
        )
        .unwrap()
    }

    #[test]
    fn test_new_rejects_shape_mismatch() {
        let err = SurfaceDataset::new(
            vec![hour(1, 0)],
            grid(),
            SurfaceFields::new(vec![0.0; 4], vec![0.0; 3], vec![0.0; 4]),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidField(GridError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_daily_mean_groups_by_date_and_skips_missing() {
        let ds = dataset(
            vec![hour(1, 0), hour(1, 12), hour(2, 6)],
            vec![
                10.0, 20.0, MISSING, MISSING, // day 1, 00z
                30.0, 40.0, 5.0, MISSING, // day 1, 12z
                7.0, 7.0, 7.0, 7.0, // day 2
            ],
        );

        let daily = ds.daily_mean();
        assert_eq!(daily.ntimes(), 2);
        assert_eq!(daily.times()[0], hour(1, 0));
        assert_eq!(daily.times()[1], hour(2, 0));

        let day1 = daily.snapshot(Variable::Temperature, 0).unwrap();
        assert_eq!(day1[0], 20.0);
        assert_eq!(day1[1], 30.0);
        assert_eq!(day1[2], 5.0);
        assert!(day1[3].is_nan());
        assert_eq!(daily.snapshot(Variable::Temperature, 1).unwrap(), &[7.0; 4]);
        assert_eq!(daily.snapshot(Variable::WindU, 1).unwrap(), &[1.0; 4]);
    }

    #[test]
    fn test_concat_sorts_by_time() {
        let later = dataset(vec![hour(3, 0)], vec![3.0; 4]);
        let earlier = dataset(
            vec![hour(1, 0), hour(2, 0)],
            [1.0; 4].iter().chain([2.0; 4].iter()).copied().collect(),
        );

        let merged = SurfaceDataset::concat(vec![later, earlier]).unwrap();
        assert_eq!(merged.times(), &[hour(1, 0), hour(2, 0), hour(3, 0)]);
        assert_eq!(merged.snapshot(Variable::Temperature, 2).unwrap(), &[3.0; 4]);
    }

    #[test]
    fn test_concat_rejects_different_grids() {
        let a = dataset(vec![hour(1, 0)], vec![0.0; 4]);
        let other_grid = SpatialGrid::regular(50.0, 1.0, 2, 0.0, 1.0, 2).unwrap();
        let b = SurfaceDataset::new(
            vec![hour(2, 0)],
            other_grid,
            SurfaceFields::new(vec![0.0; 4], vec![0.0; 4], vec![0.0; 4]),
        )
        .unwrap();
        assert!(matches!(
            SurfaceDataset::concat(vec![a, b]),
            Err(EngineError::GridMismatch(_))
        ));
    }
}
