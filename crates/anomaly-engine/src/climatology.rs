//! Day-of-year climatology construction and lookup.
//!
//! Daily records are bucketed by day-of-year (1-366) and averaged per cell.
//! Hourly input is first reduced to daily means, so a bucket is a mean of
//! daily means. Day 60 is Feb 29 in leap years and Mar 1 otherwise; no
//! alignment is attempted.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use climate_common::{
    circular_doy_distance, day_of_year, is_missing, GridError, SpatialGrid, SurfaceFields,
    Variable, MISSING,
};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::dataset::SurfaceDataset;
use crate::error::{EngineError, Result};

/// Mean fields for one day-of-year.
#[derive(Debug, Clone, PartialEq)]
pub struct ClimatologyBucket {
    pub day_of_year: u16,
    /// Number of daily records that contributed.
    pub sample_days: u32,
    /// Per-cell means on the climatology grid.
    pub fields: SurfaceFields<Vec<f32>>,
}

impl ClimatologyBucket {
    pub fn values(&self, variable: Variable) -> &[f32] {
        self.fields.get(variable)
    }
}

/// Per-cell running sums for one bucket.
///
/// Accumulators built on different threads combine with [`merge`](Self::merge).
#[derive(Debug, Clone)]
pub struct BucketAccumulator {
    sums: SurfaceFields<Vec<f64>>,
    counts: SurfaceFields<Vec<u32>>,
    days: u32,
}

impl BucketAccumulator {
    pub fn new(cells: usize) -> Self {
        Self {
            sums: SurfaceFields::from_fn(|_| vec![0.0; cells]),
            counts: SurfaceFields::from_fn(|_| vec![0; cells]),
            days: 0,
        }
    }

    /// Add one daily snapshot. Missing cells are skipped.
    pub fn add(&mut self, snapshot: SurfaceFields<&[f32]>) {
        for variable in Variable::ALL {
            let values = *snapshot.get(variable);
            let sums = self.sums.get_mut(variable);
            let counts = self.counts.get_mut(variable);
            for ((sum, count), &v) in sums.iter_mut().zip(counts.iter_mut()).zip(values) {
                if !is_missing(v) {
                    *sum += v as f64;
                    *count += 1;
                }
            }
        }
        self.days += 1;
    }

    /// Fold another accumulator for the same bucket into this one.
    pub fn merge(&mut self, other: BucketAccumulator) {
        for variable in Variable::ALL {
            let sums = self.sums.get_mut(variable);
            for (a, b) in sums.iter_mut().zip(other.sums.get(variable)) {
                *a += b;
            }
            let counts = self.counts.get_mut(variable);
            for (a, b) in counts.iter_mut().zip(other.counts.get(variable)) {
                *a += b;
            }
        }
        self.days += other.days;
    }

    pub fn days(&self) -> u32 {
        self.days
    }

    /// Per-cell means. A cell with no contributions is missing.
    pub fn finish(self, day_of_year: u16) -> ClimatologyBucket {
        let counts = self.counts;
        let fields = self.sums.map(|variable, sums| {
            sums.iter()
                .zip(counts.get(variable))
                .map(|(&sum, &count)| {
                    if count == 0 {
                        MISSING
                    } else {
                        (sum / count as f64) as f32
                    }
                })
                .collect()
        });
        ClimatologyBucket {
            day_of_year,
            sample_days: self.days,
            fields,
        }
    }
}

type AccumulatorMap = BTreeMap<u16, BucketAccumulator>;

fn merge_maps(mut a: AccumulatorMap, b: AccumulatorMap) -> AccumulatorMap {
    for (doy, acc) in b {
        match a.get_mut(&doy) {
            Some(existing) => existing.merge(acc),
            None => {
                a.insert(doy, acc);
            }
        }
    }
    a
}

/// Accumulates a historical corpus into a [`Climatology`].
///
/// All input must share the builder's spatial grid.
#[derive(Debug, Clone)]
pub struct ClimatologyBuilder {
    grid: SpatialGrid,
    accumulators: AccumulatorMap,
}

impl ClimatologyBuilder {
    pub fn new(grid: SpatialGrid) -> Self {
        Self {
            grid,
            accumulators: BTreeMap::new(),
        }
    }

    pub fn grid(&self) -> &SpatialGrid {
        &self.grid
    }

    /// Daily records accumulated so far.
    pub fn days(&self) -> u32 {
        self.accumulators.values().map(BucketAccumulator::days).sum()
    }

    /// Aggregate a dataset to daily means and add every day.
    ///
    /// A calendar date split across two calls is counted as two days.
    pub fn add_dataset(&mut self, dataset: &SurfaceDataset) -> Result<()> {
        self.check_grid(dataset.grid())?;

        let daily = dataset.daily_mean();
        let cells = self.grid.len();

        let t2m = daily.values(Variable::Temperature).par_chunks(cells);
        let u10 = daily.values(Variable::WindU).par_chunks(cells);
        let v10 = daily.values(Variable::WindV).par_chunks(cells);

        let partial = daily
            .times()
            .par_iter()
            .zip(t2m)
            .zip(u10)
            .zip(v10)
            .fold(AccumulatorMap::new, |mut map, (((time, t), u), v)| {
                map.entry(day_of_year(time))
                    .or_insert_with(|| BucketAccumulator::new(cells))
                    .add(SurfaceFields::new(t, u, v));
                map
            })
            .reduce(AccumulatorMap::new, merge_maps);

        debug!(
            days = daily.ntimes(),
            buckets = partial.len(),
            "Accumulated daily records"
        );

        let current = std::mem::take(&mut self.accumulators);
        self.accumulators = merge_maps(current, partial);
        Ok(())
    }

    /// Add a single daily snapshot.
    pub fn add_day(&mut self, time: DateTime<Utc>, snapshot: SurfaceFields<&[f32]>) -> Result<()> {
        for (variable, values) in snapshot.iter() {
            if values.len() != self.grid.len() {
                return Err(GridError::ShapeMismatch {
                    name: variable.canonical_name().to_string(),
                    expected: self.grid.len(),
                    actual: values.len(),
                }
                .into());
            }
        }
        let cells = self.grid.len();
        self.accumulators
            .entry(day_of_year(&time))
            .or_insert_with(|| BucketAccumulator::new(cells))
            .add(snapshot);
        Ok(())
    }

    /// Combine a builder that accumulated another part of the corpus.
    pub fn merge(&mut self, other: ClimatologyBuilder) -> Result<()> {
        self.check_grid(&other.grid)?;
        let current = std::mem::take(&mut self.accumulators);
        self.accumulators = merge_maps(current, other.accumulators);
        Ok(())
    }

    /// Finish every bucket. Days with no input are absent.
    pub fn build(self) -> Result<Climatology> {
        if self.accumulators.is_empty() {
            return Err(GridError::EmptyAxis { axis: "time" }.into());
        }

        let total_days: u32 = self.accumulators.values().map(BucketAccumulator::days).sum();
        let buckets: BTreeMap<u16, ClimatologyBucket> = self
            .accumulators
            .into_par_iter()
            .map(|(doy, acc)| (doy, acc.finish(doy)))
            .collect();

        info!(
            buckets = buckets.len(),
            days = total_days,
            nlat = self.grid.nlat(),
            nlon = self.grid.nlon(),
            "Built climatology"
        );

        Ok(Climatology {
            grid: self.grid,
            buckets,
        })
    }

    fn check_grid(&self, grid: &SpatialGrid) -> Result<()> {
        if grid != &self.grid {
            return Err(EngineError::grid_mismatch(
                "climatology input must share one spatial grid",
            ));
        }
        Ok(())
    }
}

/// Immutable day-of-year climatology on a fixed grid.
///
/// Safe to share across threads; nothing mutates it after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Climatology {
    grid: SpatialGrid,
    buckets: BTreeMap<u16, ClimatologyBucket>,
}

impl Climatology {
    /// Assemble from finished buckets, e.g. when reading a store.
    pub fn from_buckets(grid: SpatialGrid, buckets: Vec<ClimatologyBucket>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for bucket in buckets {
            if !(1..=climate_common::time::MAX_DAY_OF_YEAR).contains(&bucket.day_of_year) {
                return Err(EngineError::invalid_metadata(format!(
                    "day-of-year {} outside 1-366",
                    bucket.day_of_year
                )));
            }
            for (variable, values) in bucket.fields.iter() {
                if values.len() != grid.len() {
                    return Err(GridError::ShapeMismatch {
                        name: variable.canonical_name().to_string(),
                        expected: grid.len(),
                        actual: values.len(),
                    }
                    .into());
                }
            }
            map.insert(bucket.day_of_year, bucket);
        }
        Ok(Self { grid, buckets: map })
    }

    pub fn grid(&self) -> &SpatialGrid {
        &self.grid
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Present day-of-year keys in ascending order.
    pub fn day_of_years(&self) -> impl Iterator<Item = u16> + '_ {
        self.buckets.keys().copied()
    }

    pub fn buckets(&self) -> impl Iterator<Item = &ClimatologyBucket> {
        self.buckets.values()
    }

    /// Exact bucket for a day-of-year.
    pub fn bucket(&self, day_of_year: u16) -> Result<&ClimatologyBucket> {
        self.buckets
            .get(&day_of_year)
            .ok_or(EngineError::MissingClimatologyBucket { day_of_year })
    }

    /// Bucket for a day-of-year, optionally falling back to the nearest
    /// present day within `fallback_days` on the 366-day circle.
    ///
    /// Ties go to the earlier day-of-year.
    pub fn lookup(
        &self,
        day_of_year: u16,
        fallback_days: Option<u16>,
    ) -> Result<&ClimatologyBucket> {
        if let Some(bucket) = self.buckets.get(&day_of_year) {
            return Ok(bucket);
        }
        let window = fallback_days.ok_or(EngineError::MissingClimatologyBucket { day_of_year })?;

        let nearest = self
            .buckets
            .values()
            .map(|b| (circular_doy_distance(day_of_year, b.day_of_year), b))
            .filter(|(distance, _)| *distance <= window)
            .min_by_key(|(distance, b)| (*distance, b.day_of_year));

        match nearest {
            Some((distance, bucket)) => {
                warn!(
                    requested = day_of_year,
                    used = bucket.day_of_year,
                    distance = distance,
                    "Climatology bucket missing; using nearest day-of-year"
                );
                Ok(bucket)
            }
            None => Err(EngineError::MissingClimatologyBucket { day_of_year }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn grid() -> SpatialGrid {
        SpatialGrid::regular(40.0, 1.0, 2, -100.0, 1.0, 2).unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn uniform(times: Vec<DateTime<Utc>>, t2m: &[f32]) -> SurfaceDataset {
        let n = grid().len();
        let t: Vec<f32> = t2m.iter().flat_map(|&v| std::iter::repeat(v).take(n)).collect();
        let wind = vec![1.0; t.len()];
        SurfaceDataset::new(times, grid(), SurfaceFields::new(t, wind.clone(), wind)).unwrap()
    }

    #[test]
    fn test_same_day_across_years_is_averaged() {
        let ds = uniform(
            vec![day(2021, 7, 4), day(2022, 7, 4), day(2022, 7, 5)],
            &[18.0, 22.0, 30.0],
        );
        let mut builder = ClimatologyBuilder::new(grid());
        builder.add_dataset(&ds).unwrap();
        let clim = builder.build().unwrap();

        let doy = day_of_year(&day(2021, 7, 4));
        let bucket = clim.bucket(doy).unwrap();
        assert_eq!(bucket.sample_days, 2);
        assert_eq!(bucket.values(Variable::Temperature), &[20.0; 4]);
        assert_eq!(clim.bucket(doy + 1).unwrap().values(Variable::Temperature), &[30.0; 4]);
        assert_eq!(clim.len(), 2);
    }

    #[test]
    fn test_missing_cells_are_skipped() {
        let mut builder = ClimatologyBuilder::new(grid());
        let a = [1.0, MISSING, MISSING, 4.0];
        let b = [3.0, 5.0, MISSING, 4.0];
        let w = [0.0; 4];
        builder
            .add_day(day(2020, 1, 1), SurfaceFields::new(&a[..], &w[..], &w[..]))
            .unwrap();
        builder
            .add_day(day(2021, 1, 1), SurfaceFields::new(&b[..], &w[..], &w[..]))
            .unwrap();

        let clim = builder.build().unwrap();
        let t = clim.bucket(1).unwrap().values(Variable::Temperature);
        assert_eq!(t[0], 2.0);
        assert_eq!(t[1], 5.0);
        assert!(t[2].is_nan());
        assert_eq!(t[3], 4.0);
    }

    #[test]
    fn test_merge_matches_single_pass() {
        let first = uniform(vec![day(2020, 3, 1)], &[10.0]);
        let second = uniform(vec![day(2021, 3, 1)], &[14.0]);
        let both = uniform(vec![day(2020, 3, 1), day(2021, 3, 1)], &[10.0, 14.0]);

        let mut a = ClimatologyBuilder::new(grid());
        a.add_dataset(&first).unwrap();
        let mut b = ClimatologyBuilder::new(grid());
        b.add_dataset(&second).unwrap();
        a.merge(b).unwrap();

        let mut single = ClimatologyBuilder::new(grid());
        single.add_dataset(&both).unwrap();

        assert_eq!(a.build().unwrap(), single.build().unwrap());
    }

    #[test]
    fn test_other_grid_is_rejected() {
        let other = SpatialGrid::regular(0.0, 1.0, 2, 0.0, 1.0, 2).unwrap();
        let mut builder = ClimatologyBuilder::new(other);
        let ds = uniform(vec![day(2020, 1, 1)], &[1.0]);
        assert!(matches!(
            builder.add_dataset(&ds),
            Err(EngineError::GridMismatch(_))
        ));
    }

    #[test]
    fn test_empty_builder_fails() {
        assert!(ClimatologyBuilder::new(grid()).build().is_err());
    }

    #[test]
    fn test_lookup_requires_opt_in_for_fallback() {
        let ds = uniform(vec![day(2021, 1, 10), day(2021, 1, 14)], &[1.0, 2.0]);
        let mut builder = ClimatologyBuilder::new(grid());
        builder.add_dataset(&ds).unwrap();
        let clim = builder.build().unwrap();

        assert!(matches!(
            clim.lookup(12, None),
            Err(EngineError::MissingClimatologyBucket { day_of_year: 12 })
        ));
        // Equidistant: the earlier day wins
        assert_eq!(clim.lookup(12, Some(2)).unwrap().day_of_year, 10);
        assert_eq!(clim.lookup(13, Some(2)).unwrap().day_of_year, 14);
        assert!(clim.lookup(20, Some(3)).is_err());
    }

    #[test]
    fn test_lookup_wraps_around_year_end() {
        let ds = uniform(vec![day(2020, 12, 31)], &[5.0]);
        let mut builder = ClimatologyBuilder::new(grid());
        builder.add_dataset(&ds).unwrap();
        let clim = builder.build().unwrap();

        assert_eq!(clim.day_of_years().collect::<Vec<_>>(), vec![366]);
        assert_eq!(clim.lookup(1, Some(1)).unwrap().day_of_year, 366);
    }

    #[test]
    fn test_from_buckets_validates() {
        let bucket = ClimatologyBucket {
            day_of_year: 0,
            sample_days: 1,
            fields: SurfaceFields::from_fn(|_| vec![0.0; 4]),
        };
        assert!(Climatology::from_buckets(grid(), vec![bucket]).is_err());
    }
}
