//! Test data generators for synthetic surface-weather fields.
//!
//! Values are produced cell by cell from closures over coordinates and
//! valid time, in the `[time][lat][lon]` layout the engine uses.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use climate_common::{GriddedField, SpatialGrid};

/// A field with the same value in every cell.
pub fn constant_field(grid: &SpatialGrid, value: f32) -> Vec<f32> {
    vec![value; grid.len()]
}

/// One snapshot of `f(lat, lon)` on `grid`, row-major.
pub fn field_from_fn(grid: &SpatialGrid, f: impl Fn(f64, f64) -> f32) -> Vec<f32> {
    let mut data = Vec::with_capacity(grid.len());
    for &lat in grid.latitudes() {
        for &lon in grid.longitudes() {
            data.push(f(lat, lon));
        }
    }
    data
}

/// A field linear in latitude and in longitude taken on [0, 360).
///
/// Bilinear interpolation reproduces it exactly, which makes it a convenient
/// reference for regridding between conventions away from the 0° seam.
pub fn linear_field(grid: &SpatialGrid, offset: f32, per_lat: f32, per_lon: f32) -> Vec<f32> {
    field_from_fn(grid, |lat, lon| {
        offset + per_lat * lat as f32 + per_lon * lon.rem_euclid(360.0) as f32
    })
}

/// Daily-mean 2 m temperature in °C with a seasonal cycle and a
/// north-south gradient. `year_shift` is added as-is to mimic
/// inter-annual variation.
pub fn seasonal_temperature_c(lat: f64, time: &DateTime<Utc>, year_shift: f32) -> f32 {
    let doy = time.ordinal() as f64;
    let season = (2.0 * std::f64::consts::PI * (doy - 110.0) / 365.25).sin();
    (12.0 + 14.0 * season - 0.6 * (lat - 40.0)) as f32 + year_shift
}

/// A gridded field with values from `f(lat, lon, time)` for every time.
pub fn gridded_field(
    name: &str,
    grid: &SpatialGrid,
    times: &[DateTime<Utc>],
    f: impl Fn(f64, f64, &DateTime<Utc>) -> f32,
) -> GriddedField {
    let mut values = Vec::with_capacity(grid.len() * times.len());
    for time in times {
        values.extend(field_from_fn(grid, |lat, lon| f(lat, lon, time)));
    }
    GriddedField::new(name, None, times.to_vec(), grid.clone(), values)
        .expect("generated field matches its axes")
}

/// Convert °C to Kelvin, leaving NaN alone.
pub fn to_kelvin(values: &[f32]) -> Vec<f32> {
    values.iter().map(|v| v + 273.15).collect()
}

/// Midnight UTC of `date` plus `days` consecutive days.
pub fn daily_times(start: NaiveDate, days: usize) -> Vec<DateTime<Utc>> {
    (0..days)
        .map(|d| midnight(start) + Duration::days(d as i64))
        .collect()
}

/// Times on each of `days` consecutive days at the given UTC hours.
pub fn hourly_times(start: NaiveDate, days: usize, hours: &[u32]) -> Vec<DateTime<Utc>> {
    daily_times(start, days)
        .into_iter()
        .flat_map(|day| hours.iter().map(move |&h| day + Duration::hours(h as i64)))
        .collect()
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).expect("midnight is valid"))
}
