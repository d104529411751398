//! Integration test: persisted climatologies, anomalies and feature tables.
//!
//! Rows built from stores must match rows built in memory.

use anomaly_engine::{
    AnomalyStore, ClimatologyStore, EngineConfig, FeaturePipeline, FeatureTable, GriddedField,
    SourceDataset, StoreOptions, Variable, ZarrCompression,
};
use chrono::NaiveDate;
use test_utils::fixtures::{CENTRAL_US_POSITIVE, CENTRAL_US_SIGNED};
use test_utils::{
    assert_approx_eq, assert_fields_approx_eq, daily_times, gridded_field, seasonal_temperature_c,
    temp_test_dir_with_prefix, to_kelvin,
};

/// ERA5-style corpus: descending latitudes, 0-360 longitudes, Kelvin.
fn era5_source(year: i32) -> SourceDataset {
    let grid = CENTRAL_US_POSITIVE.grid();
    let times = daily_times(NaiveDate::from_ymd_opt(year, 9, 1).unwrap(), 5);
    let t2m = gridded_field("t2m", &grid, &times, |lat, _, t| {
        to_kelvin(&[seasonal_temperature_c(lat, t, (year - 2020) as f32 * 0.5)])[0]
    });
    let fields: Vec<GriddedField> = vec![
        t2m,
        gridded_field("u10", &grid, &times, |_, lon, _| (lon as f32 - 260.0) * 0.2),
        gridded_field("v10", &grid, &times, |lat, _, _| (lat as f32 - 40.0) * 0.1),
    ];
    SourceDataset::new(fields).with_dims("time", "latitude", "longitude")
}

/// Forecast-style snapshot: ascending latitudes, signed longitudes, Celsius.
fn forecast_source(date: NaiveDate) -> SourceDataset {
    let grid = CENTRAL_US_SIGNED.grid();
    let times = daily_times(date, 1);
    let fields: Vec<GriddedField> = vec![
        gridded_field("TMP_2maboveground", &grid, &times, |lat, lon, _| {
            (30.0 - (lat - 36.0) * 0.8 + (lon + 98.0) * 0.3) as f32
        }),
        gridded_field("UGRD_10maboveground", &grid, &times, |_, _, _| 5.0),
        gridded_field("VGRD_10maboveground", &grid, &times, |_, _, _| -2.0),
    ];
    SourceDataset::new(fields).with_dims("time", "lat", "lon")
}

fn pipeline() -> FeaturePipeline {
    FeaturePipeline::new(EngineConfig {
        hot_threshold_c: 4.0,
        cold_threshold_c: -4.0,
        ..Default::default()
    })
}

#[test]
fn test_climatology_store_round_trip_preserves_features() {
    let pipeline = pipeline();
    let climatology = pipeline
        .build_climatology(&[era5_source(2021), era5_source(2022), era5_source(2023)])
        .unwrap();
    assert_eq!(climatology.len(), 5);

    let dir = temp_test_dir_with_prefix("clim_store_");
    let options = StoreOptions {
        chunk_size: 8,
        compression: ZarrCompression::BloscLz4,
        ..StoreOptions::from(pipeline.config())
    };
    let store = ClimatologyStore::new(dir.path().join("era5_clim.zarr"), options);
    store.write(&climatology).unwrap();
    let reread = store.read().unwrap();

    assert_eq!(reread.grid(), climatology.grid());
    assert_eq!(
        reread.day_of_years().collect::<Vec<_>>(),
        climatology.day_of_years().collect::<Vec<_>>()
    );
    for (a, b) in reread.buckets().zip(climatology.buckets()) {
        assert_eq!(a.sample_days, 3);
        for variable in Variable::ALL {
            assert_fields_approx_eq!(a.values(variable), b.values(variable), 0.0);
        }
    }

    let date = NaiveDate::from_ymd_opt(2025, 9, 3).unwrap();
    let from_memory = pipeline.forecast_features(&forecast_source(date), &climatology).unwrap();
    let from_store = pipeline.forecast_features(&forecast_source(date), &reread).unwrap();
    assert_eq!(from_memory, from_store);
}

#[test]
fn test_stored_anomalies_reproduce_feature_row() {
    let pipeline = pipeline();
    let climatology = pipeline
        .build_climatology(&[era5_source(2021), era5_source(2022)])
        .unwrap();

    let date = NaiveDate::from_ymd_opt(2025, 9, 4).unwrap();
    let anomalies = pipeline.forecast_anomalies(&forecast_source(date), &climatology).unwrap();
    let expected = pipeline.features_for(&anomalies).unwrap();

    let dir = temp_test_dir_with_prefix("anom_store_");
    let store = AnomalyStore::new(
        dir.path().join("anomalies").join("20250904.zarr"),
        StoreOptions::from(pipeline.config()),
    );
    store.write(&anomalies).unwrap();

    let stored = store.read().unwrap();
    assert_eq!(stored.valid_time, anomalies.valid_time);
    assert_eq!(stored.grid, CENTRAL_US_SIGNED.grid());

    let row = pipeline.stored_features(&store, &climatology).unwrap();
    assert_eq!(row.valid_date, expected.valid_date);
    assert_eq!(row.doy, expected.doy);
    assert_approx_eq!(row.t2m_anom_mean_c.unwrap(), expected.t2m_anom_mean_c.unwrap(), 1e-4);
    assert_approx_eq!(row.cdd_mean.unwrap(), expected.cdd_mean.unwrap(), 1e-4);
    assert_approx_eq!(row.hdd_anom_mean.unwrap(), expected.hdd_anom_mean.unwrap(), 1e-4);
    assert_approx_eq!(
        row.wind_anom_mag_mean.unwrap(),
        expected.wind_anom_mag_mean.unwrap(),
        1e-4
    );
    assert_eq!(row.hot_area_frac, expected.hot_area_frac);
    assert_eq!(row.cold_area_frac, expected.cold_area_frac);
}

#[test]
fn test_feature_table_file_round_trip() {
    let pipeline = pipeline();
    let climatology = pipeline
        .build_climatology(&[era5_source(2021), era5_source(2022)])
        .unwrap();

    let mut table: FeatureTable = (1..=5)
        .rev()
        .map(|day| {
            let date = NaiveDate::from_ymd_opt(2025, 9, day).unwrap();
            pipeline.forecast_features(&forecast_source(date), &climatology).unwrap()
        })
        .collect();
    table.sort_by_date();

    let dir = temp_test_dir_with_prefix("features_");
    let path = dir.path().join("out").join("gfs_features.jsonl");
    table.write_jsonl_file(&path).unwrap();

    let reread = FeatureTable::read_jsonl_file(&path).unwrap();
    assert_eq!(reread.len(), 5);
    for (a, b) in reread.rows().iter().zip(table.rows()) {
        assert_eq!(a.valid_date, b.valid_date);
        assert_eq!(a.doy, b.doy);
        assert_approx_eq!(a.t2m_anom_mean_c.unwrap(), b.t2m_anom_mean_c.unwrap(), 1e-9);
        assert_approx_eq!(a.hdd_mean.unwrap(), b.hdd_mean.unwrap(), 1e-9);
        assert_eq!(a.hot_area_frac.is_some(), b.hot_area_frac.is_some());
    }
    assert!(reread.rows().windows(2).all(|w| w[0].valid_date < w[1].valid_date));
    assert!(reread.get(NaiveDate::from_ymd_opt(2025, 9, 2).unwrap()).is_some());
    assert!(reread.get(NaiveDate::from_ymd_opt(2025, 9, 6).unwrap()).is_none());
}
