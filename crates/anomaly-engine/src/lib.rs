//! Climate Anomaly & Degree-Day Feature Engine
//!
//! Turns gridded near-surface weather (2 m temperature, 10 m wind) into a
//! day-of-year climatology, regridded anomaly fields, heating/cooling degree
//! days and one row of regional scalar features per valid date.
//!
//! - **Normalization**: fixed alias tables for variable and axis names,
//!   Kelvin detected by magnitude
//! - **Climatology**: per-cell means bucketed by day-of-year (1-366),
//!   accumulated in parallel
//! - **Anomalies**: the climatology regridded onto the target grid, with
//!   longitude conventions and latitude order handled transparently
//! - **Persistence**: Zarr V3 stores for climatologies and anomalies, JSON
//!   Lines for feature tables
//!
//! # Architecture
//!
//! ```text
//! source grids
//!      │
//!      ▼
//! normalize / normalize_all ──► SurfaceDataset
//!      │                              │
//!      │ (historical corpus)          │ (target snapshot)
//!      ▼                              ▼
//! ClimatologyBuilder ──► Climatology ──► compute_anomalies ──► AnomalySet
//!                                                                  │
//!                                         compute_degree_days ◄────┤
//!                                                  │               │
//!                                                  ▼               ▼
//!                                            extract_features ──► RegionalFeatures
//! ```
//!
//! # Example
//!
//! ```ignore
//! use anomaly_engine::{EngineConfig, FeaturePipeline};
//!
//! let pipeline = FeaturePipeline::new(EngineConfig::from_env());
//! let climatology = pipeline.build_climatology(&era5_sources)?;
//! let row = pipeline.forecast_features(&gfs_source, &climatology)?;
//! ```

pub mod anomaly;
pub mod climatology;
pub mod config;
pub mod dataset;
pub mod degree_days;
pub mod error;
pub mod features;
pub mod normalize;
pub mod pipeline;
pub mod regrid;
pub mod store;

// Re-export commonly used types at crate root
pub use anomaly::{compute_anomalies, compute_anomalies_at, AnomalyComputer, AnomalySet};
pub use climatology::{BucketAccumulator, Climatology, ClimatologyBucket, ClimatologyBuilder};
pub use config::{EngineConfig, ZarrCompression};
pub use dataset::SurfaceDataset;
pub use degree_days::{compute_degree_days, degree_days_for, DegreeDayFields};
pub use error::{EngineError, Result};
pub use features::{extract_features, FeatureTable, FeatureThresholds, RegionalFeatures};
pub use normalize::{normalize, normalize_all, SourceDataset};
pub use pipeline::{DateFailure, FeaturePipeline, HistoricalFeatures};
pub use regrid::{InterpolationMethod, RegridOutput, RegridPlan, Regridder};
pub use store::{AnomalyStore, ClimatologyStore, StoreOptions, StoredAnomalies};

pub use climate_common::{GriddedField, SpatialGrid, SurfaceFields, Variable};
