//! Batch pipelines: climatology builds, forecast rows and historical tables.

use chrono::NaiveDate;
use climate_common::valid_date;
use rayon::prelude::*;
use tracing::{info, warn};

use crate::anomaly::{compute_anomalies, AnomalyComputer, AnomalySet};
use crate::climatology::{Climatology, ClimatologyBuilder};
use crate::config::EngineConfig;
use crate::degree_days::degree_days_for;
use crate::error::{EngineError, Result};
use crate::features::{extract_features, FeatureTable, RegionalFeatures};
use crate::normalize::{normalize, normalize_all, SourceDataset};
use crate::store::AnomalyStore;

/// A date that could not be turned into a feature row.
#[derive(Debug)]
pub struct DateFailure {
    pub valid_date: NaiveDate,
    pub error: EngineError,
}

/// Output of a historical run: rows for the dates that worked, failures for the rest.
#[derive(Debug, Default)]
pub struct HistoricalFeatures {
    pub table: FeatureTable,
    pub failures: Vec<DateFailure>,
}

/// Runs the normalize, anomaly, degree-day and feature chain with one configuration.
#[derive(Debug, Clone, Default)]
pub struct FeaturePipeline {
    config: EngineConfig,
}

impl FeaturePipeline {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Normalize a historical corpus and build its climatology.
    pub fn build_climatology(&self, sources: &[SourceDataset]) -> Result<Climatology> {
        let dataset = normalize_all(sources, &self.config)?;
        let mut builder = ClimatologyBuilder::new(dataset.grid().clone());
        builder.add_dataset(&dataset)?;
        builder.build()
    }

    /// Degree days and features for an anomaly set.
    pub fn features_for(&self, anomalies: &AnomalySet) -> Result<RegionalFeatures> {
        let degree_days = degree_days_for(anomalies, self.config.base_temperature_c)?;
        Ok(extract_features(anomalies, &degree_days, &self.config.thresholds()))
    }

    /// Anomalies for the first time step of a forecast source.
    pub fn forecast_anomalies(
        &self,
        source: &SourceDataset,
        climatology: &Climatology,
    ) -> Result<AnomalySet> {
        let target = normalize(source, &self.config)?;
        compute_anomalies(&target, climatology, &self.config)
    }

    /// One feature row for the first time step of a forecast source.
    pub fn forecast_features(
        &self,
        source: &SourceDataset,
        climatology: &Climatology,
    ) -> Result<RegionalFeatures> {
        let anomalies = self.forecast_anomalies(source, climatology)?;
        self.features_for(&anomalies)
    }

    /// One feature row from a previously written anomaly store.
    pub fn stored_features(
        &self,
        store: &AnomalyStore,
        climatology: &Climatology,
    ) -> Result<RegionalFeatures> {
        let anomalies = store.read()?.into_anomaly_set(climatology, &self.config)?;
        self.features_for(&anomalies)
    }

    /// One feature row per day of a historical corpus.
    ///
    /// Records are reduced to daily means first. Per-date failures (missing
    /// bucket, no grid overlap) are collected and never stop other dates;
    /// any other error aborts the run.
    pub fn historical_features(
        &self,
        sources: &[SourceDataset],
        climatology: &Climatology,
    ) -> Result<HistoricalFeatures> {
        let daily = normalize_all(sources, &self.config)?.daily_mean();
        let computer = AnomalyComputer::new(climatology, &self.config);

        let outcomes: Vec<(NaiveDate, Result<RegionalFeatures>)> = (0..daily.ntimes())
            .into_par_iter()
            .map(|index| {
                let date = valid_date(&daily.times()[index]);
                let row = computer
                    .compute(&daily, index)
                    .and_then(|anomalies| self.features_for(&anomalies));
                (date, row)
            })
            .collect();

        let mut output = HistoricalFeatures::default();
        for (date, outcome) in outcomes {
            match outcome {
                Ok(row) => output.table.push(row),
                Err(error) if error.is_per_date() => {
                    warn!(date = %date, error = %error, "Skipping date");
                    output.failures.push(DateFailure {
                        valid_date: date,
                        error,
                    });
                }
                Err(error) => return Err(error),
            }
        }
        output.table.sort_by_date();

        info!(
            rows = output.table.len(),
            failures = output.failures.len(),
            "Built historical feature table"
        );
        Ok(output)
    }
}
