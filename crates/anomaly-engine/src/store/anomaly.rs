//! Anomaly store: `/t2m_anom_c`, `/u10_anom`, `/v10_anom`, each `[nlat, nlon]`.

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use climate_common::{parse_valid_time, SpatialGrid, SurfaceFields, Variable};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{
    check_shape, create_array, from_attributes, open_array, open_store, read_subset, write_subset,
    StoreOptions,
};
use crate::anomaly::{AnomalyComputer, AnomalySet};
use crate::climatology::Climatology;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct AnomalyAttributes {
    variable: String,
    units: String,
    /// RFC 3339, UTC.
    valid_time: String,
    day_of_year: u16,
    climatology_day: u16,
    latitude: Vec<f64>,
    longitude: Vec<f64>,
}

/// Anomaly fields as read from a store, without the inputs that produced them.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredAnomalies {
    pub valid_time: DateTime<Utc>,
    pub day_of_year: u16,
    pub climatology_day: u16,
    pub grid: SpatialGrid,
    pub anomalies: SurfaceFields<Vec<f32>>,
}

impl StoredAnomalies {
    /// Rebuild the full anomaly set: the climatology is regridded again and
    /// actual values are recovered as baseline plus anomaly.
    pub fn into_anomaly_set(
        self,
        climatology: &Climatology,
        config: &EngineConfig,
    ) -> Result<AnomalySet> {
        AnomalyComputer::new(climatology, config).rebuild(self)
    }
}

/// Anomaly fields for one valid time persisted as a Zarr directory.
#[derive(Debug, Clone)]
pub struct AnomalyStore {
    root: PathBuf,
    options: StoreOptions,
}

impl AnomalyStore {
    pub fn new(root: impl Into<PathBuf>, options: StoreOptions) -> Self {
        Self {
            root: root.into(),
            options,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn write(&self, anomalies: &AnomalySet) -> Result<()> {
        let store = open_store(&self.root, true)?;
        let grid = &anomalies.grid;
        let shape = vec![grid.nlat() as u64, grid.nlon() as u64];
        let (lat_chunk, lon_chunk) = self.options.spatial_chunks(grid.nlat(), grid.nlon());

        for variable in Variable::ALL {
            let attributes = AnomalyAttributes {
                variable: variable.canonical_name().to_string(),
                units: anomaly_units(variable).to_string(),
                valid_time: anomalies.valid_time.to_rfc3339_opts(SecondsFormat::Secs, true),
                day_of_year: anomalies.day_of_year,
                climatology_day: anomalies.climatology_day,
                latitude: grid.latitudes().to_vec(),
                longitude: grid.longitudes().to_vec(),
            };
            let path = array_path(variable);
            let array = create_array(
                store.clone(),
                path,
                shape.clone(),
                vec![lat_chunk, lon_chunk],
                &attributes,
                &self.options,
            )?;
            write_subset(&array, vec![0, 0], shape.clone(), anomalies.anomaly(variable))?;
        }

        info!(
            path = %self.root.display(),
            valid_time = %anomalies.valid_time,
            day_of_year = anomalies.day_of_year,
            "Wrote anomaly store"
        );
        Ok(())
    }

    pub fn read(&self) -> Result<StoredAnomalies> {
        let store = open_store(&self.root, false)?;

        let mut reference: Option<AnomalyAttributes> = None;
        let mut fields = Vec::with_capacity(Variable::ALL.len());
        for variable in Variable::ALL {
            let path = array_path(variable);
            let array = open_array(store.clone(), path)?;
            let attributes: AnomalyAttributes = from_attributes(&array)?;
            if attributes.variable != variable.canonical_name() {
                return Err(EngineError::invalid_metadata(format!(
                    "{} holds variable '{}'",
                    path, attributes.variable
                )));
            }
            let shape = vec![attributes.latitude.len() as u64, attributes.longitude.len() as u64];
            check_shape(&array, path, &shape)?;
            fields.push(read_subset(&array, vec![0, 0], shape)?);

            match &reference {
                None => reference = Some(attributes),
                Some(r) => {
                    if r.valid_time != attributes.valid_time
                        || r.latitude != attributes.latitude
                        || r.longitude != attributes.longitude
                    {
                        return Err(EngineError::invalid_metadata(format!(
                            "{} disagrees with {} on valid time or coordinates",
                            path,
                            array_path(Variable::Temperature)
                        )));
                    }
                }
            }
        }

        let attributes =
            reference.ok_or_else(|| EngineError::invalid_metadata("anomaly store has no arrays"))?;
        let valid_time = parse_valid_time(&attributes.valid_time)
            .map_err(|e| EngineError::invalid_metadata(e.to_string()))?;
        let grid = SpatialGrid::new(attributes.latitude, attributes.longitude)?;
        let mut fields = fields.into_iter();
        let anomalies = SurfaceFields::try_from_fn(|_| {
            fields
                .next()
                .ok_or_else(|| EngineError::invalid_metadata("missing variable array"))
        })?;

        Ok(StoredAnomalies {
            valid_time,
            day_of_year: attributes.day_of_year,
            climatology_day: attributes.climatology_day,
            grid,
            anomalies,
        })
    }
}

fn array_path(variable: Variable) -> &'static str {
    match variable {
        Variable::Temperature => "/t2m_anom_c",
        Variable::WindU => "/u10_anom",
        Variable::WindV => "/v10_anom",
    }
}

fn anomaly_units(variable: Variable) -> &'static str {
    match variable {
        Variable::Temperature => "degC",
        Variable::WindU | Variable::WindV => "m s-1",
    }
}
