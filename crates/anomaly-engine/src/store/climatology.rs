//! Climatology store: `/t2m`, `/u10`, `/v10`, each `[366, nlat, nlon]`.
//!
//! Day-of-year `d` lives at index `d - 1` of the leading axis, one chunk row
//! per day. Only the days listed in the `day_of_year` attribute are present;
//! the rest of the array is fill.

use std::path::{Path, PathBuf};

use climate_common::time::MAX_DAY_OF_YEAR;
use climate_common::{SpatialGrid, SurfaceFields, Variable};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{
    check_shape, create_array, from_attributes, open_array, open_store, read_subset, write_subset,
    StoreOptions,
};
use crate::climatology::{Climatology, ClimatologyBucket};
use crate::error::{EngineError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ClimatologyAttributes {
    variable: String,
    units: String,
    latitude: Vec<f64>,
    longitude: Vec<f64>,
    day_of_year: Vec<u16>,
    sample_days: Vec<u32>,
}

/// A climatology persisted as a Zarr directory.
#[derive(Debug, Clone)]
pub struct ClimatologyStore {
    root: PathBuf,
    options: StoreOptions,
}

impl ClimatologyStore {
    pub fn new(root: impl Into<PathBuf>, options: StoreOptions) -> Self {
        Self {
            root: root.into(),
            options,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write every present bucket.
    pub fn write(&self, climatology: &Climatology) -> Result<()> {
        let store = open_store(&self.root, true)?;
        let grid = climatology.grid();
        let (nlat, nlon) = (grid.nlat() as u64, grid.nlon() as u64);
        let (lat_chunk, lon_chunk) = self.options.spatial_chunks(grid.nlat(), grid.nlon());

        let days: Vec<u16> = climatology.day_of_years().collect();
        let sample_days: Vec<u32> = climatology.buckets().map(|b| b.sample_days).collect();

        for variable in Variable::ALL {
            let path = array_path(variable);
            let attributes = ClimatologyAttributes {
                variable: variable.canonical_name().to_string(),
                units: variable.canonical_units().to_string(),
                latitude: grid.latitudes().to_vec(),
                longitude: grid.longitudes().to_vec(),
                day_of_year: days.clone(),
                sample_days: sample_days.clone(),
            };
            let array = create_array(
                store.clone(),
                &path,
                vec![MAX_DAY_OF_YEAR as u64, nlat, nlon],
                vec![1, lat_chunk, lon_chunk],
                &attributes,
                &self.options,
            )?;

            for bucket in climatology.buckets() {
                write_subset(
                    &array,
                    vec![(bucket.day_of_year - 1) as u64, 0, 0],
                    vec![1, nlat, nlon],
                    bucket.values(variable),
                )?;
            }
            debug!(variable = %variable, buckets = days.len(), "Wrote climatology array");
        }

        info!(
            path = %self.root.display(),
            buckets = days.len(),
            compression = %self.options.compression,
            "Wrote climatology store"
        );
        Ok(())
    }

    /// Read the climatology back. Absent days stay absent.
    pub fn read(&self) -> Result<Climatology> {
        let store = open_store(&self.root, false)?;

        let mut reference: Option<ClimatologyAttributes> = None;
        let mut arrays = Vec::with_capacity(Variable::ALL.len());
        for variable in Variable::ALL {
            let path = array_path(variable);
            let array = open_array(store.clone(), &path)?;
            let attributes: ClimatologyAttributes = from_attributes(&array)?;
            if attributes.variable != variable.canonical_name() {
                return Err(EngineError::invalid_metadata(format!(
                    "{} holds variable '{}'",
                    path, attributes.variable
                )));
            }
            match &reference {
                None => reference = Some(attributes),
                Some(r) => {
                    if r.latitude != attributes.latitude
                        || r.longitude != attributes.longitude
                        || r.day_of_year != attributes.day_of_year
                    {
                        return Err(EngineError::invalid_metadata(format!(
                            "{} disagrees with /t2m on coordinates or days",
                            path
                        )));
                    }
                }
            }
            arrays.push(array);
        }

        let attributes = reference
            .ok_or_else(|| EngineError::invalid_metadata("climatology store has no arrays"))?;
        if attributes.sample_days.len() != attributes.day_of_year.len() {
            return Err(EngineError::invalid_metadata(
                "sample_days and day_of_year lengths differ",
            ));
        }
        let grid = SpatialGrid::new(attributes.latitude.clone(), attributes.longitude.clone())?;
        let (nlat, nlon) = (grid.nlat() as u64, grid.nlon() as u64);
        for (variable, array) in Variable::ALL.iter().zip(&arrays) {
            check_shape(array, &array_path(*variable), &[MAX_DAY_OF_YEAR as u64, nlat, nlon])?;
        }

        let mut buckets = Vec::with_capacity(attributes.day_of_year.len());
        for (&doy, &sample_days) in attributes.day_of_year.iter().zip(&attributes.sample_days) {
            if !(1..=MAX_DAY_OF_YEAR).contains(&doy) {
                return Err(EngineError::invalid_metadata(format!(
                    "day-of-year {} outside 1-366",
                    doy
                )));
            }
            let mut values = arrays
                .iter()
                .map(|array| read_subset(array, vec![(doy - 1) as u64, 0, 0], vec![1, nlat, nlon]));
            let fields = SurfaceFields::try_from_fn(|_| {
                values
                    .next()
                    .unwrap_or_else(|| Err(EngineError::invalid_metadata("missing variable array")))
            })?;
            buckets.push(ClimatologyBucket {
                day_of_year: doy,
                sample_days,
                fields,
            });
        }

        info!(
            path = %self.root.display(),
            buckets = buckets.len(),
            "Read climatology store"
        );
        Climatology::from_buckets(grid, buckets)
    }
}

fn array_path(variable: Variable) -> String {
    format!("/{}", variable.canonical_name())
}
