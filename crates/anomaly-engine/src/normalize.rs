//! Grid normalizer: canonical variable names, units and axis names.
//!
//! Source grids arrive from several producers (reanalysis downloads,
//! forecast subsets) that disagree on naming and units. Names are resolved
//! through fixed alias tables; there is no substring or best-guess matching.
//!
//! Temperature units are detected from magnitude rather than metadata: a
//! field whose largest non-missing value exceeds
//! [`EngineConfig::kelvin_detection_threshold`] is taken to be Kelvin. This is
//! a heuristic and can misfire on grids that are already in °C but corrupted
//! with large values.

use climate_common::{max_finite, GriddedField, SurfaceFields, Variable, MISSING};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::dataset::SurfaceDataset;
use crate::error::{EngineError, Result};

/// Offset between Kelvin and degrees Celsius.
pub const KELVIN_OFFSET: f32 = 273.15;

/// Accepted names for the time axis, in resolution order.
pub const TIME_AXIS_ALIASES: &[&str] = &["time", "valid_time", "t"];
/// Accepted names for the latitude axis.
pub const LAT_AXIS_ALIASES: &[&str] = &["latitude", "lat"];
/// Accepted names for the longitude axis.
pub const LON_AXIS_ALIASES: &[&str] = &["longitude", "lon"];

/// Accepted source names per canonical variable, in resolution order.
///
/// The canonical name comes first; matching is case-insensitive and exact.
pub fn variable_aliases(variable: Variable) -> &'static [&'static str] {
    match variable {
        Variable::Temperature => &[
            "t2m",
            "2t",
            "tmp2m",
            "2m_temperature",
            "tmp_2maboveground",
            "air_temperature_2m",
        ],
        Variable::WindU => &[
            "u10",
            "10u",
            "ugrd10m",
            "10m_u_component_of_wind",
            "ugrd_10maboveground",
        ],
        Variable::WindV => &[
            "v10",
            "10v",
            "vgrd10m",
            "10m_v_component_of_wind",
            "vgrd_10maboveground",
        ],
    }
}

/// A raw source grid as delivered by a fetcher.
#[derive(Debug, Clone)]
pub struct SourceDataset {
    /// Name the producer gave its time axis.
    pub time_dim: String,
    /// Name the producer gave its latitude axis.
    pub lat_dim: String,
    /// Name the producer gave its longitude axis.
    pub lon_dim: String,
    /// Source variables under their producer names.
    pub fields: Vec<GriddedField>,
    /// Producer fill value to treat as missing, if any.
    pub fill_value: Option<f32>,
}

impl SourceDataset {
    /// Create a source with the canonical axis names and no fill value.
    pub fn new(fields: Vec<GriddedField>) -> Self {
        Self {
            time_dim: "time".to_string(),
            lat_dim: "latitude".to_string(),
            lon_dim: "longitude".to_string(),
            fields,
            fill_value: None,
        }
    }

    /// Override the producer's axis names.
    pub fn with_dims(
        mut self,
        time_dim: impl Into<String>,
        lat_dim: impl Into<String>,
        lon_dim: impl Into<String>,
    ) -> Self {
        self.time_dim = time_dim.into();
        self.lat_dim = lat_dim.into();
        self.lon_dim = lon_dim.into();
        self
    }

    /// Declare the producer's fill value.
    pub fn with_fill_value(mut self, fill_value: f32) -> Self {
        self.fill_value = Some(fill_value);
        self
    }

    /// Producer names of every field, in order.
    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name().to_string()).collect()
    }
}

/// Find the source field for a canonical variable via its alias table.
pub fn resolve_variable(fields: &[GriddedField], variable: Variable) -> Option<&GriddedField> {
    variable_aliases(variable).iter().find_map(|alias| {
        fields
            .iter()
            .find(|field| field.name().eq_ignore_ascii_case(alias))
    })
}

/// Map an axis name to its canonical role name.
pub fn resolve_axis(
    role: &'static str,
    name: &str,
    aliases: &'static [&'static str],
) -> Result<&'static str> {
    if aliases.iter().any(|alias| name.eq_ignore_ascii_case(alias)) {
        Ok(aliases[0])
    } else {
        Err(EngineError::UnrecognizedAxis {
            role,
            name: name.to_string(),
        })
    }
}

/// Normalize one source into a [`SurfaceDataset`].
///
/// Fails with `MissingVariable` listing every canonical variable that could
/// not be resolved, and with `GridMismatch` if the resolved fields do not
/// share axes.
pub fn normalize(source: &SourceDataset, config: &EngineConfig) -> Result<SurfaceDataset> {
    resolve_axis("time", &source.time_dim, TIME_AXIS_ALIASES)?;
    resolve_axis("latitude", &source.lat_dim, LAT_AXIS_ALIASES)?;
    resolve_axis("longitude", &source.lon_dim, LON_AXIS_ALIASES)?;

    let resolved = SurfaceFields::from_fn(|v| resolve_variable(&source.fields, v));
    let missing: Vec<String> = resolved
        .iter()
        .filter(|(_, field)| field.is_none())
        .map(|(v, _)| v.canonical_name().to_string())
        .collect();
    if !missing.is_empty() {
        return Err(EngineError::MissingVariable {
            missing,
            found: source.field_names(),
        });
    }

    let fields = SurfaceFields::try_from_fn(|variable| {
        let field = (*resolved.get(variable)).ok_or_else(|| EngineError::MissingVariable {
            missing: vec![variable.canonical_name().to_string()],
            found: source.field_names(),
        })?;
        debug!(
            variable = %variable,
            source_name = field.name(),
            "Resolved source variable"
        );

        let mut values = field.values().to_vec();
        if let Some(fill) = source.fill_value {
            replace_fill(&mut values, fill);
        }
        if variable == Variable::Temperature {
            convert_kelvin_if_needed(&mut values, config.kelvin_detection_threshold);
        }

        Ok::<_, EngineError>(GriddedField::new(
            variable.canonical_name(),
            Some(variable.canonical_units().to_string()),
            field.times().to_vec(),
            field.grid().clone(),
            values,
        )?)
    })?;

    SurfaceDataset::from_fields(fields)
}

/// Normalize several sources and merge them along time.
pub fn normalize_all(sources: &[SourceDataset], config: &EngineConfig) -> Result<SurfaceDataset> {
    if sources.is_empty() {
        return Err(EngineError::MissingVariable {
            missing: Variable::ALL
                .iter()
                .map(|v| v.canonical_name().to_string())
                .collect(),
            found: Vec::new(),
        });
    }

    let parts = sources
        .iter()
        .map(|source| normalize(source, config))
        .collect::<Result<Vec<_>>>()?;
    let merged = SurfaceDataset::concat(parts)?;

    info!(
        sources = sources.len(),
        records = merged.ntimes(),
        nlat = merged.grid().nlat(),
        nlon = merged.grid().nlon(),
        "Normalized source corpus"
    );
    Ok(merged)
}

fn replace_fill(values: &mut [f32], fill: f32) {
    for v in values.iter_mut() {
        if *v == fill {
            *v = MISSING;
        }
    }
}

/// Subtract the Kelvin offset in place if the magnitude says Kelvin.
///
/// Returns true if a conversion was applied.
pub fn convert_kelvin_if_needed(values: &mut [f32], threshold: f32) -> bool {
    let Some(max) = max_finite(values) else {
        return false;
    };

    if max > threshold {
        debug!(max = max, "Temperature looks like Kelvin; converting to Celsius");
        for v in values.iter_mut() {
            *v -= KELVIN_OFFSET;
        }
        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use climate_common::SpatialGrid;

    fn field(name: &str, values: Vec<f32>) -> GriddedField {
        let grid = SpatialGrid::regular(45.0, -1.0, 2, 260.0, 1.0, 2).unwrap();
        let t = Utc.with_ymd_and_hms(2024, 7, 4, 0, 0, 0).unwrap();
        GriddedField::new(name, None, vec![t], grid, values).unwrap()
    }

    #[test]
    fn test_resolves_aliases_case_insensitively() {
        let source = SourceDataset::new(vec![
            field("2T", vec![300.0; 4]),
            field("10u", vec![1.0; 4]),
            field("VGRD10M", vec![2.0; 4]),
        ]);
        let ds = normalize(&source, &EngineConfig::default()).unwrap();

        let t = ds.values(Variable::Temperature);
        assert!((t[0] - 26.85).abs() < 1e-4);
        assert_eq!(ds.values(Variable::WindU), &[1.0; 4]);
        assert_eq!(ds.values(Variable::WindV), &[2.0; 4]);
    }

    #[test]
    fn test_alias_order_decides_between_candidates() {
        let source = SourceDataset::new(vec![
            field("tmp2m", vec![1.0; 4]),
            field("t2m", vec![2.0; 4]),
            field("u10", vec![0.0; 4]),
            field("v10", vec![0.0; 4]),
        ]);
        let ds = normalize(&source, &EngineConfig::default()).unwrap();
        assert_eq!(ds.values(Variable::Temperature), &[2.0; 4]);
    }

    #[test]
    fn test_missing_variables_are_enumerated() {
        let source = SourceDataset::new(vec![
            field("t2m", vec![1.0; 4]),
            field("u10_mean_wind", vec![0.0; 4]),
        ]);
        match normalize(&source, &EngineConfig::default()) {
            Err(EngineError::MissingVariable { missing, found }) => {
                assert_eq!(missing, vec!["u10".to_string(), "v10".to_string()]);
                assert_eq!(found, vec!["t2m".to_string(), "u10_mean_wind".to_string()]);
            }
            other => panic!("expected MissingVariable, got {:?}", other),
        }
    }

    #[test]
    fn test_celsius_is_left_alone() {
        let source = SourceDataset::new(vec![
            field("t2m", vec![25.0, 30.0, 199.0, -5.0]),
            field("u10", vec![0.0; 4]),
            field("v10", vec![0.0; 4]),
        ]);
        let ds = normalize(&source, &EngineConfig::default()).unwrap();
        assert_eq!(ds.values(Variable::Temperature), &[25.0, 30.0, 199.0, -5.0]);
    }

    #[test]
    fn test_fill_value_becomes_missing_before_unit_detection() {
        let source = SourceDataset::new(vec![
            field("t2m", vec![20.0, 9999.0, 21.0, 22.0]),
            field("u10", vec![9999.0, 1.0, 1.0, 1.0]),
            field("v10", vec![0.0; 4]),
        ])
        .with_fill_value(9999.0);
        let ds = normalize(&source, &EngineConfig::default()).unwrap();

        let t = ds.values(Variable::Temperature);
        assert_eq!(t[0], 20.0);
        assert!(t[1].is_nan());
        assert!(ds.values(Variable::WindU)[0].is_nan());
    }

    #[test]
    fn test_axis_names_are_resolved() {
        let source = SourceDataset::new(vec![
            field("t2m", vec![0.0; 4]),
            field("u10", vec![0.0; 4]),
            field("v10", vec![0.0; 4]),
        ]);
        let ok = source.clone().with_dims("valid_time", "lat", "lon");
        assert!(normalize(&ok, &EngineConfig::default()).is_ok());

        let bad = source.with_dims("step", "lat", "lon");
        assert!(matches!(
            normalize(&bad, &EngineConfig::default()),
            Err(EngineError::UnrecognizedAxis { role: "time", .. })
        ));
    }

    #[test]
    fn test_normalize_all_requires_a_source() {
        assert!(matches!(
            normalize_all(&[], &EngineConfig::default()),
            Err(EngineError::MissingVariable { .. })
        ));
    }

    #[test]
    fn test_kelvin_detection_ignores_missing() {
        let mut values = vec![f32::NAN, 150.0, 180.0];
        assert!(!convert_kelvin_if_needed(&mut values, 200.0));

        let mut values = vec![f32::NAN, 250.0, 300.0];
        assert!(convert_kelvin_if_needed(&mut values, 200.0));
        assert!(values[0].is_nan());
        assert!((values[2] - 26.85).abs() < 1e-4);
    }

    #[test]
    fn test_all_missing_temperature_is_not_converted() {
        let mut values = vec![f32::NAN; 3];
        assert!(!convert_kelvin_if_needed(&mut values, 200.0));
        assert!(values.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_source_across_greenwich_in_positive_longitudes() {
        let grid = SpatialGrid::new(vec![51.0, 50.0], vec![359.0, 0.0]).unwrap();
        let t = Utc.with_ymd_and_hms(2024, 7, 4, 0, 0, 0).unwrap();
        let field = |name: &str, v: f32| {
            GriddedField::new(name, None, vec![t], grid.clone(), vec![v; 4]).unwrap()
        };
        let source = SourceDataset::new(vec![
            field("t2m", 290.15),
            field("u10", 1.0),
            field("v10", 0.0),
        ]);

        let ds = normalize(&source, &EngineConfig::default()).unwrap();
        assert_eq!(ds.grid(), &grid);
        assert!((ds.values(Variable::Temperature)[3] - 17.0).abs() < 1e-4);
    }
}
