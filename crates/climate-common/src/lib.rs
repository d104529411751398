//! Common types shared by the climate anomaly crates.
//!
//! Gridded fields, canonical variable names and day-of-year time helpers.

pub mod bbox;
pub mod error;
pub mod grid;
pub mod time;
pub mod variable;

pub use bbox::BoundingBox;
pub use error::{GridError, GridResult};
pub use grid::{is_missing, max_finite, GriddedField, SpatialGrid, MISSING};
pub use time::{circular_doy_distance, day_of_year, parse_valid_time, valid_date, TimeParseError};
pub use variable::{SurfaceFields, Variable};
