//! Shared test utilities for the climate anomaly workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Fixture grids in both longitude conventions
//! - Synthetic surface-field generators
//! - Temporary directories for store round trips
//! - Approximate equality assertions for scalars and fields
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{assert_approx_eq, fixtures, generators};
//! ```

pub mod fixtures;
pub mod generators;
pub mod paths;

// Re-export commonly used items at the crate root
pub use generators::*;
pub use paths::*;

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// assert_approx_eq!(1.1_f32, 1.0_f32, 0.001_f32);    // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if !(diff <= epsilon) {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

/// Macro for approximate equality of two fields, cell by cell.
///
/// Missing (NaN) cells must be missing on both sides.
///
/// ```ignore
/// use test_utils::assert_fields_approx_eq;
///
/// assert_fields_approx_eq!(&[1.0, f32::NAN], &[1.00001, f32::NAN], 1e-3);
/// ```
#[macro_export]
macro_rules! assert_fields_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: &[f32] = $left;
        let right: &[f32] = $right;
        assert_eq!(left.len(), right.len(), "field lengths differ");
        for (cell, (&l, &r)) in left.iter().zip(right.iter()).enumerate() {
            if l.is_nan() || r.is_nan() {
                if !(l.is_nan() && r.is_nan()) {
                    panic!(
                        "assertion failed: cell {} missing on one side only (left `{:?}`, right `{:?}`)",
                        cell, l, r
                    );
                }
                continue;
            }
            let diff = (l as f64 - r as f64).abs();
            if diff > $epsilon as f64 {
                panic!(
                    "assertion failed: cell {}: left `{:?}`, right `{:?}`, diff `{:?}` > epsilon `{:?}`",
                    cell, l, r, diff, $epsilon
                );
            }
        }
    }};
}
