//! Interpolation kernels in fractional index space.
//!
//! `x` indexes columns (longitude) and `y` indexes rows (latitude) of a
//! row-major grid whose axes are both ascending. With `wrap_longitude` the
//! column after the last one is column 0.

/// Nearest neighbor interpolation.
///
/// Returns the value of the nearest grid point.
pub fn nearest_interpolate(
    data: &[f32],
    width: usize,
    height: usize,
    x: f64,
    y: f64,
    wrap_longitude: bool,
) -> f32 {
    let mut col = x.round() as usize;
    let row = y.round() as usize;

    if wrap_longitude && col == width {
        col = 0;
    }
    if col >= width || row >= height {
        return f32::NAN;
    }

    data[row * width + col]
}

/// Bilinear interpolation.
///
/// Blends the four surrounding grid points. Corners with zero weight are
/// skipped, so a position that lands exactly on a grid point returns that
/// value even if a neighbor is missing. A missing corner with positive
/// weight makes the result missing.
pub fn bilinear_interpolate(
    data: &[f32],
    width: usize,
    height: usize,
    x: f64,
    y: f64,
    wrap_longitude: bool,
) -> f32 {
    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;

    if x0 >= width || y0 >= height {
        return f32::NAN;
    }

    let x1 = if wrap_longitude {
        (x0 + 1) % width
    } else {
        (x0 + 1).min(width - 1)
    };
    let y1 = (y0 + 1).min(height - 1);

    let xf = x - x0 as f64;
    let yf = y - y0 as f64;

    let corners = [
        ((1.0 - xf) * (1.0 - yf), y0 * width + x0),
        (xf * (1.0 - yf), y0 * width + x1),
        ((1.0 - xf) * yf, y1 * width + x0),
        (xf * yf, y1 * width + x1),
    ];

    let mut value = 0.0f64;
    for (weight, index) in corners {
        if weight <= 0.0 {
            continue;
        }
        let v = data[index];
        if v.is_nan() {
            return f32::NAN;
        }
        value += weight * v as f64;
    }

    value as f32
}
