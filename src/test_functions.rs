//! Objectives with known critical points, for tests and benches.

/// `Σ x_i²`, a single minimum at the origin.
pub fn sphere(x: &[f64]) -> f64 {
    x.iter().map(|v| v * v).sum()
}

/// `(x₀² - 1)² + 2 (1 - cos x₁)`: minima at `(±1, 0)`, a saddle at the origin.
pub fn double_well_2d(x: &[f64]) -> f64 {
    let well = x[0] * x[0] - 1.0;
    well * well + 2.0 * (1.0 - x[1].cos())
}

pub const DOUBLE_WELL_MINIMIZERS: [[f64; 2]; 2] = [[-1.0, 0.0], [1.0, 0.0]];

/// `x₀² - x₁²`, a saddle at the origin.
pub fn saddle_2d(x: &[f64]) -> f64 {
    x[0] * x[0] - x[1] * x[1]
}

/// [`double_well_2d`] in `(x₀, x₁)` plus [`double_well_2d`] in `(x₂, x₃)`.
pub fn separable_4d(x: &[f64]) -> f64 {
    double_well_2d(&x[..2]) + double_well_2d(&x[2..4])
}
