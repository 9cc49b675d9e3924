//! Least-squares polynomial approximation of sampled objective values.
use nalgebra::{DMatrix, DVector, SVD};
use serde::{Deserialize, Serialize};

use crate::{
    Basis, BasisKind, CritcoolError, DegreeSpec, DomainConfig, Grid, Objective, PrecisionMode,
    SupportSet, Warning, evaluate_samples, invalid_config, vandermonde,
};

/// A fitted polynomial `Σ_j c_j Π_d φ_{α_j[d]}(u_d)` in normalized coordinates
/// `u = (x - center) / scale`.
///
/// The coefficient at index `j` belongs to the multi-index `support.get(j)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolynomialApproximant {
    degree: DegreeSpec,
    basis: BasisKind,
    support: SupportSet,
    coeffs: DVector<f64>,
    precision: PrecisionMode,
    error: f64,
    condition_number: f64,
    center: Vec<f64>,
    scale: Vec<f64>,
}

/// A fitted approximant and the numerical-quality warnings raised while fitting it.
#[derive(Debug, Clone)]
pub struct FitOutcome {
    pub approximant: PolynomialApproximant,
    pub warnings: Vec<Warning>,
}

impl PolynomialApproximant {
    /// Sample `objective` on the grid described by `config` and fit it.
    pub fn fit(config: &DomainConfig, objective: &dyn Objective) -> Result<FitOutcome, CritcoolError> {
        let grid = Grid::build(config.nodes(), config.basis())?;
        Self::fit_on_grid(config, &grid, objective)
    }

    /// Like [`PolynomialApproximant::fit`], on an externally supplied grid.
    pub fn fit_on_grid(
        config: &DomainConfig,
        grid: &Grid,
        objective: &dyn Objective,
    ) -> Result<FitOutcome, CritcoolError> {
        let values = evaluate_samples(config, grid, objective)?;
        Self::fit_values(config, grid, &values)
    }

    /// Fit already sampled values, `values[i]` being the objective at grid point `i`.
    pub fn fit_values(
        config: &DomainConfig,
        grid: &Grid,
        values: &[f64],
    ) -> Result<FitOutcome, CritcoolError> {
        if grid.dim() != config.dim() {
            return Err(invalid_config(format!(
                "grid of dimension {} for a {}-dimensional domain",
                grid.dim(),
                config.dim()
            )));
        }
        if values.len() != grid.len() {
            return Err(invalid_config(format!(
                "{} sample values for {} grid points",
                values.len(),
                grid.len()
            )));
        }
        let rhs = DVector::from_column_slice(values);
        let mut warnings = Vec::new();

        let approximant = match config.degree() {
            DegreeSpec::Adaptive {
                tolerance,
                start,
                max_degree,
            } => {
                let mut best: Option<(usize, PolynomialApproximant)> = None;
                for degree in *start..=*max_degree {
                    let support = SupportSet::total_degree(config.dim(), degree);
                    if support.len() > grid.len() && best.is_some() {
                        // The grid cannot determine any higher degree.
                        log::debug!(
                            "Adaptive fit: degree {degree} needs {} samples, the grid has {}",
                            support.len(),
                            grid.len()
                        );
                        break;
                    }
                    let fit = fit_support(config, grid, &rhs, DegreeSpec::Fixed(degree), support)?;
                    log::debug!("Adaptive fit: degree {degree} error {:e}", fit.error);
                    let done = fit.error < *tolerance;
                    if best.as_ref().is_none_or(|(_, b)| fit.error < b.error) {
                        best = Some((degree, fit));
                    }
                    if done {
                        break;
                    }
                }
                let (degree, best) =
                    best.ok_or_else(|| invalid_config("empty adaptive degree range"))?;
                if !(best.error < *tolerance) {
                    Warning::ToleranceNotReached {
                        degree,
                        error: best.error,
                        tolerance: *tolerance,
                    }
                    .emit(&mut warnings);
                }
                best
            }
            degree => {
                let support = SupportSet::from_spec(config.dim(), degree)?;
                fit_support(config, grid, &rhs, degree.clone(), support)?
            }
        };

        if approximant.condition_number > config.condition_alarm() {
            Warning::IllConditionedSystem {
                condition_number: approximant.condition_number,
                threshold: config.condition_alarm(),
            }
            .emit(&mut warnings);
        }

        log::info!(
            "Fitted {:?} approximant of degree {:?}: {} coefficients, error {:e}, condition {:e}",
            approximant.basis,
            approximant.degree,
            approximant.coeffs.len(),
            approximant.error,
            approximant.condition_number
        );
        Ok(FitOutcome {
            approximant,
            warnings,
        })
    }

    /// The degree actually used. Adaptive policies resolve to `Fixed`.
    pub fn degree(&self) -> &DegreeSpec {
        &self.degree
    }

    pub fn basis(&self) -> BasisKind {
        self.basis
    }

    pub fn support(&self) -> &SupportSet {
        &self.support
    }

    pub fn coeffs(&self) -> &DVector<f64> {
        &self.coeffs
    }

    pub fn precision(&self) -> PrecisionMode {
        self.precision
    }

    /// Root mean square residual over the sample grid.
    pub fn error(&self) -> f64 {
        self.error
    }

    /// Ratio of the largest to the smallest singular value of the Vandermonde matrix.
    pub fn condition_number(&self) -> f64 {
        self.condition_number
    }

    pub fn center(&self) -> &[f64] {
        &self.center
    }

    pub fn scale(&self) -> &[f64] {
        &self.scale
    }

    pub fn dim(&self) -> usize {
        self.support.dim()
    }

    /// Evaluate at a point of the normalized cube.
    pub fn eval_normalized(&self, u: &[f64]) -> f64 {
        let max_degrees = self.support.max_degrees();
        let values: Vec<Vec<f64>> = u
            .iter()
            .zip(&max_degrees)
            .map(|(x, &degree)| self.basis.values(degree, x))
            .collect();

        self.support
            .iter()
            .zip(self.coeffs.iter())
            .map(|(alpha, c)| {
                alpha
                    .iter()
                    .zip(&values)
                    .fold(*c, |acc, (&m, per_dim)| acc * per_dim[m as usize])
            })
            .sum()
    }

    /// Evaluate at a point of the original domain.
    pub fn eval(&self, x: &[f64]) -> f64 {
        let u: Vec<f64> = x
            .iter()
            .zip(self.center.iter().zip(&self.scale))
            .map(|(x, (c, s))| (x - c) / s)
            .collect();
        self.eval_normalized(&u)
    }

    /// Gradient of the orthogonal form with respect to the original coordinates.
    pub fn gradient(&self, x: &[f64]) -> Vec<f64> {
        let max_degrees = self.support.max_degrees();
        let u: Vec<f64> = x
            .iter()
            .zip(self.center.iter().zip(&self.scale))
            .map(|(x, (c, s))| (x - c) / s)
            .collect();
        let values: Vec<Vec<f64>> = u
            .iter()
            .zip(&max_degrees)
            .map(|(x, &degree)| self.basis.values(degree, x))
            .collect();
        let derivatives: Vec<Vec<f64>> = u
            .iter()
            .zip(&max_degrees)
            .map(|(&x, &degree)| self.basis.derivatives(degree, x))
            .collect();

        let mut gradient = vec![0.0; u.len()];
        for (alpha, c) in self.support.iter().zip(self.coeffs.iter()) {
            for (d, g) in gradient.iter_mut().enumerate() {
                let term = alpha.iter().enumerate().fold(*c, |acc, (e, &m)| {
                    let table = if e == d { &derivatives[e] } else { &values[e] };
                    acc * table[m as usize]
                });
                *g += term;
            }
        }
        // Chain rule through the normalization.
        for (g, s) in gradient.iter_mut().zip(&self.scale) {
            *g /= s;
        }
        gradient
    }
}

/// Zero every coefficient with magnitude below `threshold`.
///
/// Raising the threshold never shrinks the zeroed set, already zero entries stay
/// untouched, and applying it twice equals applying it once.
pub fn sparsify_coefficients(coeffs: &DVector<f64>, threshold: f64) -> DVector<f64> {
    coeffs.map(|c| if c != 0.0 && c.abs() < threshold { 0.0 } else { c })
}

fn fit_support(
    config: &DomainConfig,
    grid: &Grid,
    rhs: &DVector<f64>,
    degree: DegreeSpec,
    support: SupportSet,
) -> Result<PolynomialApproximant, CritcoolError> {
    if support.len() > grid.len() {
        return Err(invalid_config(format!(
            "{} basis functions but only {} samples",
            support.len(),
            grid.len()
        )));
    }

    let matrix = vandermonde(grid, &support, config.basis())?;
    let (coeffs, condition_number) = least_squares(&matrix, rhs)?;

    let coeffs = match config.sparsify() {
        Some(threshold) => {
            let sparse = sparsify_coefficients(&coeffs, threshold);
            let zeroed = coeffs.iter().zip(sparse.iter()).filter(|(a, b)| a != b).count();
            log::debug!("Sparsification at {threshold:e} zeroed {zeroed} coefficients");
            sparse
        }
        None => coeffs,
    };
    let residual = &matrix * &coeffs - rhs;
    let error = residual.norm() / (rhs.len() as f64).sqrt();

    Ok(PolynomialApproximant {
        degree,
        basis: config.basis(),
        support,
        coeffs,
        precision: config.precision(),
        error,
        condition_number,
        center: config.center().to_vec(),
        scale: config.radius().to_vec(),
    })
}

/// Minimum-norm least-squares solution through the SVD, and the condition number.
fn least_squares(
    matrix: &DMatrix<f64>,
    rhs: &DVector<f64>,
) -> Result<(DVector<f64>, f64), CritcoolError> {
    let svd = SVD::new(matrix.clone(), true, true);
    let sigma_max = svd.singular_values.max();
    let sigma_min = svd.singular_values.min();
    let condition_number = if sigma_min > 0.0 {
        sigma_max / sigma_min
    } else {
        f64::INFINITY
    };

    let cutoff = f64::EPSILON * sigma_max * matrix.nrows().max(matrix.ncols()) as f64;
    let coeffs = svd
        .solve(rhs, cutoff)
        .map_err(|message| CritcoolError::AlgorithmError {
            message: message.to_string(),
        })?;
    if coeffs.iter().any(|c| !c.is_finite()) {
        return Err(CritcoolError::AlgorithmError {
            message: "least-squares solution is not finite".into(),
        });
    }
    Ok((coeffs, condition_number))
}
