use rayon::prelude::*;

use crate::{CritcoolError, DomainConfig, Grid};

/// The objective declined to produce a value at a point.
#[derive(Debug, Clone, PartialEq)]
pub struct Undefined(pub String);

/// A pure real-valued function of `n` variables.
///
/// Points where the function has no value must be reported through
/// [`Objective::value`] returning `Err`, never through NaN. Any plain
/// `Fn(&[f64]) -> f64` closure is an objective.
pub trait Objective: Sync {
    fn value(&self, x: &[f64]) -> Result<f64, Undefined>;
}

impl<F> Objective for F
where
    F: Fn(&[f64]) -> f64 + Sync,
{
    fn value(&self, x: &[f64]) -> Result<f64, Undefined> {
        Ok(self(x))
    }
}

/// Evaluate `objective` at `x`, turning failures and non-finite values into
/// [`CritcoolError::ObjectiveEvaluation`] tagged with the point.
pub fn evaluate_at(objective: &dyn Objective, x: &[f64]) -> Result<f64, CritcoolError> {
    match objective.value(x) {
        Ok(v) if v.is_finite() => Ok(v),
        Ok(v) => Err(CritcoolError::ObjectiveEvaluation {
            point: x.to_vec(),
            message: format!("non-finite value {v}"),
        }),
        Err(Undefined(message)) => Err(CritcoolError::ObjectiveEvaluation {
            point: x.to_vec(),
            message,
        }),
    }
}

/// Central difference gradient, the step in dimension `i` being
/// `step * max(1, |x_i|)`.
pub fn finite_difference_gradient(
    objective: &dyn Objective,
    x: &[f64],
    step: f64,
) -> Result<Vec<f64>, CritcoolError> {
    let mut shifted = x.to_vec();
    (0..x.len())
        .map(|i| {
            let h = step * x[i].abs().max(1.0);
            shifted[i] = x[i] + h;
            let plus = evaluate_at(objective, &shifted)?;
            shifted[i] = x[i] - h;
            let minus = evaluate_at(objective, &shifted)?;
            shifted[i] = x[i];
            Ok((plus - minus) / (2.0 * h))
        })
        .collect()
}

pub(crate) fn norm(v: &[f64]) -> f64 {
    v.iter().map(|g| g * g).sum::<f64>().sqrt()
}

/// Objective values at every grid point, mapped into the sampled box.
///
/// Evaluation runs in parallel. The first failure aborts the whole batch.
pub fn evaluate_samples(
    config: &DomainConfig,
    grid: &Grid,
    objective: &dyn Objective,
) -> Result<Vec<f64>, CritcoolError> {
    let values = (0..grid.len())
        .into_par_iter()
        .map(|i| evaluate_at(objective, &config.to_actual(grid.point(i))))
        .collect::<Result<Vec<_>, _>>()?;
    log::debug!("Evaluated objective at {} grid points", values.len());
    Ok(values)
}
