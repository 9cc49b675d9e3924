//! Local refinement of candidate points on the true objective.
use std::time::Instant;

use nalgebra::{Cholesky, DMatrix, DVector};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    CritcoolError, CriticalPointRecord, DomainConfig, Objective, RefineSettings, Warning,
    evaluate_at, evaluator::norm, finite_difference_gradient, hessian,
};

/// Armijo sufficient decrease constant.
const ARMIJO_C1: f64 = 1e-4;
const MAX_BACKTRACKS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefineStatus {
    /// Gradient norm fell below the tolerance.
    Converged,
    MaxIterations,
    /// The time budget ran out; the result is the last accepted iterate.
    TimedOut,
    /// An accepted step left the admissible region.
    LeftDomain,
    /// The line search found no decrease.
    Stalled,
}

/// Outcome of one local minimization.
#[derive(Debug, Clone, PartialEq)]
pub struct MinimizeResult {
    pub x: Vec<f64>,
    pub fx: f64,
    pub grad_norm: f64,
    pub iterations: usize,
    pub status: RefineStatus,
}

/// BFGS with finite difference gradients and a backtracking Armijo line search.
///
/// Points where the objective is undefined are treated as infinitely high during the
/// line search. The minimization stops as soon as an accepted iterate fails `inside`.
pub fn minimize_bfgs(
    objective: &dyn Objective,
    start: &[f64],
    settings: &RefineSettings,
    inside: &(dyn Fn(&[f64]) -> bool + Sync),
) -> Result<MinimizeResult, CritcoolError> {
    let n = start.len();
    let started = Instant::now();

    let mut x = DVector::from_column_slice(start);
    let mut fx = evaluate_at(objective, start)?;
    let mut g = DVector::from_vec(finite_difference_gradient(objective, start, settings.step)?);
    let mut inv_hessian = DMatrix::<f64>::identity(n, n);

    let result = |x: &DVector<f64>, fx, g: &DVector<f64>, iterations, status| MinimizeResult {
        x: x.as_slice().to_vec(),
        fx,
        grad_norm: g.norm(),
        iterations,
        status,
    };

    for iteration in 0..settings.max_iterations {
        if g.norm() < settings.gradient_tolerance {
            return Ok(result(&x, fx, &g, iteration, RefineStatus::Converged));
        }
        if let Some(budget) = settings.time_budget {
            if started.elapsed() >= budget {
                return Ok(result(&x, fx, &g, iteration, RefineStatus::TimedOut));
            }
        }

        let mut direction = -(&inv_hessian * &g);
        let mut slope = direction.dot(&g);
        if !(slope < 0.0) {
            // Lost positive definiteness, fall back to steepest descent.
            inv_hessian.fill_with_identity();
            direction = -g.clone();
            slope = direction.dot(&g);
        }

        let Some((x_new, f_new)) = line_search(objective, &x, fx, &direction, slope) else {
            return Ok(result(&x, fx, &g, iteration, RefineStatus::Stalled));
        };
        if !inside(x_new.as_slice()) {
            return Ok(result(&x_new, f_new, &g, iteration + 1, RefineStatus::LeftDomain));
        }
        let Ok(g_new) = finite_difference_gradient(objective, x_new.as_slice(), settings.step)
        else {
            return Ok(result(&x_new, f_new, &g, iteration + 1, RefineStatus::Stalled));
        };
        let g_new = DVector::from_vec(g_new);

        let s = &x_new - &x;
        let y = &g_new - &g;
        let sy = s.dot(&y);
        // Skip updates that would break positive definiteness.
        if sy > 1e-12 * s.norm() * y.norm() {
            let rho = 1.0 / sy;
            let identity = DMatrix::<f64>::identity(n, n);
            let left = &identity - rho * &s * y.transpose();
            let right = &identity - rho * &y * s.transpose();
            inv_hessian = left * &inv_hessian * right + rho * &s * s.transpose();
        }

        x = x_new;
        fx = f_new;
        g = g_new;
    }

    let status = if g.norm() < settings.gradient_tolerance {
        RefineStatus::Converged
    } else {
        RefineStatus::MaxIterations
    };
    Ok(result(&x, fx, &g, settings.max_iterations, status))
}

fn line_search(
    objective: &dyn Objective,
    x: &DVector<f64>,
    fx: f64,
    direction: &DVector<f64>,
    slope: f64,
) -> Option<(DVector<f64>, f64)> {
    let mut alpha = 1.0;
    for _ in 0..MAX_BACKTRACKS {
        let candidate = x + alpha * direction;
        if let Ok(f) = evaluate_at(objective, candidate.as_slice()) {
            if f <= fx + ARMIJO_C1 * alpha * slope {
                return Some((candidate, f));
            }
        }
        alpha *= 0.5;
    }
    None
}

/// Whether the finite difference Hessian at `x` is positive definite.
///
/// A minimizer converges on the spot at any critical point, so convergence alone does
/// not tell a minimum from a saddle or a maximum.
pub fn confirms_minimum(objective: &dyn Objective, x: &[f64], step: f64) -> bool {
    match hessian(objective, x, step) {
        Ok(hess) => hess.iter().all(|v| v.is_finite()) && Cholesky::new(hess).is_some(),
        Err(_) => false,
    }
}

/// Run the local minimizer from every candidate in parallel.
///
/// A candidate whose minimizer converges within the capture radius takes the
/// minimizer's coordinates and is marked refined. It is also captured when the
/// Hessian there, with the classification step, is positive definite. A timed out
/// candidate keeps its coordinates, stays unrefined, and raises
/// [`Warning::RefinementTimeout`]. Every other candidate is kept as it was.
pub fn refine_candidates(
    config: &DomainConfig,
    objective: &dyn Objective,
    candidates: Vec<CriticalPointRecord>,
    warnings: &mut Vec<Warning>,
) -> Result<Vec<CriticalPointRecord>, CritcoolError> {
    let settings = config.refine();
    let hessian_step = config.classify().step;
    let inside = |x: &[f64]| config.contains(x);

    let outcomes = candidates
        .into_par_iter()
        .map(|mut record| {
            let minimized = minimize_bfgs(objective, &record.coords, settings, &inside)?;
            log::debug!(
                "Refined {:?} -> {:?} ({:?} after {} iterations)",
                record.coords,
                minimized.x,
                minimized.status,
                minimized.iterations
            );
            let moved = distance(&record.coords, &minimized.x);
            if minimized.status == RefineStatus::Converged && moved <= settings.capture_radius {
                record.coords = minimized.x;
                record.value = minimized.fx;
                record.gradient_norm = minimized.grad_norm;
                record.refined = true;
                record.captured = confirms_minimum(objective, &record.coords, hessian_step);
            }
            Ok((record, minimized.status))
        })
        .collect::<Result<Vec<_>, CritcoolError>>()?;

    let mut refined = Vec::with_capacity(outcomes.len());
    for (index, (record, status)) in outcomes.into_iter().enumerate() {
        if status == RefineStatus::TimedOut {
            Warning::RefinementTimeout { index }.emit(warnings);
        }
        refined.push(record);
    }
    log::info!(
        "Refinement captured {} of {} candidates",
        refined.iter().filter(|r| r.captured).count(),
        refined.len()
    );
    Ok(refined)
}

/// Merge points closer than `tolerance`, keeping the one with the lowest objective
/// value. The result is sorted by value.
pub fn deduplicate(mut records: Vec<CriticalPointRecord>, tolerance: f64) -> Vec<CriticalPointRecord> {
    records.sort_by(|a, b| a.value.total_cmp(&b.value));
    let mut kept: Vec<CriticalPointRecord> = Vec::with_capacity(records.len());
    for record in records {
        if kept
            .iter()
            .all(|k| distance(&k.coords, &record.coords) > tolerance)
        {
            kept.push(record);
        }
    }
    kept
}

fn distance(a: &[f64], b: &[f64]) -> f64 {
    let diff: Vec<f64> = a.iter().zip(b).map(|(x, y)| x - y).collect();
    norm(&diff)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use assertables::{assert_lt, assert_ok};
    use pretty_assertions as pa;

    use super::*;
    use crate::test_functions::{double_well_2d, saddle_2d};

    fn anywhere(_: &[f64]) -> bool {
        true
    }

    #[test]
    fn bfgs_quadratic() {
        let f = |x: &[f64]| (x[0] - 1.0).powi(2) + 10.0 * (x[1] + 0.5).powi(2);
        let result = assert_ok!(minimize_bfgs(
            &f,
            &[0.0, 0.0],
            &RefineSettings::default(),
            &anywhere
        ));
        pa::assert_eq!(result.status, RefineStatus::Converged);
        assert_lt!(distance(&result.x, &[1.0, -0.5]), 1e-6);
        assert_lt!(result.fx, 1e-10);
    }

    #[test]
    fn bfgs_rosenbrock() {
        let rosenbrock = |x: &[f64]| (1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0] * x[0]).powi(2);
        let settings = RefineSettings {
            gradient_tolerance: 1e-6,
            max_iterations: 1000,
            ..RefineSettings::default()
        };
        let result = assert_ok!(minimize_bfgs(&rosenbrock, &[-1.2, 1.0], &settings, &anywhere));
        pa::assert_eq!(result.status, RefineStatus::Converged);
        assert_lt!(distance(&result.x, &[1.0, 1.0]), 1e-3);
    }

    #[test]
    fn runaway_leaves_domain() {
        let inside = |x: &[f64]| x.iter().all(|v| v.abs() <= 1.0);
        let result = assert_ok!(minimize_bfgs(
            &saddle_2d,
            &[0.0, 0.1],
            &RefineSettings::default(),
            &inside
        ));
        pa::assert_eq!(result.status, RefineStatus::LeftDomain);
    }

    #[test]
    fn zero_budget_times_out() {
        let settings = RefineSettings {
            time_budget: Some(Duration::ZERO),
            ..RefineSettings::default()
        };
        let result = assert_ok!(minimize_bfgs(&double_well_2d, &[0.9, 0.1], &settings, &anywhere));
        pa::assert_eq!(result.status, RefineStatus::TimedOut);
        pa::assert_eq!(result.x, vec![0.9, 0.1]);
        pa::assert_eq!(result.iterations, 0);
    }

    fn candidate(coords: Vec<f64>) -> CriticalPointRecord {
        let value = double_well_2d(&coords);
        CriticalPointRecord::new(coords, value, f64::NAN)
    }

    #[test]
    fn capture_near_minimum_only() {
        let config = assert_ok!(DomainConfig::builder(2).radius(1.2).build());
        let mut warnings = Vec::new();
        let refined = assert_ok!(refine_candidates(
            &config,
            &double_well_2d,
            vec![candidate(vec![1.01, -0.02]), candidate(vec![0.02, 0.0])],
            &mut warnings
        ));
        assert!(warnings.is_empty());

        assert!(refined[0].captured && refined[0].refined);
        assert_lt!(distance(&refined[0].coords, &[1.0, 0.0]), 1e-6);
        assert_lt!(refined[0].gradient_norm, 1e-8);

        // The minimizer slides from near the saddle into a well, too far to capture.
        assert!(!refined[1].captured && !refined[1].refined);
        pa::assert_eq!(refined[1].coords, vec![0.02, 0.0]);
    }

    #[test]
    fn critical_points_that_are_not_minima_are_not_captured() {
        let config = assert_ok!(DomainConfig::builder(2).build());
        let cap = |x: &[f64]| -x[0] * x[0] - 2.0 * x[1] * x[1];
        for objective in [&saddle_2d as &dyn Objective, &cap] {
            let start = CriticalPointRecord::new(vec![0.0, 0.0], 0.0, 0.0);
            let mut warnings = Vec::new();
            let refined = assert_ok!(refine_candidates(&config, objective, vec![start], &mut warnings));
            // Converged on the spot, yet not a minimum.
            assert!(refined[0].refined);
            assert!(!refined[0].captured);
        }
        assert!(confirms_minimum(&double_well_2d, &[1.0, 0.0], 1e-4));
        assert!(!confirms_minimum(&double_well_2d, &[0.0, 0.0], 1e-4));
    }

    #[test]
    fn timed_out_candidates_are_flagged() {
        let config = assert_ok!(
            DomainConfig::builder(2)
                .radius(1.2)
                .refine(RefineSettings {
                    time_budget: Some(Duration::ZERO),
                    ..RefineSettings::default()
                })
                .build()
        );
        let mut warnings = Vec::new();
        let refined = assert_ok!(refine_candidates(
            &config,
            &double_well_2d,
            vec![candidate(vec![1.01, -0.02]), candidate(vec![-0.98, 0.01])],
            &mut warnings
        ));
        assert!(refined.iter().all(|r| !r.refined));
        pa::assert_eq!(
            warnings,
            vec![
                Warning::RefinementTimeout { index: 0 },
                Warning::RefinementTimeout { index: 1 }
            ]
        );
    }

    #[test]
    fn deduplicate_keeps_lowest() {
        let records = vec![
            CriticalPointRecord::new(vec![1.0, 0.0], 0.5, 0.0),
            CriticalPointRecord::new(vec![1.0 + 1e-6, 0.0], 0.25, 0.0),
            CriticalPointRecord::new(vec![-1.0, 0.0], 0.75, 0.0),
        ];
        let kept = deduplicate(records, 1e-4);
        pa::assert_eq!(kept.len(), 2);
        pa::assert_eq!(kept[0].value, 0.25);
        pa::assert_eq!(kept[1].coords, vec![-1.0, 0.0]);
    }
}
