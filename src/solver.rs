//! The polynomial system solver contract and a built-in subdivision solver.
//!
//! A solver receives the gradient system of the expanded approximant, expressed in
//! normalized coordinates, and returns its solution set. The pipeline only relies on
//! [`CriticalPointSolver`], so an external root finder (homotopy continuation or
//! otherwise) can be plugged in as long as it reports complex solutions.

use std::time::{Duration, Instant};

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::{BezierSurface, BoundingBox, CritcoolError, MultivarPoly, SolverSettings};

mod projected_polyhedra;

/// Round-off allowance, in units of `ε · max|c| · (degree + 1)`, under which a control
/// coefficient counts as zero.
const ROUND_OFF_ULPS: f64 = 16.0;

use projected_polyhedra::ProjectedPolyhedraRefiner;

/// The `n` polynomial equations `∂p/∂x_i = 0` in `n` variables.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientSystem {
    dim: usize,
    equations: Vec<MultivarPoly>,
}

impl GradientSystem {
    pub fn new(dim: usize, equations: Vec<MultivarPoly>) -> Result<Self, CritcoolError> {
        if let Some(bad) = equations.iter().find(|eq| eq.dim() != dim) {
            return Err(CritcoolError::AlgorithmError {
                message: format!("equation in {} variables for a {dim}-variable system", bad.dim()),
            });
        }
        Ok(Self { dim, equations })
    }

    pub fn from_polynomial(poly: &MultivarPoly) -> Self {
        Self {
            dim: poly.dim(),
            equations: poly.gradient(),
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn equations(&self) -> &[MultivarPoly] {
        &self.equations
    }

    /// Value of every equation at `x`.
    pub fn eval(&self, x: &[f64]) -> Vec<f64> {
        self.equations.iter().map(|eq| eq.eval(x)).collect()
    }
}

/// One solution of a polynomial system, in normalized coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    pub coords: Vec<Complex64>,
}

impl Solution {
    pub fn real(coords: &[f64]) -> Self {
        Self {
            coords: coords.iter().map(|&x| Complex64::new(x, 0.0)).collect(),
        }
    }

    /// Whether every imaginary part is within `tolerance` relative to its real part.
    pub fn is_real(&self, tolerance: f64) -> bool {
        self.coords
            .iter()
            .all(|z| z.im.abs() <= tolerance * z.re.abs().max(1.0))
    }

    pub fn real_part(&self) -> Vec<f64> {
        self.coords.iter().map(|z| z.re).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SolveOutcome {
    Solved(Vec<Solution>),

    /// The solver ran out of time. Partial results are not trusted.
    TimedOut { elapsed: Duration },
}

pub trait CriticalPointSolver: Sync {
    /// All distinct solutions of `system`. Non-convergence and singular systems are
    /// reported as [`CritcoolError::SolverFailure`].
    fn solve(&self, system: &GradientSystem) -> Result<SolveOutcome, CritcoolError>;
}

/// Finds the real roots in `[-1, 1]^n` by Bernstein subdivision, pruning regions with
/// the projected polyhedra of each equation's control points.
///
/// Every solution it reports is real; it never sees roots outside the normalized cube,
/// which the post-processing would discard anyway.
#[derive(Debug, Clone, Default)]
pub struct SubdivisionSolver {
    settings: SolverSettings,
}

impl SubdivisionSolver {
    pub fn new(settings: SolverSettings) -> Self {
        Self { settings }
    }
}

impl CriticalPointSolver for SubdivisionSolver {
    fn solve(&self, system: &GradientSystem) -> Result<SolveOutcome, CritcoolError> {
        let dim = system.dim();
        // Check that we have at least as many equations as variables
        if system.equations().len() < dim {
            return Err(CritcoolError::UnderdefinedSystem {
                num_vars: dim,
                num_equations: system.equations().len(),
            });
        }
        if system.equations().iter().any(MultivarPoly::is_empty) {
            return Err(CritcoolError::SolverFailure {
                message: "singular system: an equation vanishes identically".into(),
            });
        }

        let domain = BoundingBox::symmetric(dim);
        let surfaces = system
            .equations()
            .iter()
            .map(|eq| eq.bezier_surface(&domain))
            .collect::<Result<Vec<_>, _>>()?;

        let zero_tols: Vec<f64> = surfaces.iter().map(zero_tolerance).collect();

        let start = Instant::now();
        let tol = self.settings.tolerance;
        // Clipped sides never collapse below this width, so the next subsection
        // still has a sign change to work with.
        let pad = 0.25 * tol;
        let mut refiner = ProjectedPolyhedraRefiner::new(dim);
        let mut region_queue = vec![domain];
        let mut root_regions: SmallVec<[BoundingBox; 4]> = SmallVec::new();
        // Re-use the surfaces vector to avoid reallocations
        let mut sub_surfaces = surfaces.clone();

        let mut iteration = 0;
        while let Some(mut region) = region_queue.pop() {
            iteration += 1;
            if iteration > self.settings.max_iterations {
                return Err(CritcoolError::SolverFailure {
                    message: format!(
                        "no convergence after {} subdivisions, {} regions pending",
                        self.settings.max_iterations,
                        region_queue.len() + 1
                    ),
                });
            }
            if let Some(timeout) = self.settings.timeout {
                let elapsed = start.elapsed();
                if elapsed >= timeout {
                    log::warn!("Subdivision solver timed out after {iteration} iterations");
                    return Ok(SolveOutcome::TimedOut { elapsed });
                }
            }

            for (sub, surface) in sub_surfaces.iter_mut().zip(&surfaces) {
                *sub = surface.clone().subsection(&region);
            }
            if sub_surfaces
                .iter()
                .zip(&zero_tols)
                .any(|(surface, &zero_tol)| excludes_zero(surface, zero_tol))
            {
                continue;
            }

            let before = region.clone();
            let (_, size_before) = before.largest_side();
            refiner.refine_region(&sub_surfaces, &zero_tols, pad, &mut region);
            log::debug!("It {iteration}: refined region {:?}", region);

            // If the refined region is invalid, it holds no roots
            if !region.is_valid() {
                continue;
            }
            region.widen_within(2.0 * pad, &before);

            // If the largest side is sufficiently small, stop
            let (largest_d, largest_size) = region.largest_side();
            if largest_size < tol {
                root_regions.push(region);
                continue;
            }

            if largest_size < 0.8 * size_before {
                // Still converging, clip again before splitting.
                region_queue.push(region);
                continue;
            }

            // Subdivide along the largest dimension at the midpoint
            let (lower, upper) = region.subdivide(largest_d);
            region_queue.push(lower);
            region_queue.push(upper);
        }

        merge_nearby_regions(&mut root_regions, tol);
        log::info!(
            "Subdivision solver found {} roots in {iteration} iterations",
            root_regions.len()
        );

        let solutions = root_regions
            .iter()
            .map(|region| Solution::real(&region.center()))
            .collect();
        Ok(SolveOutcome::Solved(solutions))
    }
}

/// True when the surface's control points, and so the surface, are on one side of
/// zero by more than `zero_tol`.
fn excludes_zero(surface: &BezierSurface, zero_tol: f64) -> bool {
    let (lo, hi) = surface.coeff_range();
    lo > zero_tol || hi < -zero_tol
}

/// Magnitude below which a control coefficient of any subsection of `surface` is
/// indistinguishable from zero.
fn zero_tolerance(surface: &BezierSurface) -> f64 {
    let (lo, hi) = surface.coeff_range();
    let degree: usize = surface.grid_size.iter().map(|s| s - 1).sum();
    ROUND_OFF_ULPS * f64::EPSILON * lo.abs().max(hi.abs()) * (degree + 1) as f64
}

/// Merge regions closer than `slack` in-place into their union.
///
/// One root may be reported by several neighbouring regions that only touch, or
/// miss each other by round-off. There is no guarantee on the order of the result.
fn merge_nearby_regions(regions: &mut SmallVec<[BoundingBox; 4]>, slack: f64) {
    let mut i = 0;
    while i + 1 < regions.len() {
        let mut merged_any = false;
        let mut j = i + 1;
        while j < regions.len() {
            if regions[i].overlaps_within(&regions[j], slack) {
                let other = regions.swap_remove(j);
                regions[i].union(&other);
                merged_any = true;
            } else {
                j += 1;
            }
        }
        // A grown region may now reach regions it was compared with before.
        if !merged_any {
            i += 1;
        }
    }
}
