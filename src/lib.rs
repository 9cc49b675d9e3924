//! Locate and classify the critical points of a black-box function.
//!
//! The function is sampled on a tensor-product grid, approximated by a least-squares
//! polynomial in a Chebyshev, Legendre or monomial basis, expanded into monomial form
//! with elevated-precision arithmetic, and the resulting gradient system is handed to a
//! polynomial system solver. Real solutions inside the sampled box are mapped back to
//! the original domain, refined against the true objective, de-duplicated and
//! classified from the eigenvalues of the Hessian.
//!
//! ```rust
//! use critcool::{BasisKind, DegreeSpec, DomainConfig, Pipeline};
//!
//! let config = DomainConfig::builder(2)
//!     .center(vec![0.0, 0.0])
//!     .radius(1.2)
//!     .nodes(12)
//!     .degree(DegreeSpec::Fixed(4))
//!     .basis(BasisKind::Chebyshev)
//!     .build()
//!     .unwrap();
//!
//! let sphere = |x: &[f64]| x.iter().map(|v| v * v).sum::<f64>();
//! let output = Pipeline::new(&config).run(&sphere).unwrap();
//!
//! assert_eq!(output.minimizers.len(), 1);
//! assert!(output.minimizers[0].coords.iter().all(|c| c.abs() < 1e-6));
//! ```

mod approximant;
mod basis;
mod bezier_surface;
mod binomial;
mod bounding_box;
mod classify;
mod config;
mod evaluator;
mod expansion;
mod grid;
mod gridex;
mod monomial;
mod multivar_poly;
mod numeric;
mod pipeline;
mod postprocess;
mod precision;
mod record;
mod refine;
mod solver;
mod support;
pub mod test_functions;
mod vandermonde;

#[cfg(test)]
mod test_utils;

pub use approximant::*;
pub use basis::*;
pub use bezier_surface::*;
pub use binomial::*;
pub use bounding_box::BoundingBox;
pub use classify::*;
pub use config::*;
pub use evaluator::*;
pub use expansion::*;
pub use grid::*;
pub use gridex::*;
pub use monomial::{Exponents, Monomial};
pub use multivar_poly::*;
pub use numeric::Numeric;
pub use pipeline::*;
pub use postprocess::*;
pub use precision::*;
pub use record::*;
pub use refine::*;
pub use solver::*;
pub use support::*;
pub use vandermonde::*;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use snafu::prelude::*;

#[derive(Debug, Snafu)]
pub enum CritcoolError {
    #[snafu(display("Invalid configuration: {}", message))]
    InvalidConfiguration { message: String },

    #[snafu(display("Objective evaluation failed at {:?}: {}", point, message))]
    ObjectiveEvaluation { point: Vec<f64>, message: String },

    #[snafu(display("Polynomial system solver failed: {}", message))]
    SolverFailure { message: String },

    #[snafu(display(
        "Underdefined system: {} variables but only {} equations",
        num_vars,
        num_equations
    ))]
    UnderdefinedSystem {
        num_vars: usize,
        num_equations: usize,
    },

    #[snafu(display("Algorithm error (bug in library): {}", message))]
    AlgorithmError { message: String },
}

/// Numerical-quality issues that do not stop a pipeline instance.
///
/// These travel alongside otherwise usable results so that callers can decide
/// whether to retry at a higher degree or precision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Warning {
    /// The Vandermonde condition number exceeded the configured alarm threshold.
    IllConditionedSystem {
        condition_number: f64,
        threshold: f64,
    },

    /// Adaptive degree selection reached its ceiling, or the largest degree the grid
    /// determines, before meeting the tolerance. `degree` is that of the returned fit.
    ToleranceNotReached {
        degree: usize,
        error: f64,
        tolerance: f64,
    },

    /// The polynomial system solver ran out of time; no solutions were kept.
    SolverTimeout { elapsed: Duration },

    /// Local refinement of the candidate at `index` ran out of budget.
    RefinementTimeout { index: usize },

    /// The Hessian at the point `index` was indeterminate, non-finite or failed.
    DegenerateClassification { index: usize },
}

impl Warning {
    pub(crate) fn emit(self, warnings: &mut Vec<Warning>) {
        log::warn!("{:?}", self);
        warnings.push(self);
    }
}

pub(crate) fn invalid_config(message: impl Into<String>) -> CritcoolError {
    CritcoolError::InvalidConfiguration {
        message: message.into(),
    }
}
