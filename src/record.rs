use std::fmt;

use fmtastic::Subscript;
use serde::{Deserialize, Serialize};

/// Type of a critical point, read off the Hessian eigenvalues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Classification {
    Minimum,
    Maximum,
    Saddle,
    /// An eigenvalue within the zero tolerance, or a non-finite Hessian.
    Degenerate,
    /// The objective failed while the Hessian was being evaluated.
    Error,
}

/// Scalars derived from the Hessian at a critical point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HessianSummary {
    /// Ascending.
    pub eigenvalues: Vec<f64>,
    pub determinant: f64,
    pub trace: f64,
    pub min_eigenvalue: f64,
    pub max_eigenvalue: f64,
    /// `max |λ| / min |λ|`, infinite for a singular Hessian.
    pub condition_number: f64,
}

/// One critical point, in the coordinates of the original domain.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticalPointRecord {
    pub coords: Vec<f64>,
    /// True objective value at `coords`.
    pub value: f64,
    /// Norm of the finite difference gradient of the true objective at `coords`.
    pub gradient_norm: f64,
    /// Set when the local minimizer converged and moved `coords`. A point whose
    /// refinement ran out of budget keeps its unrefined coordinates and stays unset.
    pub refined: bool,
    /// The local minimizer started here ended within the capture radius, at a point
    /// whose Hessian is positive definite.
    pub captured: bool,
    pub classification: Option<Classification>,
    pub hessian: Option<HessianSummary>,
}

impl CriticalPointRecord {
    pub fn new(coords: Vec<f64>, value: f64, gradient_norm: f64) -> Self {
        Self {
            coords,
            value,
            gradient_norm,
            refined: false,
            captured: false,
            classification: None,
            hessian: None,
        }
    }

    pub fn dim(&self) -> usize {
        self.coords.len()
    }

    pub fn is_minimum(&self) -> bool {
        self.classification == Some(Classification::Minimum)
    }
}

impl fmt::Debug for CriticalPointRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, x) in self.coords.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "x{}={x:.6}", Subscript(i))?;
        }
        write!(f, ") f={:.6e} |∇f|={:.1e}", self.value, self.gradient_norm)?;
        if let Some(class) = self.classification {
            write!(f, " {class:?}")?;
        }
        if self.captured {
            write!(f, " captured")?;
        }
        Ok(())
    }
}
