use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::{Basis, BasisKind, CritcoolError, Grid, GridStructure, Numeric, SupportSet, invalid_config};

/// How the design matrix is assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VandermondeAlgorithm {
    /// Tabulate the basis once on the shared node set and assemble every entry by
    /// indexing that table with the point's node indices. Requires an isotropic grid.
    Isotropic,

    /// Evaluate each dimension's basis directly at each point's own coordinate.
    Anisotropic,
}

impl VandermondeAlgorithm {
    pub fn for_grid<T: Numeric>(grid: &Grid<T>) -> Self {
        match grid.structure() {
            GridStructure::Isotropic => VandermondeAlgorithm::Isotropic,
            GridStructure::Anisotropic => VandermondeAlgorithm::Anisotropic,
        }
    }
}

/// Design matrix with entry `(i, j) = Π_d φ_{α_j[d]}(x_i[d])`, one row per grid
/// point and one column per support multi-index. The algorithm follows the grid's
/// structure.
pub fn vandermonde<T: Numeric>(
    grid: &Grid<T>,
    support: &SupportSet,
    basis: BasisKind,
) -> Result<DMatrix<T>, CritcoolError> {
    vandermonde_with(grid, support, basis, VandermondeAlgorithm::for_grid(grid))
}

/// [`vandermonde`] with an explicit algorithm.
pub fn vandermonde_with<T: Numeric>(
    grid: &Grid<T>,
    support: &SupportSet,
    basis: BasisKind,
    algorithm: VandermondeAlgorithm,
) -> Result<DMatrix<T>, CritcoolError> {
    if support.dim() != grid.dim() {
        return Err(invalid_config(format!(
            "support set of dimension {} for a grid of dimension {}",
            support.dim(),
            grid.dim()
        )));
    }

    log::debug!(
        "Vandermonde {:?}: {} points x {} basis functions",
        algorithm,
        grid.len(),
        support.len()
    );

    match algorithm {
        VandermondeAlgorithm::Isotropic => {
            if grid.structure() != GridStructure::Isotropic {
                return Err(invalid_config(
                    "isotropic Vandermonde assembly needs an isotropic grid",
                ));
            }
            Ok(isotropic(grid, support, basis))
        }
        VandermondeAlgorithm::Anisotropic => Ok(anisotropic(grid, support, basis)),
    }
}

fn isotropic<T: Numeric>(grid: &Grid<T>, support: &SupportSet, basis: BasisKind) -> DMatrix<T> {
    let max_degree = support.max_degrees().into_iter().max().unwrap_or(0);
    // table[k][m] = φ_m(node_k), shared by every dimension.
    let table: Vec<Vec<T>> = grid
        .axis(0)
        .iter()
        .map(|node| basis.values(max_degree, node))
        .collect();
    let node_indices: Vec<Vec<usize>> = (0..grid.len()).map(|i| grid.node_index(i)).collect();

    DMatrix::from_fn(grid.len(), support.len(), |i, j| {
        let alpha = support.get(j);
        let mut entry = T::one();
        for (&k, &m) in node_indices[i].iter().zip(alpha) {
            entry = entry * table[k][m as usize].clone();
        }
        entry
    })
}

fn anisotropic<T: Numeric>(grid: &Grid<T>, support: &SupportSet, basis: BasisKind) -> DMatrix<T> {
    let max_degrees = support.max_degrees();
    // values[i][d][m] = φ_m(x_i[d])
    let values: Vec<Vec<Vec<T>>> = grid
        .points()
        .map(|point| {
            point
                .iter()
                .zip(&max_degrees)
                .map(|(x, &degree)| basis.values(degree, x))
                .collect()
        })
        .collect();

    DMatrix::from_fn(grid.len(), support.len(), |i, j| {
        let alpha = support.get(j);
        let mut entry = T::one();
        for (per_dim, &m) in values[i].iter().zip(alpha) {
            entry = entry * per_dim[m as usize].clone();
        }
        entry
    })
}
