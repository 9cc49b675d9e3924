use serde::{Deserialize, Serialize};

use crate::{Basis, BasisKind, CritcoolError, Numeric, gridex_excl, invalid_config};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GridStructure {
    /// Every dimension uses the same node set.
    Isotropic,
    /// Node sets differ between dimensions.
    Anisotropic,
}

/// Tensor-product sample grid on the normalized cube `[-1, 1]^n`.
///
/// Points are ordered lexicographically by per-dimension node index, the last
/// dimension varying fastest. The coordinate type is preserved by every computation
/// built on the grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid<T: Numeric = f64> {
    axes: Vec<Vec<T>>,
    structure: GridStructure,
    points: Vec<T>,
}

impl Grid<f64> {
    /// Build the grid of `basis`'s node family with `counts[d]` nodes along dimension `d`.
    pub fn build(counts: &[usize], basis: BasisKind) -> Result<Self, CritcoolError> {
        if counts.is_empty() {
            return Err(invalid_config("grid needs at least one dimension"));
        }
        if let Some(bad) = counts.iter().find(|&&n| n < 1) {
            return Err(invalid_config(format!("node count {bad} is below 1")));
        }
        let axes = counts.iter().map(|&n| basis.nodes(n)).collect();
        Grid::from_axes(axes)
    }
}

impl<T: Numeric> Grid<T> {
    /// Tensor-product grid from explicit per-dimension node sets.
    ///
    /// The grid is isotropic exactly when all node sets are identical.
    pub fn from_axes(axes: Vec<Vec<T>>) -> Result<Self, CritcoolError> {
        if axes.is_empty() {
            return Err(invalid_config("grid needs at least one dimension"));
        }
        for axis in &axes {
            if axis.is_empty() {
                return Err(invalid_config("node count 0 is below 1"));
            }
            if axis.iter().any(|x| !(x.to_f64().abs() <= 1.0)) {
                return Err(invalid_config("grid nodes must lie in [-1, 1]"));
            }
        }

        let structure = if axes.iter().all(|axis| axis == &axes[0]) {
            GridStructure::Isotropic
        } else {
            GridStructure::Anisotropic
        };

        let counts: Vec<usize> = axes.iter().map(Vec::len).collect();
        let mut points = Vec::with_capacity(counts.iter().product::<usize>() * axes.len());
        for index in gridex_excl(&counts) {
            for (d, &i) in index.iter().enumerate() {
                points.push(axes[d][i].clone());
            }
        }

        Ok(Self {
            axes,
            structure,
            points,
        })
    }

    pub fn dim(&self) -> usize {
        self.axes.len()
    }

    pub fn len(&self) -> usize {
        self.points.len() / self.dim()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn structure(&self) -> GridStructure {
        self.structure
    }

    /// Distinct node set of dimension `d`.
    pub fn axis(&self, d: usize) -> &[T] {
        &self.axes[d]
    }

    pub fn point(&self, i: usize) -> &[T] {
        let dim = self.dim();
        &self.points[i * dim..(i + 1) * dim]
    }

    pub fn points(&self) -> impl Iterator<Item = &[T]> {
        self.points.chunks(self.dim())
    }

    /// Node index of point `i` along every dimension.
    pub fn node_index(&self, i: usize) -> Vec<usize> {
        let mut index = vec![0usize; self.dim()];
        let mut remainder = i;
        for d in (0..self.dim()).rev() {
            let count = self.axes[d].len();
            index[d] = remainder % count;
            remainder /= count;
        }
        index
    }

    /// The same grid in another numeric type.
    pub fn convert<U: Numeric>(&self, f: impl Fn(&T) -> U) -> Grid<U> {
        Grid {
            axes: self
                .axes
                .iter()
                .map(|axis| axis.iter().map(&f).collect())
                .collect(),
            structure: self.structure,
            points: self.points.iter().map(&f).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use assertables::{assert_err, assert_ok};
    use num_rational::BigRational;
    use pretty_assertions as pa;

    use super::*;

    #[test]
    fn isotropic_grid() {
        let grid = assert_ok!(Grid::build(&[4, 4, 4], BasisKind::Chebyshev));
        pa::assert_eq!(grid.structure(), GridStructure::Isotropic);
        pa::assert_eq!(grid.len(), 64);
        pa::assert_eq!(grid.dim(), 3);
        assert!(grid.points().flatten().all(|x| x.abs() <= 1.0));
    }

    #[test]
    fn anisotropic_grid() {
        let grid = assert_ok!(Grid::build(&[3, 5], BasisKind::Legendre));
        pa::assert_eq!(grid.structure(), GridStructure::Anisotropic);
        pa::assert_eq!(grid.len(), 15);
        pa::assert_eq!(grid.axis(0).len(), 3);
        pa::assert_eq!(grid.axis(1).len(), 5);
    }

    #[test]
    fn single_node_collapses() {
        let grid = assert_ok!(Grid::build(&[1, 1], BasisKind::Uniform));
        pa::assert_eq!(grid.len(), 1);
        pa::assert_eq!(grid.point(0), &[0.0, 0.0]);
        pa::assert_eq!(grid.structure(), GridStructure::Isotropic);
    }

    #[test]
    fn rejects_empty_dimension() {
        assert_err!(Grid::build(&[3, 0], BasisKind::Chebyshev));
        assert_err!(Grid::build(&[], BasisKind::Chebyshev));
        assert_err!(Grid::from_axes(vec![vec![0.0, 1.5]]));
    }

    #[test]
    fn point_order_and_node_index() {
        let grid = assert_ok!(Grid::build(&[2, 3], BasisKind::Uniform));
        pa::assert_eq!(grid.point(0), &[-1.0, -1.0]);
        pa::assert_eq!(grid.point(1), &[-1.0, 0.0]);
        pa::assert_eq!(grid.point(3), &[1.0, -1.0]);
        for i in 0..grid.len() {
            let index = grid.node_index(i);
            pa::assert_eq!(grid.point(i)[0], grid.axis(0)[index[0]]);
            pa::assert_eq!(grid.point(i)[1], grid.axis(1)[index[1]]);
        }
    }

    #[test]
    fn conversion_keeps_structure() {
        let grid = assert_ok!(Grid::build(&[3, 3], BasisKind::Uniform));
        let exact: Grid<BigRational> = grid.convert(|x| <BigRational as Numeric>::from_f64(*x));
        pa::assert_eq!(exact.structure(), GridStructure::Isotropic);
        pa::assert_eq!(exact.len(), 9);
        pa::assert_eq!(exact.point(8)[1].to_f64(), 1.0);
    }
}
