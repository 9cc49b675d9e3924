use std::ops::IndexMut;

use smallvec::SmallVec;

use crate::{BoundingBox, gridex_excl};

/// Tensor-product Bernstein form of a polynomial over a box.
///
/// The control coefficients form a hypergrid with `grid_size[d]` entries along
/// dimension `d` (degree + 1). By the convex hull property, the graph of the
/// polynomial over `domain` lies inside the hull of the control points.
#[derive(Clone, Debug)]
pub struct BezierSurface {
    // The coefficients/values of the control points in the Bezier hypergrid.
    pub(crate) coeffs: Vec<f64>,

    // The number of values along each dimension of the Bezier hypergrid.
    pub(crate) grid_size: SmallVec<[usize; 4]>,

    // The parameter space domain for each dimension.
    pub(crate) domain: BoundingBox,

    // The stride lengths for each dimension in the flattened coeffs array.
    // This is used to convert between flat indexes and grid indexes (gridexes).
    strides: SmallVec<[usize; 4]>,
}

impl BezierSurface {
    /// Create a new Bezier surface with the given control points and grid size.
    ///
    /// # Arguments
    /// - `coeffs`: Flattened control point coefficients, the last dimension varying
    ///    fastest. For a grid size of `[3, 4]` the grid indexes run
    ///    `[0, 0], [0, 1], [0, 2], [0, 3], [1, 0], ... [2, 3]`.
    /// - `grid_size`: Number of control points along each dimension (== degree + 1)
    /// - `domain`: Parameter space domain for each dimension.
    ///
    /// # Panics
    /// Panics if the product of the grid size does not equal `coeffs.len()`.
    pub fn new(coeffs: &[f64], grid_size: &[usize], domain: BoundingBox) -> Self {
        assert!(
            grid_size.iter().product::<usize>() == coeffs.len(),
            "Grid size mismatch with number of control points"
        );
        let mut surface = Self::zeros(grid_size, domain);
        surface.coeffs.copy_from_slice(coeffs);
        surface
    }

    pub fn zeros(grid_size: &[usize], domain: BoundingBox) -> Self {
        assert!(
            grid_size.iter().all(|&s| s >= 2),
            "Grid size must be at least 2 in each dimension"
        );
        assert_eq!(grid_size.len(), domain.dim(), "Domain dimension mismatch");

        Self {
            coeffs: vec![0.0; grid_size.iter().product()],
            grid_size: SmallVec::from_slice(grid_size),
            domain,
            strides: Self::calc_strides(grid_size),
        }
    }

    pub fn dim(&self) -> usize {
        self.grid_size.len()
    }

    pub fn domain(&self) -> &BoundingBox {
        &self.domain
    }

    pub fn set_coeff(&mut self, coord: &[usize], coeff: f64) {
        let flat_index = self.flat_index(coord);
        self.coeffs[flat_index] = coeff;
    }

    /// Smallest and largest control coefficient. The surface stays within this range.
    pub fn coeff_range(&self) -> (f64, f64) {
        self.coeffs
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &c| {
                (lo.min(c), hi.max(c))
            })
    }

    pub fn eval(&self, param_coord: &[f64]) -> f64 {
        let mut eval_coeffs = self.coeffs.clone();
        let mut sub_grid_size = self.grid_size.clone();

        for d in 0..self.dim() {
            let (min, max) = self.domain[d];
            let t = (param_coord[d] - min) / (max - min);

            // With each loop, we are reducing the dimension by 1.
            // For example, a 2D manifold evaluates to a 1D curve in the first pass.
            // Setting the current d grid_size to one skips over all the intermediate
            // points calculated in the previous iteration.
            sub_grid_size[d] = 1;

            for start_gridex in gridex_excl(&sub_grid_size) {
                let start = self.flat_index(&start_gridex);
                de_casteljau_upper_nd(
                    &mut eval_coeffs,
                    start,
                    self.strides[d],
                    self.grid_size[d],
                    t,
                );
            }
        }
        eval_coeffs[0]
    }

    pub fn num_controls(&self) -> usize {
        self.coeffs.len()
    }

    pub fn controls(&self) -> impl Iterator<Item = ControlPoint> + '_ {
        (0..self.num_controls()).map(move |i| {
            let index = self.unflat_index(i);
            let coords = index
                .iter()
                .enumerate()
                .map(|(d, &k)| {
                    let t = k as f64 / (self.grid_size[d] - 1) as f64;
                    (1.0 - t) * self.domain[d].0 + t * self.domain[d].1
                })
                .collect();
            ControlPoint {
                coords,
                coeff: self.coeffs[i],
                index,
            }
        })
    }

    /// Apply de Casteljau subdivision to the Bezier surface to extract the subsection
    /// defined by the given bounding box in parameter space.
    pub fn subsection(mut self, bbox: &BoundingBox) -> Self {
        for d in 0..self.dim() {
            let (min, max) = self.domain[d];
            let (t0, t1) = bbox[d];
            let t0 = (t0 - min) / (max - min);
            let t1 = (t1 - min) / (max - min);
            // Re-normalize t0 into the lower piece.
            let t0 = if t1 > 0.0 { t0 / t1 } else { 0.0 };

            let stride = self.strides[d];
            let size = self.grid_size[d];

            // Iterate over the grid "plane" at gridex[d] == 0.
            let mut sub_grid_size = self.grid_size.clone();
            sub_grid_size[d] = 1;

            for start_gridex in gridex_excl(&sub_grid_size) {
                let start = self.flat_index(&start_gridex);
                de_casteljau_lower_nd(&mut self.coeffs, start, stride, size, t1);
                de_casteljau_upper_nd(&mut self.coeffs, start, stride, size, t0);
            }
        }
        self.domain = bbox.clone();
        self
    }

    fn flat_index(&self, coord: &[usize]) -> usize {
        coord.iter().zip(&self.strides).map(|(c, s)| c * s).sum()
    }

    fn unflat_index(&self, index: usize) -> SmallVec<[usize; 4]> {
        let mut coord: SmallVec<[usize; 4]> = smallvec::smallvec![0; self.dim()];
        let mut remainder = index;
        for d in (0..self.dim()).rev() {
            coord[d] = remainder % self.grid_size[d];
            remainder /= self.grid_size[d];
        }
        coord
    }

    fn calc_strides(grid_size: &[usize]) -> SmallVec<[usize; 4]> {
        let mut strides: SmallVec<[usize; 4]> = smallvec::smallvec![1; grid_size.len()];
        for i in (0..grid_size.len().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * grid_size[i + 1];
        }
        strides
    }
}

/// A Bezier control point: its position in parameter space and its coefficient
/// ("height" above that position).
#[derive(Debug, Clone)]
pub struct ControlPoint {
    pub coords: SmallVec<[f64; 4]>,
    pub coeff: f64,

    /// The integer index of this control point in the Bezier grid
    pub index: SmallVec<[usize; 4]>,
}

fn de_casteljau_lower_nd(
    control_points: &mut impl IndexMut<usize, Output = f64>,
    start: usize,
    stride: usize,
    size: usize,
    t: f64,
) {
    let s = 1.0 - t;
    for n in 1..size {
        for i in (n..size).rev() {
            let j = start + i * stride;
            let j_prev = j - stride;
            control_points[j] = s * control_points[j_prev] + t * control_points[j];
        }
    }
}

fn de_casteljau_upper_nd(
    control_points: &mut impl IndexMut<usize, Output = f64>,
    start: usize,
    stride: usize,
    size: usize,
    t: f64,
) {
    let s = 1.0 - t;
    for k in 1..size {
        for i in 0..(size - k) {
            let j = start + i * stride;
            let j_next = j + stride;
            control_points[j] = s * control_points[j] + t * control_points[j_next];
        }
    }
}

#[cfg(test)]
impl approx::AbsDiffEq for BezierSurface {
    type Epsilon = f64;

    fn default_epsilon() -> Self::Epsilon {
        1e-10
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: Self::Epsilon) -> bool {
        self.grid_size == other.grid_size
            && self.domain.abs_diff_eq(&other.domain, epsilon)
            && self
                .coeffs
                .iter()
                .zip(&other.coeffs)
                .all(|(a, b)| (a - b).abs() <= epsilon)
    }
}

#[cfg(test)]
impl PartialEq for BezierSurface {
    fn eq(&self, other: &Self) -> bool {
        approx::AbsDiffEq::abs_diff_eq(self, other, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use assertables::assert_lt;
    use pretty_assertions as pa;

    use super::*;
    use crate::{
        binomial_coefficient,
        test_utils::{linspace, unit_box},
    };

    fn paraboloid() -> BezierSurface {
        // Control points for the surface z = x^2 + y^2 - 1 over [-1, 1]^2
        let coeffs = [
            1.0, -1.0, 1.0, //
            -1.0, -3.0, -1.0, //
            1.0, -1.0, 1.0,
        ];
        BezierSurface::new(&coeffs, &[3, 3], BoundingBox::symmetric(2))
    }

    /// Direct Bernstein sum over the unit box, for checking de Casteljau.
    fn bernstein_sum(surface: &BezierSurface, t: &[f64]) -> f64 {
        let mut total = 0.0;
        for control in surface.controls() {
            let mut weight = control.coeff;
            for (d, &k) in control.index.iter().enumerate() {
                let n = surface.grid_size[d] - 1;
                weight *= binomial_coefficient(n as u8, k as u8) as f64
                    * t[d].powi(k as i32)
                    * (1.0 - t[d]).powi((n - k) as i32);
            }
            total += weight;
        }
        total
    }

    #[test]
    fn index_mapping() {
        let bezier = BezierSurface::zeros(&[4, 3, 2], unit_box(3));
        let mut coords = HashSet::new();
        for i in 0..bezier.num_controls() {
            let coord = bezier.unflat_index(i);
            assert_lt!(coord[0], 4);
            assert_lt!(coord[1], 3);
            assert_lt!(coord[2], 2);
            pa::assert_eq!(bezier.flat_index(&coord), i);
            coords.insert(coord);
        }
        // Ensure all coordinates were visited
        pa::assert_eq!(coords.len(), 24);
    }

    #[test]
    fn surface_eval_quadratic() {
        crate::test_utils::init_test_logger();

        let bezier = paraboloid();
        for x in linspace(-1.0, 1.0, 5) {
            for y in linspace(-1.0, 1.0, 5) {
                let z = x * x + y * y - 1.0;
                assert_lt!((bezier.eval(&[x, y]) - z).abs(), 1e-10);
            }
        }
    }

    #[test]
    fn surface_eval_matches_bernstein_sum() {
        let coeffs = [
            2.0, -2.0, 1.0, -10.0, //
            5.0, 0.0, -6.0, 4.0, //
            -1.0, 3.0, -2.0, 1.0, //
        ];
        let bezier = BezierSurface::new(&coeffs, &[3, 4], unit_box(2));
        for x in linspace(0.0, 1.0, 7) {
            for y in linspace(0.0, 1.0, 7) {
                let direct = bernstein_sum(&bezier, &[x, y]);
                assert_lt!((bezier.eval(&[x, y]) - direct).abs(), 1e-12);
            }
        }
    }

    #[test]
    fn surface_subsection_quadratic() {
        let sub_domain = BoundingBox::from_bounds(&[(0.25, 0.75), (0.0, 0.5)]);
        let sub_bezier = paraboloid().subsection(&sub_domain);
        pa::assert_eq!(sub_bezier.domain(), &sub_domain);

        for x in linspace(0.25, 0.75, 5) {
            for y in linspace(0.0, 0.5, 5) {
                let z = x * x + y * y - 1.0;
                assert_lt!((sub_bezier.eval(&[x, y]) - z).abs(), 1e-10);
            }
        }
        // Over this corner the paraboloid stays below zero, and so do its controls.
        let (_, hi) = sub_bezier.coeff_range();
        assert_lt!(hi, 0.0);
    }

    #[test]
    fn controls_span_domain() {
        let bezier = paraboloid();
        let controls: Vec<_> = bezier.controls().collect();
        pa::assert_eq!(controls.len(), 9);
        pa::assert_eq!(controls[0].coords.to_vec(), vec![-1.0, -1.0]);
        pa::assert_eq!(controls[4].coords.to_vec(), vec![0.0, 0.0]);
        pa::assert_eq!(controls[4].coeff, -3.0);
        pa::assert_eq!(controls[8].coords.to_vec(), vec![1.0, 1.0]);
        pa::assert_eq!(bezier.coeff_range(), (-3.0, 1.0));
    }
}
