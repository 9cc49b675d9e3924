use smallvec::SmallVec;

/// Axis-aligned box, one `(min, max)` interval per variable.
#[derive(Clone, Debug, PartialEq)]
pub struct BoundingBox(pub SmallVec<[(f64, f64); 4]>);

impl BoundingBox {
    pub fn from_bounds(bounds: &[(f64, f64)]) -> Self {
        BoundingBox(SmallVec::from_slice(bounds))
    }

    /// The normalized sample cube `[-1, 1]^dim`.
    pub fn symmetric(dim: usize) -> Self {
        BoundingBox(smallvec::smallvec![(-1.0, 1.0); dim])
    }

    pub fn dim(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(f64, f64)> {
        self.0.iter()
    }

    pub fn center(&self) -> Vec<f64> {
        self.0.iter().map(|&(min, max)| 0.5 * (min + max)).collect()
    }

    pub fn is_valid(&self) -> bool {
        self.0.iter().all(|&(min, max)| min <= max)
    }

    pub fn side_length(&self, dim: usize) -> f64 {
        let (min, max) = self.0[dim];
        max - min
    }

    pub fn largest_side(&self) -> (usize, f64) {
        let mut largest_dim = 0;
        let mut largest_length = 0.0;
        for i in 0..self.dim() {
            let length = self.side_length(i);
            if length > largest_length {
                largest_length = length;
                largest_dim = i;
            }
        }
        (largest_dim, largest_length)
    }

    pub fn subdivide(&self, dim: usize) -> (Self, Self) {
        let (min, max) = self.0[dim];
        let mid = 0.5 * (min + max);

        let mut lower = self.clone();
        let mut upper = self.clone();
        lower.0[dim] = (min, mid);
        upper.0[dim] = (mid, max);
        (lower, upper)
    }

    /// Grow every side narrower than `min_width` about its center, without leaving
    /// `outer`.
    pub fn widen_within(&mut self, min_width: f64, outer: &Self) {
        for (side, &(lo, hi)) in self.0.iter_mut().zip(&outer.0) {
            if side.1 - side.0 < min_width {
                let mid = 0.5 * (side.0 + side.1);
                side.0 = (mid - 0.5 * min_width).max(lo);
                side.1 = (mid + 0.5 * min_width).min(hi);
            }
        }
    }

    /// Overlap test with every side of `other` grown by `slack`.
    pub fn overlaps_within(&self, other: &Self, slack: f64) -> bool {
        self.0
            .iter()
            .zip(&other.0)
            .all(|(&(a_min, a_max), &(b_min, b_max))| {
                a_max + slack >= b_min && b_max + slack >= a_min
            })
    }

    /// Grow to the smallest box containing both boxes.
    pub fn union(&mut self, other: &Self) {
        for (a, b) in self.0.iter_mut().zip(&other.0) {
            a.0 = a.0.min(b.0);
            a.1 = a.1.max(b.1);
        }
    }
}

impl std::ops::Index<usize> for BoundingBox {
    type Output = (f64, f64);

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl std::ops::IndexMut<usize> for BoundingBox {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.0[index]
    }
}

#[cfg(test)]
impl approx::AbsDiffEq for BoundingBox {
    type Epsilon = f64;

    fn default_epsilon() -> Self::Epsilon {
        f64::default_epsilon()
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: Self::Epsilon) -> bool {
        self.dim() == other.dim()
            && self
                .0
                .iter()
                .zip(other.0.iter())
                .all(|(&(a_min, a_max), &(b_min, b_max))| {
                    (a_min - b_min).abs() <= epsilon && (a_max - b_max).abs() <= epsilon
                })
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use pretty_assertions as pa;

    use super::*;

    #[test]
    fn subdivide_largest_side() {
        let bbox = BoundingBox::from_bounds(&[(0.0, 1.0), (-2.0, 2.0), (0.0, 0.5)]);
        let (d, length) = bbox.largest_side();
        pa::assert_eq!((d, length), (1, 4.0));

        let (lower, upper) = bbox.subdivide(d);
        pa::assert_eq!(lower[1], (-2.0, 0.0));
        pa::assert_eq!(upper[1], (0.0, 2.0));
        pa::assert_eq!(lower[0], bbox[0]);
        assert!(lower.overlaps_within(&upper, 0.0));
    }

    #[test]
    fn union_and_slack() {
        let mut a = BoundingBox::from_bounds(&[(0.0, 1.0), (0.0, 1.0)]);
        let b = BoundingBox::from_bounds(&[(1.0 + 1e-9, 2.0), (0.5, 0.75)]);
        assert!(!a.overlaps_within(&b, 0.0));
        assert!(a.overlaps_within(&b, 1e-8));

        a.union(&b);
        pa::assert_eq!(a, BoundingBox::from_bounds(&[(0.0, 2.0), (0.0, 1.0)]));
        assert!(a.is_valid());
        assert!(!BoundingBox::from_bounds(&[(1.0, 0.0)]).is_valid());
    }

    #[test]
    fn widen_collapsed_side() {
        let outer = BoundingBox::from_bounds(&[(0.0, 1.0), (-1.0, 1.0)]);
        let mut bbox = BoundingBox::from_bounds(&[(0.5, 0.5), (-0.5, 0.5)]);
        bbox.widen_within(0.1, &outer);
        assert_abs_diff_eq!(
            bbox,
            BoundingBox::from_bounds(&[(0.45, 0.55), (-0.5, 0.5)]),
            epsilon = 1e-15
        );

        // Clamped to the outer box
        let mut edge = BoundingBox::from_bounds(&[(0.0, 0.0), (1.0, 1.0)]);
        edge.widen_within(0.1, &outer);
        assert_abs_diff_eq!(
            edge,
            BoundingBox::from_bounds(&[(0.0, 0.05), (0.95, 1.0)]),
            epsilon = 1e-15
        );
    }

    #[test]
    fn center_of_box() {
        let bbox = BoundingBox::from_bounds(&[(0.0, 1.0), (-3.0, 1.0)]);
        pa::assert_eq!(bbox.center(), vec![0.5, -1.0]);
    }
}
