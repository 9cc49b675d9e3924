//
// Projected Polyhedra refinement
//

use smallvec::SmallVec;

use crate::{BezierSurface, BoundingBox};

/// Shrinks a candidate region using the convex hulls of the control points of each
/// equation, projected onto every `(x_d, value)` plane.
///
/// A root of all equations must lie where every projected hull crosses zero.
pub(crate) struct ProjectedPolyhedraRefiner {
    hulls: Vec<HullIntersector>,
}

impl ProjectedPolyhedraRefiner {
    pub fn new(dim: usize) -> Self {
        Self {
            hulls: vec![HullIntersector::new(); dim],
        }
    }

    /// Intersect `region` with the zero crossings of every surface's projected hulls,
    /// each crossing interval grown by `pad` on both sides. Control values within
    /// `zero_tols[i]` of zero count as zero for surface `i`. The result may be an
    /// invalid box, meaning the region holds no root.
    pub fn refine_region(
        &mut self,
        surfaces: &[BezierSurface],
        zero_tols: &[f64],
        pad: f64,
        region: &mut BoundingBox,
    ) {
        debug_assert!(self.hulls.len() == region.dim());
        debug_assert!(surfaces.len() == zero_tols.len());

        for (surface, &zero_tol) in surfaces.iter().zip(zero_tols) {
            for hull in self.hulls.iter_mut() {
                hull.reset(zero_tol);
            }
            for control_point in surface.controls() {
                for (hull, &x) in self.hulls.iter_mut().zip(&control_point.coords) {
                    hull.add_point(x, control_point.coeff);
                }
            }
            for (d, hull) in self.hulls.iter().enumerate() {
                let (min_x, max_x) = hull.intersect_zero();
                if min_x > max_x {
                    // No crossing at all
                    region[d] = (f64::INFINITY, f64::NEG_INFINITY);
                    return;
                }
                region[d].0 = region[d].0.max(min_x - pad);
                region[d].1 = region[d].1.min(max_x + pad);
            }
            if !region.is_valid() {
                return;
            }
        }
    }
}

#[derive(Debug, Clone)]
struct HullIntersector {
    above: SmallVec<[[f64; 2]; 16]>,
    below: SmallVec<[[f64; 2]; 16]>,
    on_min: f64,
    on_max: f64,
    zero_tol: f64,
}

impl HullIntersector {
    fn new() -> Self {
        Self {
            above: SmallVec::new(),
            below: SmallVec::new(),
            on_min: f64::INFINITY,
            on_max: f64::NEG_INFINITY,
            zero_tol: 0.0,
        }
    }

    fn reset(&mut self, zero_tol: f64) {
        self.above.clear();
        self.below.clear();
        self.on_min = f64::INFINITY;
        self.on_max = f64::NEG_INFINITY;
        self.zero_tol = zero_tol;
    }

    /// Values within the zero tolerance are round-off on the axis itself.
    fn add_point(&mut self, x: f64, y: f64) {
        debug_assert!(x.is_finite() && y.is_finite(), "Invalid point ({x}, {y})");
        if y > self.zero_tol {
            self.above.push([x, y]);
        } else if y < -self.zero_tol {
            self.below.push([x, y]);
        } else {
            self.on_min = self.on_min.min(x);
            self.on_max = self.on_max.max(x);
        }
    }

    /// Extent of the intersection of the hull with the x axis, `(inf, -inf)` if none.
    fn intersect_zero(&self) -> (f64, f64) {
        let mut min_x = self.on_min;
        let mut max_x = self.on_max;

        // Every crossing lies on a segment between a point above and one below.
        for &[x1, z1] in &self.above {
            for &[x2, z2] in &self.below {
                let t = z1 / (z1 - z2);
                let x = x1 + t * (x2 - x1);
                min_x = min_x.min(x);
                max_x = max_x.max(x);
            }
        }
        (min_x, max_x)
    }
}
