use std::cmp::Ordering;

use smallvec::SmallVec;

use crate::{
    BezierSurface, BoundingBox, CritcoolError, Exponents, Monomial, Numeric, binomial_product,
    gridex_excl,
};

/// Sparse polynomial in `dim` variables, terms kept sorted by exponent with no
/// duplicates and no zero coefficients.
#[derive(Debug, Clone)]
pub struct MultivarPoly<T: Numeric = f64> {
    dim: usize,
    pub(crate) terms: SmallVec<[Monomial<T>; 8]>,
}

impl<T: Numeric> MultivarPoly<T> {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            terms: SmallVec::new(),
        }
    }

    /// Collect arbitrary monomials, combining equal exponents.
    pub fn from_monomials(dim: usize, monomials: impl IntoIterator<Item = Monomial<T>>) -> Self {
        Self::new(dim).add_monomials(monomials)
    }

    pub(crate) fn from_sorted(dim: usize, terms: SmallVec<[Monomial<T>; 8]>) -> Self {
        debug_assert!(terms.windows(2).all(|w| w[0].exp < w[1].exp));
        Self { dim, terms }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn terms(&self) -> impl Iterator<Item = &Monomial<T>> {
        self.terms.iter()
    }

    /// Coefficient of the term with exponents `exp`, zero if absent.
    pub fn coeff(&self, exp: &[u8]) -> T {
        match self.terms.binary_search_by(|m| m.exp.as_slice().cmp(exp)) {
            Ok(i) => self.terms[i].coeff.clone(),
            Err(_) => T::zero(),
        }
    }

    pub fn total_degree(&self) -> usize {
        self.terms
            .iter()
            .map(Monomial::total_degree)
            .max()
            .unwrap_or(0)
    }

    pub fn max_degrees(&self) -> Exponents {
        let mut max_degs: Exponents = smallvec::smallvec![0; self.dim];
        for monomial in &self.terms {
            for (m, &e) in max_degs.iter_mut().zip(&monomial.exp) {
                *m = (*m).max(e);
            }
        }
        max_degs
    }

    /// Evaluate the multivariate polynomial at the given variable values
    pub fn eval(&self, vars: &[T]) -> T {
        let mut result = T::zero();
        for monomial in &self.terms {
            result = result + monomial.eval(vars);
        }
        result
    }

    /// Partial derivative with respect to variable `var`.
    pub fn derivative(&self, var: usize) -> Self {
        // Decrementing one exponent keeps lexicographic order among the survivors.
        let terms = self
            .terms
            .iter()
            .filter_map(|m| m.derivative(var))
            .collect();
        Self::from_sorted(self.dim, terms)
    }

    /// All partial derivatives, i.e. the gradient system of this polynomial.
    pub fn gradient(&self) -> Vec<Self> {
        (0..self.dim).map(|var| self.derivative(var)).collect()
    }

    /// The same polynomial with every coefficient mapped through `f`.
    pub fn map_coeffs<U: Numeric>(&self, f: impl Fn(&T) -> U) -> MultivarPoly<U> {
        let terms = self
            .terms
            .iter()
            .filter_map(|m| {
                let coeff = f(&m.coeff);
                (!coeff.is_zero()).then(|| Monomial {
                    coeff,
                    exp: m.exp.clone(),
                })
            })
            .collect();
        MultivarPoly::from_sorted(self.dim, terms)
    }

    pub fn merge(mut self, other: Self) -> Self {
        debug_assert_eq!(self.dim, other.dim);
        let mut merged = SmallVec::with_capacity(self.terms.len() + other.terms.len());

        let mut a_iter = self.terms.into_iter().peekable();
        let mut b_iter = other.terms.into_iter().peekable();

        // The inputs should already be sorted. Keep them sorted while merging.
        while let (Some(a), Some(b)) = (a_iter.peek(), b_iter.peek()) {
            match a.exp.cmp(&b.exp) {
                Ordering::Less => merged.extend(a_iter.next()),
                Ordering::Greater => merged.extend(b_iter.next()),
                Ordering::Equal => {
                    // Equal exponents, combine coefficients
                    if let (Some(a), Some(b)) = (a_iter.next(), b_iter.next()) {
                        let coeff = a.coeff + b.coeff;
                        if !coeff.is_zero() {
                            merged.push(Monomial { coeff, exp: a.exp });
                        }
                    }
                }
            }
        }
        merged.extend(a_iter);
        merged.extend(b_iter);
        self.terms = merged;
        self
    }

    pub fn add_monomials(self, monomials: impl IntoIterator<Item = Monomial<T>>) -> Self {
        let mut other: Vec<Monomial<T>> = monomials
            .into_iter()
            .filter(|m| !m.coeff.is_zero())
            .collect();
        other.sort_by(|a, b| a.exp.cmp(&b.exp));

        // Combine duplicates within the new batch before merging.
        let mut terms: SmallVec<[Monomial<T>; 8]> = SmallVec::with_capacity(other.len());
        for m in other {
            match terms.last_mut() {
                Some(last) if last.exp == m.exp => {
                    last.coeff = last.coeff.clone() + m.coeff;
                }
                _ => terms.push(m),
            }
        }
        terms.retain(|m| !m.coeff.is_zero());
        let dim = self.dim;
        self.merge(Self::from_sorted(dim, terms))
    }
}

impl MultivarPoly<f64> {
    /// Sum of absolute coefficient values, an upper bound of `|p|` on `[-1, 1]^n`.
    pub fn l1_norm(&self) -> f64 {
        self.terms.iter().map(|m| m.coeff.abs()).sum()
    }

    pub fn sub_polys<P: AsRef<[f64]>>(&self, polys: &[P]) -> Result<Self, CritcoolError> {
        let mut output = MultivarPoly::new(self.dim);
        for monomial in &self.terms {
            let sub_poly = monomial.sub_polys(polys)?;
            output = output.merge(sub_poly);
        }
        Ok(output)
    }

    /// Calculate the Bernstein control points of this polynomial over `bbox`.
    ///
    /// The polynomial cannot be reconstructed from these control points alone.
    pub fn bezier_surface(&self, bbox: &BoundingBox) -> Result<BezierSurface, CritcoolError> {
        if bbox.dim() != self.dim {
            return Err(CritcoolError::AlgorithmError {
                message: format!(
                    "box of dimension {} for a polynomial in {} variables",
                    bbox.dim(),
                    self.dim
                ),
            });
        }

        // Perform affine parameter transformation from bbox to unit box [0, 1]^n
        // by substituting x_i = min_i + (max_i - min_i) * t_i
        let affines: Vec<[f64; 2]> = bbox.iter().map(|&(min, max)| [min, max - min]).collect();
        let unit_poly = self.sub_polys(affines.as_slice())?;

        // Ref: https://adrianbowyer.com/Publications/berchtold2000.pdf
        // 1. Calculate max exp/degree in each variable across all monomials
        let max_degs = unit_poly.max_degrees();

        let grid_size: Exponents = max_degs.iter().map(|&d| (d + 1).max(2)).collect();
        let sizes: Vec<usize> = grid_size.iter().map(|&s| s as usize).collect();
        let mut surface = BezierSurface::zeros(&sizes, bbox.clone());

        // 2. Sum over Eq (3) in the paper
        let degrees: Exponents = grid_size.iter().map(|&s| s - 1).collect();
        for control_inds in gridex_excl(&grid_size) {
            let bern_coeff = unit_poly
                .terms()
                .filter(|m| m.exp_all_le(&control_inds))
                .map(|m| {
                    let num = binomial_product(&control_inds, &m.exp);
                    let den = binomial_product(&degrees, &m.exp);
                    m.coeff * num / den
                })
                .sum();

            let coord: Vec<usize> = control_inds.iter().map(|&i| i as usize).collect();
            surface.set_coeff(&coord, bern_coeff);
        }
        Ok(surface)
    }
}

#[cfg(test)]
impl approx::AbsDiffEq for MultivarPoly<f64> {
    type Epsilon = f64;

    fn default_epsilon() -> Self::Epsilon {
        f64::default_epsilon()
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: Self::Epsilon) -> bool {
        // Terms below epsilon may be missing on either side.
        let exps: std::collections::BTreeSet<&[u8]> = self
            .terms
            .iter()
            .chain(other.terms.iter())
            .map(|m| m.exp.as_slice())
            .collect();
        self.dim == other.dim
            && exps
                .into_iter()
                .all(|exp| (self.coeff(exp) - other.coeff(exp)).abs() <= epsilon)
    }
}

impl<T: Numeric> PartialEq for MultivarPoly<T> {
    fn eq(&self, other: &Self) -> bool {
        self.dim == other.dim && self.terms == other.terms
    }
}

impl<T: Numeric> std::ops::Add for MultivarPoly<T> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        self.merge(rhs)
    }
}
