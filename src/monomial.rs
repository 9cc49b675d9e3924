use std::cmp::Ordering;

use fmtastic::{Subscript, Superscript};
use smallvec::SmallVec;

use crate::{CritcoolError, MultivarPoly, Numeric, gridex_excl, numeric::powu};

/// Per-variable exponents of a monomial, e.g. `[2, 1, 0]` for `x0² x1`.
pub type Exponents = SmallVec<[u8; 4]>;

// Coefficients of a univariate polynomial, lowest order first.
// SmallVec keeps the common low-degree case off the heap.
pub(crate) type PolyVec = SmallVec<[f64; 16]>;

#[derive(Clone)]
pub struct Monomial<T: Numeric = f64> {
    /// Coefficient of the monomial
    ///
    /// For example, in 3.5 * x^2 * y^1 * z^0, the coefficient is 3.5
    pub(crate) coeff: T,

    /// Exponents for each variable
    ///
    /// For example, if variables are ordered (x, y, z), and the monomial is 3 * x^2 * y^1 * z^0,
    /// then exp would be [2, 1, 0]
    pub(crate) exp: Exponents,
}

impl<T: Numeric> core::fmt::Debug for Monomial<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let coeff = self.coeff.to_f64();
        if self.exp.iter().all(|&e| e == 0) {
            return write!(f, "{coeff}");
        }
        if !self.coeff.is_one() {
            write!(f, "{coeff} * ")?;
        }
        for (i, &e) in self.exp.iter().enumerate() {
            if e == 0 {
                continue;
            }
            write!(f, "x{}{} ", Subscript(i), Superscript(e))?;
        }
        Ok(())
    }
}

impl<T: Numeric> Monomial<T> {
    pub fn new(coeff: T, exp: &[u8]) -> Self {
        Self {
            coeff,
            exp: Exponents::from_slice(exp),
        }
    }

    pub fn coeff(&self) -> &T {
        &self.coeff
    }

    pub fn exp(&self) -> &[u8] {
        &self.exp
    }

    pub fn dim(&self) -> usize {
        self.exp.len()
    }

    pub fn total_degree(&self) -> usize {
        self.exp.iter().map(|&e| e as usize).sum()
    }

    pub fn eval(&self, vars: &[T]) -> T {
        debug_assert_eq!(vars.len(), self.exp.len());
        let mut result = self.coeff.clone();
        for (x, &e) in vars.iter().zip(&self.exp) {
            if e > 0 {
                result = result * powu(x, e as u32);
            }
        }
        result
    }

    /// Partial derivative with respect to variable `var`, or `None` when it vanishes.
    pub fn derivative(&self, var: usize) -> Option<Self> {
        let e = self.exp[var];
        if e == 0 {
            return None;
        }
        let mut exp = self.exp.clone();
        exp[var] -= 1;
        let coeff = self.coeff.clone() * T::from_int(e as i64, &self.coeff);
        Some(Self { coeff, exp })
    }

    /// Check if all exponents in self are less than or equal to those in other
    /// See Section 2.1 in [1]
    ///
    /// [1] https://adrianbowyer.com/Publications/berchtold2000.pdf
    pub fn exp_all_le(&self, other_exp: &[u8]) -> bool {
        self.exp.iter().zip(other_exp).all(|(a, b)| a <= b)
    }
}

impl Monomial<f64> {
    /// Substitute each variable in this monomial with the given univariate polynomial.
    ///
    /// Each polynomial has its own variable, separate from the others and from the
    /// monomial's variables.
    ///
    /// ```rust
    /// use critcool::{Monomial, MultivarPoly};
    ///
    /// // 3 x² y with x = 1 + 2u and y = 3 + 6v²
    /// let mon = Monomial::new(3.0, &[2, 1]);
    /// let polys = [[1.0, 2.0, 0.0], [3.0, 0.0, 6.0]];
    /// let result = mon.sub_polys(&polys).unwrap();
    ///
    /// let expected = MultivarPoly::from_monomials(2, [
    ///     Monomial::new(9.0, &[0, 0]),
    ///     Monomial::new(18.0, &[0, 2]),
    ///     Monomial::new(36.0, &[1, 0]),
    ///     Monomial::new(72.0, &[1, 2]),
    ///     Monomial::new(36.0, &[2, 0]),
    ///     Monomial::new(72.0, &[2, 2]),
    /// ]);
    /// assert_eq!(result, expected);
    /// ```
    pub fn sub_polys<P: AsRef<[f64]>>(
        &self,
        rhs_polys: &[P],
    ) -> Result<MultivarPoly<f64>, CritcoolError> {
        if rhs_polys.len() != self.dim() {
            return Err(CritcoolError::AlgorithmError {
                message: format!(
                    "{} substitutions for a monomial in {} variables",
                    rhs_polys.len(),
                    self.dim()
                ),
            });
        }

        let var_polys: SmallVec<[PolyVec; 4]> = rhs_polys
            .iter()
            .zip(&self.exp)
            .map(|(poly, &e)| poly_pow(poly.as_ref(), e))
            .collect();
        let num_coeffs: SmallVec<[usize; 4]> = var_polys.iter().map(|p| p.len()).collect();

        // Expand the product of all var_polys into its monomial terms.
        let mut terms = SmallVec::new();
        for index in gridex_excl(&num_coeffs) {
            let mut sub_coeff = 1.0;
            for (poly, &i) in var_polys.iter().zip(&index) {
                sub_coeff *= poly[i];
            }
            if sub_coeff == 0.0 {
                continue;
            }
            let exp: Exponents = index.iter().map(|&i| i as u8).collect();
            terms.push(Monomial {
                coeff: self.coeff * sub_coeff,
                exp,
            });
        }
        // gridex yields lexicographic order, so the terms are already sorted.
        Ok(MultivarPoly::from_sorted(self.dim(), terms))
    }
}

fn poly_pow(coeffs: &[f64], exp: u8) -> PolyVec {
    let mut result: PolyVec = smallvec::smallvec![1.0];
    for _ in 0..exp {
        result = convolve(&result, coeffs);
    }
    result
}

fn convolve(a: &[f64], b: &[f64]) -> PolyVec {
    if a.is_empty() || b.is_empty() {
        return PolyVec::new();
    }
    let mut result: PolyVec = smallvec::smallvec![0.0; a.len() + b.len() - 1];
    for i in 0..a.len() {
        for j in 0..b.len() {
            result[i + j] += a[i] * b[j];
        }
    }
    result
}

impl<T: Numeric> PartialEq for Monomial<T> {
    fn eq(&self, other: &Self) -> bool {
        self.exp == other.exp && self.coeff == other.coeff
    }
}

impl<T: Numeric> PartialOrd for Monomial<T> {
    /// Monomials order by exponents only.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.exp.cmp(&other.exp))
    }
}

#[cfg(test)]
impl approx::AbsDiffEq for Monomial<f64> {
    type Epsilon = f64;

    fn default_epsilon() -> Self::Epsilon {
        f64::default_epsilon()
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: Self::Epsilon) -> bool {
        self.exp == other.exp && (self.coeff - other.coeff).abs() < epsilon
    }
}

#[cfg(test)]
mod tests {
    use assertables::{assert_err, assert_ok};
    use num_rational::BigRational;
    use pretty_assertions as pa;

    use super::*;

    #[test]
    fn exp_all_le() {
        let other_exp = [1u8, 2, 3];
        for (i, j, k) in itertools::iproduct!(0..=1u8, 0..=2, 0..=3) {
            assert!(Monomial::new(2.0, &[i, j, k]).exp_all_le(&other_exp));
        }
        for (i, j, k) in itertools::iproduct!(0..=1u8, 0..=2, 4..8) {
            assert!(!Monomial::new(2.0, &[i, j, k]).exp_all_le(&other_exp));
        }
        for (i, j, k) in itertools::iproduct!(2..4u8, 0..=2, 0..=3) {
            assert!(!Monomial::new(2.0, &[i, j, k]).exp_all_le(&other_exp));
        }
    }

    #[test]
    fn eval_and_derivative() {
        let mon = Monomial::new(3.0, &[2, 1, 0]);
        pa::assert_eq!(mon.eval(&[2.0, 5.0, 7.0]), 60.0);
        pa::assert_eq!(mon.total_degree(), 3);

        let dx = mon.derivative(0).unwrap();
        pa::assert_eq!(dx, Monomial::new(6.0, &[1, 1, 0]));
        let dy = mon.derivative(1).unwrap();
        pa::assert_eq!(dy, Monomial::new(3.0, &[2, 0, 0]));
        assert!(mon.derivative(2).is_none());
    }

    #[test]
    fn rational_coefficients_stay_exact() {
        let third = BigRational::new(1.into(), 3.into());
        let mon = Monomial::new(third, &[3]);
        let d = mon.derivative(0).unwrap();
        pa::assert_eq!(d.coeff, BigRational::from_integer(1.into()));
        pa::assert_eq!(d.exp.to_vec(), vec![2]);
    }

    #[test]
    fn debug_format() {
        pa::assert_eq!(format!("{:?}", Monomial::new(2.5, &[0, 0])), "2.5");
        pa::assert_eq!(format!("{:?}", Monomial::new(1.0, &[2, 0])), "x₀² ");
        pa::assert_eq!(format!("{:?}", Monomial::new(3.0, &[0, 1])), "3 * x₁¹ ");
    }

    #[test]
    fn sub_polys_identity() {
        let monomial = Monomial::new(2.0, &[2, 3, 1]);
        let vars = [
            [0.0, 1.0], // x
            [0.0, 1.0], // y
            [0.0, 1.0], // z
        ];
        let result = assert_ok!(monomial.sub_polys(&vars));
        let expected = MultivarPoly::from_monomials(3, [Monomial::new(2.0, &[2, 3, 1])]);
        pa::assert_eq!(result, expected);
    }

    #[test]
    fn sub_polys_constant() {
        let monomial = Monomial::new(5.0, &[2]);
        let result = assert_ok!(monomial.sub_polys(&[[3.0]]));
        let expected = MultivarPoly::from_monomials(1, [Monomial::new(45.0, &[0])]);
        pa::assert_eq!(result, expected);
    }

    #[test]
    fn sub_polys_wrong_arity() {
        let monomial = Monomial::new(1.0, &[1, 1]);
        assert_err!(monomial.sub_polys(&[[0.0, 1.0]]));
    }
}
