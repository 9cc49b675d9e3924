use std::fmt::Debug;
use std::ops::{Add, Mul, Neg, Sub};

use num_rational::BigRational;
use num_traits::{One, ToPrimitive, Zero};

/// Scalar types that grids, Vandermonde matrices and polynomial coefficients may be
/// expressed in: working `f64`, exact `BigRational`, or elevated-precision `BigFloat`.
///
/// Operations stay inside the type, so the numeric type of an input is preserved
/// through every computation that is generic over it.
pub trait Numeric:
    Clone
    + Debug
    + PartialEq
    + Send
    + Sync
    + 'static
    + Zero
    + One
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Neg<Output = Self>
{
    /// Exact conversion from a finite working-precision value.
    fn from_f64(value: f64) -> Self;

    /// Conversion from an exact rational, rounded to the precision carried by `like`.
    fn from_rational(value: &BigRational, like: &Self) -> Self;

    /// Nearest working-precision value.
    fn to_f64(&self) -> f64;

    fn from_int(value: i64, like: &Self) -> Self {
        Self::from_rational(&BigRational::from_integer(value.into()), like)
    }
}

impl Numeric for f64 {
    fn from_f64(value: f64) -> Self {
        value
    }

    fn from_rational(value: &BigRational, _like: &Self) -> Self {
        ToPrimitive::to_f64(value).unwrap_or(f64::NAN)
    }

    fn to_f64(&self) -> f64 {
        *self
    }

    fn from_int(value: i64, _like: &Self) -> Self {
        value as f64
    }
}

impl Numeric for BigRational {
    fn from_f64(value: f64) -> Self {
        BigRational::from_float(value).unwrap_or_else(BigRational::zero)
    }

    fn from_rational(value: &BigRational, _like: &Self) -> Self {
        value.clone()
    }

    fn to_f64(&self) -> f64 {
        ToPrimitive::to_f64(self).unwrap_or(f64::NAN)
    }
}

/// `x^exp` by repeated multiplication, valid for any [`Numeric`].
pub(crate) fn powu<T: Numeric>(x: &T, exp: u32) -> T {
    let mut result = T::one();
    for _ in 0..exp {
        result = result * x.clone();
    }
    result
}

#[cfg(test)]
mod tests {
    use num_bigint::BigInt;

    use super::*;

    #[test]
    fn rational_from_f64_is_exact() {
        let r = <BigRational as Numeric>::from_f64(0.1);
        // 0.1 is not a dyadic fraction, the exact binary value is kept.
        assert_ne!(r, BigRational::new(BigInt::from(1), BigInt::from(10)));
        assert_eq!(Numeric::to_f64(&r), 0.1);
    }

    #[test]
    fn f64_from_rational_rounds() {
        let third = BigRational::new(BigInt::from(1), BigInt::from(3));
        assert_eq!(<f64 as Numeric>::from_rational(&third, &0.0), 1.0 / 3.0);
        assert_eq!(f64::from_int(-7, &0.0), -7.0);
    }

    #[test]
    fn rational_from_int() {
        let like = BigRational::zero();
        let r = BigRational::from_int(-7, &like);
        assert_eq!(r, BigRational::from_integer(BigInt::from(-7)));
    }

    #[test]
    fn powu_matches_powi() {
        assert_eq!(powu(&1.5f64, 0), 1.0);
        assert_eq!(powu(&1.5f64, 3), 1.5f64.powi(3));
        let half = BigRational::new(BigInt::from(1), BigInt::from(2));
        assert_eq!(
            powu(&half, 4),
            BigRational::new(BigInt::from(1), BigInt::from(16))
        );
    }
}
