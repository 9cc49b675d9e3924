use std::ops::{Add, Mul, Neg, Sub};

use num_bigint::{BigInt, Sign};
use num_integer::Integer;
use num_rational::BigRational;
use num_traits::{Float, One, Signed, ToPrimitive, Zero};
use serde::{Deserialize, Serialize};

use crate::Numeric;

/// Mantissa width used when an exact operand has to be rounded and nothing else
/// supplies a precision.
pub const FALLBACK_PRECISION_BITS: u32 = 128;

/// How coefficients are represented while the fitted polynomial is expanded into
/// monomial form. The least-squares fit and the objective always run at `f64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PrecisionMode {
    /// No elevation. Fast, only advisable for low degrees.
    Working,

    /// Each coefficient is elevated to a [`BigFloat`] tier chosen from its magnitude.
    #[default]
    Tiered,

    /// Exact rational arithmetic.
    ExactRational,
}

impl PrecisionMode {
    /// Unit roundoff of the arithmetic the expansion runs in. Tiered expansion is
    /// limited by its narrowest tier.
    pub fn unit_roundoff(&self, tiers: &PrecisionTiers) -> f64 {
        match self {
            PrecisionMode::Working => f64::EPSILON,
            PrecisionMode::Tiered => {
                let bits = tiers
                    .default_bits
                    .min(tiers.intermediate_bits)
                    .min(tiers.highest_bits);
                2f64.powi(-(bits.min(1000) as i32))
            }
            PrecisionMode::ExactRational => 0.0,
        }
    }

    /// Bound on the difference between an orthogonal form and its monomial expansion
    /// when both are evaluated in `f64` at a point of `[-1, 1]^n`.
    ///
    /// `orthogonal_l1` and `monomial_l1` are the l1 norms of the two coefficient sets.
    /// The first term covers the `f64` evaluation of both forms. The second covers the
    /// rounding inside the expansion at [`unit_roundoff`](Self::unit_roundoff), amplified
    /// by `(1 + √2)^d`, which bounds the monomial l1 norm of a degree `d` Chebyshev or
    /// Legendre element.
    pub fn expansion_tolerance(
        &self,
        tiers: &PrecisionTiers,
        total_degree: usize,
        orthogonal_l1: f64,
        monomial_l1: f64,
    ) -> f64 {
        let terms = (total_degree + 1) as f64;
        let evaluation = f64::EPSILON * terms * terms * (orthogonal_l1 + monomial_l1);
        let growth = (1.0 + std::f64::consts::SQRT_2).powi(total_degree as i32);
        let expansion = self.unit_roundoff(tiers) * growth * terms * orthogonal_l1;
        2.0 * (evaluation + expansion)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tier {
    Default,
    Intermediate,
    Highest,
}

/// Magnitude boundaries and mantissa widths of the elevation tiers.
///
/// ### Default Values
/// - `highest_below`: `1e-12` (512 bit mantissa)
/// - `intermediate_below`: `1e-6` (256 bit mantissa)
/// - everything else: 128 bit mantissa
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrecisionTiers {
    pub highest_below: f64,
    pub intermediate_below: f64,
    pub highest_bits: u32,
    pub intermediate_bits: u32,
    pub default_bits: u32,
}

impl Default for PrecisionTiers {
    fn default() -> Self {
        Self {
            highest_below: 1e-12,
            intermediate_below: 1e-6,
            highest_bits: 512,
            intermediate_bits: 256,
            default_bits: 128,
        }
    }
}

impl PrecisionTiers {
    pub fn tier(&self, value: f64) -> Tier {
        let magnitude = value.abs();
        if magnitude < self.highest_below {
            Tier::Highest
        } else if magnitude < self.intermediate_below {
            Tier::Intermediate
        } else {
            Tier::Default
        }
    }

    pub fn bits(&self, tier: Tier) -> u32 {
        match tier {
            Tier::Default => self.default_bits,
            Tier::Intermediate => self.intermediate_bits,
            Tier::Highest => self.highest_bits,
        }
    }

    /// Lift a working-precision coefficient into its tier. Lossless: the `f64` value
    /// is represented exactly, only subsequent arithmetic gains precision.
    pub fn elevate(&self, value: f64) -> BigFloat {
        BigFloat::with_precision(value, self.bits(self.tier(value)))
    }
}

/// Binary floating point number with an arbitrary-width mantissa.
///
/// The value is `mantissa * 2^exponent`. After every operation the mantissa is
/// rounded to nearest so that it occupies at most `precision` bits. A precision of
/// zero marks an exact value (such as a converted `f64` or a constant); combining it
/// with another operand adopts the other operand's precision.
#[derive(Debug, Clone, PartialEq)]
pub struct BigFloat {
    mantissa: BigInt,
    exponent: i64,
    precision: u32,
}

impl BigFloat {
    pub fn with_precision(value: f64, precision: u32) -> Self {
        let mut result = <BigFloat as Numeric>::from_f64(value);
        result.precision = precision;
        result.normalized()
    }

    pub fn precision(&self) -> u32 {
        self.precision
    }

    fn raw(mantissa: BigInt, exponent: i64, precision: u32) -> Self {
        Self {
            mantissa,
            exponent,
            precision,
        }
    }

    /// Position one past the most significant bit, i.e. `floor(log2|x|) + 1`.
    fn top(&self) -> i64 {
        self.exponent + self.mantissa.bits() as i64
    }

    fn normalized(mut self) -> Self {
        if self.mantissa.is_zero() {
            self.exponent = 0;
            return self;
        }
        // Strip trailing zero bits so equal values compare equal.
        if let Some(zeros) = self.mantissa.trailing_zeros() {
            if zeros > 0 {
                self.mantissa >>= zeros;
                self.exponent += zeros as i64;
            }
        }
        if self.precision == 0 {
            return self;
        }
        let bits = self.mantissa.bits();
        if bits <= self.precision as u64 {
            return self;
        }
        let shift = bits - self.precision as u64;
        let negative = self.mantissa.sign() == Sign::Minus;
        let magnitude = self.mantissa.abs();
        let half = BigInt::one() << (shift - 1);
        let rounded = (magnitude + half) >> shift;
        self.mantissa = if negative { -rounded } else { rounded };
        self.exponent += shift as i64;
        // Rounding may carry into a new bit; a second pass strips it.
        self.normalized()
    }

    fn combined_precision(&self, other: &Self) -> u32 {
        self.precision.max(other.precision)
    }
}

impl Zero for BigFloat {
    fn zero() -> Self {
        Self::raw(BigInt::zero(), 0, 0)
    }

    fn is_zero(&self) -> bool {
        self.mantissa.is_zero()
    }
}

impl One for BigFloat {
    fn one() -> Self {
        Self::raw(BigInt::one(), 0, 0)
    }
}

impl Add for BigFloat {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        let precision = self.combined_precision(&rhs);
        if self.is_zero() {
            return Self { precision, ..rhs }.normalized();
        }
        if rhs.is_zero() {
            return Self { precision, ..self }.normalized();
        }
        // An operand entirely below the rounding position of the other only
        // matters for ties, which a couple of guard bits already resolve.
        if precision > 0 {
            let gap = self.top() - rhs.top();
            let limit = precision as i64 + 4;
            if gap > limit {
                return Self { precision, ..self }.normalized();
            }
            if -gap > limit {
                return Self { precision, ..rhs }.normalized();
            }
        }
        let exponent = self.exponent.min(rhs.exponent);
        let lhs = self.mantissa << (self.exponent - exponent) as usize;
        let rhs = rhs.mantissa << (rhs.exponent - exponent) as usize;
        Self::raw(lhs + rhs, exponent, precision).normalized()
    }
}

impl Neg for BigFloat {
    type Output = Self;

    fn neg(mut self) -> Self {
        self.mantissa = -self.mantissa;
        self
    }
}

impl Sub for BigFloat {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        self + (-rhs)
    }
}

impl Mul for BigFloat {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        let precision = self.combined_precision(&rhs);
        Self::raw(
            self.mantissa * rhs.mantissa,
            self.exponent + rhs.exponent,
            precision,
        )
        .normalized()
    }
}

impl Numeric for BigFloat {
    fn from_f64(value: f64) -> Self {
        if value == 0.0 || !value.is_finite() {
            return Self::zero();
        }
        let (mantissa, exponent, sign) = Float::integer_decode(value);
        let mantissa = BigInt::from(mantissa) * BigInt::from(sign);
        Self::raw(mantissa, exponent as i64, 0).normalized()
    }

    fn from_rational(value: &BigRational, like: &Self) -> Self {
        let precision = like.precision;
        if value.denom().is_one() {
            return Self::raw(value.numer().clone(), 0, precision).normalized();
        }
        let work = if precision == 0 {
            FALLBACK_PRECISION_BITS
        } else {
            precision
        };
        // Scale the numerator so the quotient carries `work + 2` significant bits.
        let shift = work as i64 + 2 + value.denom().bits() as i64 - value.numer().bits() as i64;
        let shift = shift.max(0);
        let scaled = value.numer().clone() << shift as usize;
        let (quotient, _) = scaled.div_rem(value.denom());
        Self::raw(quotient, -shift, work).normalized()
    }

    fn to_f64(&self) -> f64 {
        if self.mantissa.is_zero() {
            return 0.0;
        }
        let bits = self.mantissa.bits();
        let (mantissa, exponent) = if bits > 64 {
            let shift = bits - 64;
            (&self.mantissa >> shift, self.exponent + shift as i64)
        } else {
            (self.mantissa.clone(), self.exponent)
        };
        let base = mantissa.to_f64().unwrap_or(f64::NAN);
        scale_by_power_of_two(base, exponent)
    }
}

/// `value * 2^exponent`, applied in steps so intermediate powers stay finite.
fn scale_by_power_of_two(mut value: f64, mut exponent: i64) -> f64 {
    while exponent > 1000 {
        value *= 2f64.powi(1000);
        exponent -= 1000;
    }
    while exponent < -1000 {
        value *= 2f64.powi(-1000);
        exponent += 1000;
    }
    value * 2f64.powi(exponent as i32)
}
