//! One-dimensional polynomial bases and their sample node families.
//!
//! Multivariate basis functions are tensor products of these, so everything a basis
//! must provide is one-dimensional: its nodes, values, derivatives and the monomial
//! expansion of each element. Adding a basis means adding one [`Basis`] impl and one
//! [`BasisKind`] variant.
use std::f64::consts::PI;

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::Zero;
use serde::{Deserialize, Serialize};

use crate::Numeric;

pub trait Basis {
    /// Sample nodes of this family in ascending order, all within `[-1, 1]`.
    fn nodes(&self, count: usize) -> Vec<f64>;

    /// `φ_0(x), ..., φ_degree(x)`, computed in the numeric type of `x`.
    fn values<T: Numeric>(&self, degree: usize, x: &T) -> Vec<T>;

    /// `φ_0'(x), ..., φ_degree'(x)`.
    fn derivatives(&self, degree: usize, x: f64) -> Vec<f64>;

    /// Exact monomial coefficients of `φ_0, ..., φ_degree`. Row `k` has `k + 1` entries,
    /// entry `j` being the coefficient of `x^j`.
    fn monomial_table(&self, degree: usize) -> Vec<Vec<BigRational>>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Chebyshev;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Legendre;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Uniform;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BasisKind {
    /// Chebyshev polynomials of the first kind on Chebyshev-Gauss nodes.
    Chebyshev,
    /// Legendre polynomials on Gauss-Legendre nodes.
    Legendre,
    /// Plain monomials on equispaced nodes.
    Uniform,
}

impl Basis for BasisKind {
    fn nodes(&self, count: usize) -> Vec<f64> {
        match self {
            BasisKind::Chebyshev => Chebyshev.nodes(count),
            BasisKind::Legendre => Legendre.nodes(count),
            BasisKind::Uniform => Uniform.nodes(count),
        }
    }

    fn values<T: Numeric>(&self, degree: usize, x: &T) -> Vec<T> {
        match self {
            BasisKind::Chebyshev => Chebyshev.values(degree, x),
            BasisKind::Legendre => Legendre.values(degree, x),
            BasisKind::Uniform => Uniform.values(degree, x),
        }
    }

    fn derivatives(&self, degree: usize, x: f64) -> Vec<f64> {
        match self {
            BasisKind::Chebyshev => Chebyshev.derivatives(degree, x),
            BasisKind::Legendre => Legendre.derivatives(degree, x),
            BasisKind::Uniform => Uniform.derivatives(degree, x),
        }
    }

    fn monomial_table(&self, degree: usize) -> Vec<Vec<BigRational>> {
        match self {
            BasisKind::Chebyshev => Chebyshev.monomial_table(degree),
            BasisKind::Legendre => Legendre.monomial_table(degree),
            BasisKind::Uniform => Uniform.monomial_table(degree),
        }
    }
}

impl Basis for Chebyshev {
    fn nodes(&self, count: usize) -> Vec<f64> {
        if count == 1 {
            return vec![0.0];
        }
        (0..count)
            .rev()
            .map(|i| (PI * (i as f64 + 0.5) / count as f64).cos())
            .collect()
    }

    /// T_0 = 1, T_1 = x, T_{k+1} = 2x T_k - T_{k-1}
    fn values<T: Numeric>(&self, degree: usize, x: &T) -> Vec<T> {
        let mut values = Vec::with_capacity(degree + 1);
        values.push(T::one());
        if degree >= 1 {
            values.push(x.clone());
        }
        let two_x = T::from_int(2, x) * x.clone();
        for k in 1..degree {
            let next = two_x.clone() * values[k].clone() - values[k - 1].clone();
            values.push(next);
        }
        values
    }

    /// T'_{k+1} = 2 T_k + 2x T'_k - T'_{k-1}
    fn derivatives(&self, degree: usize, x: f64) -> Vec<f64> {
        let values = self.values(degree, &x);
        let mut derivs = vec![0.0; degree + 1];
        if degree >= 1 {
            derivs[1] = 1.0;
        }
        for k in 1..degree {
            derivs[k + 1] = 2.0 * values[k] + 2.0 * x * derivs[k] - derivs[k - 1];
        }
        derivs
    }

    fn monomial_table(&self, degree: usize) -> Vec<Vec<BigRational>> {
        let two = rational(2, 1);
        three_term_table(degree, |_k| (two.clone(), rational(1, 1)))
    }
}

impl Basis for Legendre {
    fn nodes(&self, count: usize) -> Vec<f64> {
        if count == 1 {
            return vec![0.0];
        }
        let mut nodes: Vec<f64> = (0..count)
            .map(|i| gauss_legendre_root(count, i))
            .collect();
        nodes.sort_by(f64::total_cmp);
        nodes
    }

    /// (k+1) P_{k+1} = (2k+1) x P_k - k P_{k-1}
    fn values<T: Numeric>(&self, degree: usize, x: &T) -> Vec<T> {
        let mut values = Vec::with_capacity(degree + 1);
        values.push(T::one());
        if degree >= 1 {
            values.push(x.clone());
        }
        for k in 1..degree {
            let k_i = k as i64;
            let a = T::from_rational(&rational(2 * k_i + 1, k_i + 1), x);
            let b = T::from_rational(&rational(k_i, k_i + 1), x);
            let next = a * x.clone() * values[k].clone() - b * values[k - 1].clone();
            values.push(next);
        }
        values
    }

    /// P'_{k+1} = (k+1) P_k + x P'_k
    fn derivatives(&self, degree: usize, x: f64) -> Vec<f64> {
        let values = self.values(degree, &x);
        let mut derivs = vec![0.0; degree + 1];
        for k in 0..degree {
            derivs[k + 1] = (k + 1) as f64 * values[k] + x * derivs[k];
        }
        derivs
    }

    fn monomial_table(&self, degree: usize) -> Vec<Vec<BigRational>> {
        three_term_table(degree, |k| {
            let k = k as i64;
            (rational(2 * k + 1, k + 1), rational(k, k + 1))
        })
    }
}

impl Basis for Uniform {
    fn nodes(&self, count: usize) -> Vec<f64> {
        if count == 1 {
            return vec![0.0];
        }
        let step = 2.0 / (count - 1) as f64;
        (0..count)
            .map(|i| (-1.0 + i as f64 * step).clamp(-1.0, 1.0))
            .collect()
    }

    fn values<T: Numeric>(&self, degree: usize, x: &T) -> Vec<T> {
        let mut values = Vec::with_capacity(degree + 1);
        values.push(T::one());
        for k in 0..degree {
            let next = values[k].clone() * x.clone();
            values.push(next);
        }
        values
    }

    fn derivatives(&self, degree: usize, x: f64) -> Vec<f64> {
        let values = self.values(degree, &x);
        (0..=degree)
            .map(|k| if k == 0 { 0.0 } else { k as f64 * values[k - 1] })
            .collect()
    }

    fn monomial_table(&self, degree: usize) -> Vec<Vec<BigRational>> {
        (0..=degree)
            .map(|k| {
                let mut row = vec![BigRational::zero(); k + 1];
                row[k] = rational(1, 1);
                row
            })
            .collect()
    }
}

fn rational(numer: i64, denom: i64) -> BigRational {
    BigRational::new(BigInt::from(numer), BigInt::from(denom))
}

/// Monomial coefficients of a family with `φ_0 = 1`, `φ_1 = x` and
/// `φ_{k+1} = a_k x φ_k - b_k φ_{k-1}`, where `coeffs(k) = (a_k, b_k)`.
fn three_term_table(
    degree: usize,
    coeffs: impl Fn(usize) -> (BigRational, BigRational),
) -> Vec<Vec<BigRational>> {
    let mut table: Vec<Vec<BigRational>> = Vec::with_capacity(degree + 1);
    table.push(vec![rational(1, 1)]);
    if degree >= 1 {
        table.push(vec![BigRational::zero(), rational(1, 1)]);
    }
    for k in 1..degree {
        let (a, b) = coeffs(k);
        let mut next = vec![BigRational::zero(); k + 2];
        for (j, c) in table[k].iter().enumerate() {
            next[j + 1] += &a * c;
        }
        for (j, c) in table[k - 1].iter().enumerate() {
            next[j] -= &b * c;
        }
        table.push(next);
    }
    table
}

/// The `i`-th root of `P_n`, by Newton iteration from the usual cosine estimate.
fn gauss_legendre_root(n: usize, i: usize) -> f64 {
    let mut x = (PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();
    for _ in 0..100 {
        let (p, p_prev) = legendre_pair(n, x);
        let dp = n as f64 * (x * p - p_prev) / (x * x - 1.0);
        let dx = p / dp;
        x -= dx;
        if dx.abs() < 1e-16 {
            break;
        }
    }
    x.clamp(-1.0, 1.0)
}

/// `(P_n(x), P_{n-1}(x))`
fn legendre_pair(n: usize, x: f64) -> (f64, f64) {
    let mut p_prev = 1.0;
    let mut p = x;
    for k in 1..n {
        let k = k as f64;
        let next = ((2.0 * k + 1.0) * x * p - k * p_prev) / (k + 1.0);
        p_prev = p;
        p = next;
    }
    (p, p_prev)
}
