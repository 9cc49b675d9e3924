//! Orthogonal to monomial basis conversion.
//!
//! Each basis element `Π_d φ_{α_d}(u_d)` is expanded through the exact monomial tables
//! of its one-dimensional factors, and the weighted sum is accumulated in the numeric
//! type picked by the approximant's [`PrecisionMode`]. Only the final monomial
//! coefficients are rounded back to `f64`.
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use num_rational::BigRational;

use crate::{
    Basis, CritcoolError, Exponents, Monomial, MultivarPoly, Numeric, PolynomialApproximant,
    PrecisionMode, PrecisionTiers, gridex_incl,
};

/// Expand `approximant` into an equivalent monomial polynomial in normalized
/// coordinates.
///
/// ```rust
/// use critcool::{BasisKind, DegreeSpec, DomainConfig, PolynomialApproximant, expand};
///
/// let config = DomainConfig::builder(1)
///     .nodes(6)
///     .degree(DegreeSpec::Fixed(3))
///     .basis(BasisKind::Chebyshev)
///     .build()
///     .unwrap();
/// // T_3(x) = 4x^3 - 3x
/// let t3 = |x: &[f64]| 4.0 * x[0].powi(3) - 3.0 * x[0];
/// let fit = PolynomialApproximant::fit(&config, &t3).unwrap();
/// let poly = expand(&fit.approximant, config.tiers()).unwrap();
///
/// assert!((poly.coeff(&[3]) - 4.0).abs() < 1e-12);
/// assert!((poly.coeff(&[1]) + 3.0).abs() < 1e-12);
/// ```
pub fn expand(
    approximant: &PolynomialApproximant,
    tiers: &PrecisionTiers,
) -> Result<MultivarPoly, CritcoolError> {
    let poly = match approximant.precision() {
        PrecisionMode::Working => expand_as(approximant, |c| c),
        PrecisionMode::Tiered => {
            expand_as(approximant, |c| tiers.elevate(c)).map_coeffs(Numeric::to_f64)
        }
        PrecisionMode::ExactRational => {
            expand_as(approximant, <BigRational as Numeric>::from_f64).map_coeffs(Numeric::to_f64)
        }
    };

    if let Some(bad) = poly.terms().find(|m| !m.coeff().is_finite()) {
        return Err(CritcoolError::AlgorithmError {
            message: format!("expanded coefficient of {:?} is not finite", bad.exp()),
        });
    }
    log::info!(
        "Expanded {} {:?} coefficients into {} monomials, l1 norm {:.3e} ({:?})",
        approximant.coeffs().len(),
        approximant.basis(),
        poly.len(),
        poly.l1_norm(),
        approximant.precision()
    );
    Ok(poly)
}

/// Expansion carried out entirely in `T`. Every working coefficient is lifted with
/// `lift`, and the basis tables are rounded to the precision of the lifted value.
pub fn expand_as<T: Numeric>(
    approximant: &PolynomialApproximant,
    lift: impl Fn(f64) -> T,
) -> MultivarPoly<T> {
    let support = approximant.support();
    let max_degree = support.max_degrees().into_iter().max().unwrap_or(0);
    let table = approximant.basis().monomial_table(max_degree);

    let mut accumulator: BTreeMap<Exponents, T> = BTreeMap::new();
    for (alpha, &c) in support.iter().zip(approximant.coeffs().iter()) {
        if c == 0.0 {
            continue;
        }
        let coeff = lift(c);
        // rows[d][k]: coefficient of u_d^k in φ_{α_d}
        let rows: Vec<Vec<T>> = alpha
            .iter()
            .map(|&a| {
                table[a as usize]
                    .iter()
                    .map(|r| T::from_rational(r, &coeff))
                    .collect()
            })
            .collect();

        'terms: for beta in gridex_incl(alpha.as_slice()) {
            let mut term = coeff.clone();
            for (row, &b) in rows.iter().zip(&beta) {
                let factor = &row[b as usize];
                // Parity zeros of the orthogonal families.
                if factor.is_zero() {
                    continue 'terms;
                }
                term = term * factor.clone();
            }
            match accumulator.entry(beta) {
                Entry::Vacant(entry) => {
                    entry.insert(term);
                }
                Entry::Occupied(mut entry) => {
                    let sum = entry.get().clone() + term;
                    *entry.get_mut() = sum;
                }
            }
        }
    }

    let terms = accumulator
        .into_iter()
        .filter(|(_, coeff)| !coeff.is_zero())
        .map(|(exp, coeff)| Monomial::new(coeff, &exp))
        .collect();
    MultivarPoly::from_sorted(support.dim(), terms)
}

#[cfg(test)]
mod tests {
    use assertables::{assert_le, assert_lt, assert_ok};
    use pretty_assertions as pa;

    use super::*;
    use crate::{BasisKind, DegreeSpec, DomainConfig, test_utils::random_points};

    const KINDS: [BasisKind; 3] = [BasisKind::Chebyshev, BasisKind::Legendre, BasisKind::Uniform];
    const MODES: [PrecisionMode; 3] = [
        PrecisionMode::Working,
        PrecisionMode::Tiered,
        PrecisionMode::ExactRational,
    ];

    fn wavy(x: &[f64]) -> f64 {
        let waves: f64 = x
            .iter()
            .enumerate()
            .map(|(d, v)| ((d + 1) as f64 * v + 0.3).sin())
            .sum();
        waves + x.iter().product::<f64>()
    }

    fn fit(
        dim: usize,
        degree: usize,
        basis: BasisKind,
        precision: PrecisionMode,
    ) -> PolynomialApproximant {
        let config = assert_ok!(
            DomainConfig::builder(dim)
                .center(vec![0.25; dim])
                .radius(0.8)
                .degree(DegreeSpec::Fixed(degree))
                .nodes(degree + 2)
                .basis(basis)
                .precision(precision)
                .build()
        );
        assert_ok!(PolynomialApproximant::fit(&config, &wavy)).approximant
    }

    #[test]
    fn chebyshev_element_expands_exactly() {
        let config = assert_ok!(
            DomainConfig::builder(2)
                .nodes(6)
                .degree(DegreeSpec::Fixed(4))
                .build()
        );
        // T_2(x) T_1(y) = 2x^2 y - y
        let f = |x: &[f64]| (2.0 * x[0] * x[0] - 1.0) * x[1];
        let approx = assert_ok!(PolynomialApproximant::fit(&config, &f)).approximant;
        let poly = assert_ok!(expand(&approx, config.tiers()));

        assert_lt!((poly.coeff(&[2, 1]) - 2.0).abs(), 1e-12);
        assert_lt!((poly.coeff(&[0, 1]) + 1.0).abs(), 1e-12);
        for m in poly.terms() {
            if m.exp() != [2, 1] && m.exp() != [0, 1] {
                assert_lt!(m.coeff().abs(), 1e-12, "{m:?}");
            }
        }
    }

    #[test]
    fn expansion_matches_orthogonal_form() {
        crate::test_utils::init_test_logger();

        for (dim, degrees) in [(1, vec![2, 5, 10]), (2, vec![4, 8]), (3, vec![3, 6])] {
            for &degree in &degrees {
                for kind in KINDS {
                    for mode in MODES {
                        let approx = fit(dim, degree, kind, mode);
                        let tiers = PrecisionTiers::default();
                        let poly = assert_ok!(expand(&approx, &tiers));
                        let tol = tolerance(&approx, &poly, &tiers);

                        for u in random_points(dim, 25, degree as u64) {
                            let orthogonal = approx.eval_normalized(&u);
                            let monomial = poly.eval(&u);
                            assert_le!(
                                (orthogonal - monomial).abs(),
                                tol,
                                "dim={dim} degree={degree} {kind:?} {mode:?} at {u:?}"
                            );
                        }
                    }
                }
            }
        }
    }

    fn tolerance(approx: &PolynomialApproximant, poly: &MultivarPoly, tiers: &PrecisionTiers) -> f64 {
        let l1 = approx.coeffs().iter().map(|c| c.abs()).sum::<f64>();
        approx
            .precision()
            .expansion_tolerance(tiers, approx.support().total(), l1, poly.l1_norm())
    }

    #[test]
    fn round_trip_catches_perturbed_expansion() {
        let tiers = PrecisionTiers::default();
        for (dim, degree) in [(1, 12), (2, 8)] {
            let approx = fit(dim, degree, BasisKind::Chebyshev, PrecisionMode::Tiered);
            let poly = assert_ok!(expand(&approx, &tiers));
            let tol = tolerance(&approx, &poly, &tiers);
            let perturbed = poly.map_coeffs(|c| c * (1.0 + 1e-8));

            let worst = random_points(dim, 25, 7)
                .iter()
                .map(|u| (approx.eval_normalized(u) - perturbed.eval(u)).abs())
                .fold(0.0, f64::max);
            assert_lt!(tol, worst, "dim={dim} degree={degree}");
        }
    }

    #[test]
    fn tiered_agrees_with_exact() {
        for kind in [BasisKind::Chebyshev, BasisKind::Legendre] {
            let tiered = fit(2, 8, kind, PrecisionMode::Tiered);
            let exact = fit(2, 8, kind, PrecisionMode::ExactRational);
            pa::assert_eq!(tiered.coeffs(), exact.coeffs());

            let tiers = PrecisionTiers::default();
            let tiered = assert_ok!(expand(&tiered, &tiers));
            let exact = assert_ok!(expand(&exact, &tiers));
            for m in exact.terms() {
                let t = tiered.coeff(m.exp());
                assert_le!(
                    (t - m.coeff()).abs(),
                    4.0 * f64::EPSILON * m.coeff().abs().max(1e-300),
                    "{kind:?} {:?}",
                    m.exp()
                );
            }
        }
    }

    #[test]
    fn elevated_arithmetic_stays_in_type() {
        let approx = fit(1, 4, BasisKind::Legendre, PrecisionMode::Tiered);
        let tiers = PrecisionTiers::default();
        let elevated = expand_as(&approx, |c| tiers.elevate(c));
        assert!(elevated.terms().all(|m| m.coeff().precision() >= 128));
        let exact = expand_as(&approx, <BigRational as Numeric>::from_f64);
        pa::assert_eq!(exact.len(), elevated.len());
    }
}
