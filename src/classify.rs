//! Hessian based classification of critical points.
use nalgebra::{DMatrix, SymmetricEigen};

use crate::{
    Classification, ClassifySettings, CritcoolError, CriticalPointRecord, HessianSummary,
    Objective, Warning, evaluate_at,
};

/// Central difference Hessian of `objective` at `x`, symmetrised. The step in
/// dimension `i` is `step * max(1, |x_i|)`.
pub fn hessian(objective: &dyn Objective, x: &[f64], step: f64) -> Result<DMatrix<f64>, CritcoolError> {
    let n = x.len();
    let h: Vec<f64> = x.iter().map(|xi| step * xi.abs().max(1.0)).collect();
    let mut shifted = x.to_vec();
    let mut eval_shifted = |shifts: &[(usize, f64)]| {
        for &(i, s) in shifts {
            shifted[i] += s;
        }
        let value = evaluate_at(objective, &shifted);
        shifted.copy_from_slice(x);
        value
    };

    let center = evaluate_at(objective, x)?;
    let mut hess = DMatrix::zeros(n, n);
    for i in 0..n {
        let plus = eval_shifted(&[(i, h[i])])?;
        let minus = eval_shifted(&[(i, -h[i])])?;
        hess[(i, i)] = (plus - 2.0 * center + minus) / (h[i] * h[i]);

        for j in 0..i {
            let pp = eval_shifted(&[(i, h[i]), (j, h[j])])?;
            let pm = eval_shifted(&[(i, h[i]), (j, -h[j])])?;
            let mp = eval_shifted(&[(i, -h[i]), (j, h[j])])?;
            let mm = eval_shifted(&[(i, -h[i]), (j, -h[j])])?;
            let mixed = (pp - pm - mp + mm) / (4.0 * h[i] * h[j]);
            hess[(i, j)] = mixed;
            hess[(j, i)] = mixed;
        }
    }
    Ok(hess)
}

/// Sign pattern of the eigenvalues beyond `±zero_tolerance`.
pub fn classify_eigenvalues(eigenvalues: &[f64], zero_tolerance: f64) -> Classification {
    if eigenvalues.is_empty() || eigenvalues.iter().any(|l| !l.is_finite()) {
        return Classification::Degenerate;
    }
    if eigenvalues.iter().any(|l| l.abs() <= zero_tolerance) {
        return Classification::Degenerate;
    }
    let positive = eigenvalues.iter().filter(|&&l| l > 0.0).count();
    match positive {
        p if p == eigenvalues.len() => Classification::Minimum,
        0 => Classification::Maximum,
        _ => Classification::Saddle,
    }
}

pub fn summarize(hess: &DMatrix<f64>) -> HessianSummary {
    let mut eigenvalues: Vec<f64> = SymmetricEigen::new(hess.clone()).eigenvalues.iter().copied().collect();
    eigenvalues.sort_by(f64::total_cmp);

    let min_eigenvalue = eigenvalues.first().copied().unwrap_or(f64::NAN);
    let max_eigenvalue = eigenvalues.last().copied().unwrap_or(f64::NAN);
    let smallest = eigenvalues.iter().fold(f64::INFINITY, |m, l| m.min(l.abs()));
    let largest = eigenvalues.iter().fold(0.0f64, |m, l| m.max(l.abs()));
    let condition_number = if smallest > 0.0 {
        largest / smallest
    } else {
        f64::INFINITY
    };

    HessianSummary {
        determinant: eigenvalues.iter().product(),
        trace: hess.trace(),
        min_eigenvalue,
        max_eigenvalue,
        condition_number,
        eigenvalues,
    }
}

/// Classify the point at `coords`. Objective failures become
/// [`Classification::Error`] without a summary.
pub fn classify_point(
    objective: &dyn Objective,
    coords: &[f64],
    settings: &ClassifySettings,
) -> (Classification, Option<HessianSummary>) {
    let hess = match hessian(objective, coords, settings.step) {
        Ok(hess) => hess,
        Err(err) => {
            log::debug!("Hessian evaluation failed at {coords:?}: {err}");
            return (Classification::Error, None);
        }
    };
    if hess.iter().any(|v| !v.is_finite()) {
        return (Classification::Degenerate, None);
    }
    let summary = summarize(&hess);
    let class = classify_eigenvalues(&summary.eigenvalues, settings.zero_tolerance);
    (class, Some(summary))
}

/// Classify every record in place, flagging degenerate and failed points.
pub fn classify_records(
    objective: &dyn Objective,
    records: &mut [CriticalPointRecord],
    settings: &ClassifySettings,
    warnings: &mut Vec<Warning>,
) {
    for (index, record) in records.iter_mut().enumerate() {
        let (class, summary) = classify_point(objective, &record.coords, settings);
        if matches!(class, Classification::Degenerate | Classification::Error) {
            Warning::DegenerateClassification { index }.emit(warnings);
        }
        record.classification = Some(class);
        record.hessian = summary;
    }
}

#[cfg(test)]
mod tests {
    use assertables::{assert_lt, assert_ok};
    use pretty_assertions as pa;

    use super::*;
    use crate::{Undefined, test_functions};

    #[test]
    fn hessian_of_quadratic() {
        let f = |x: &[f64]| 2.0 * x[0] * x[0] - x[0] * x[1] + 0.5 * x[1] * x[1];
        let hess = assert_ok!(hessian(&f, &[0.3, -0.7], 1e-4));
        let expected = DMatrix::from_row_slice(2, 2, &[4.0, -1.0, -1.0, 1.0]);
        assert_lt!((hess - expected).abs().max(), 1e-6);
    }

    #[test]
    fn sphere_origin_is_minimum() {
        let settings = ClassifySettings::default();
        let (class, summary) = classify_point(&test_functions::sphere, &[0.0, 0.0, 0.0], &settings);
        pa::assert_eq!(class, Classification::Minimum);
        let summary = summary.unwrap();
        assert!(summary.eigenvalues.iter().all(|&l| (l - 2.0).abs() < 1e-6));
        assert_lt!((summary.determinant - 8.0).abs(), 1e-5);
        assert_lt!((summary.trace - 6.0).abs(), 1e-6);
        assert_lt!((summary.condition_number - 1.0).abs(), 1e-6);
    }

    #[test]
    fn saddle_and_maximum() {
        let settings = ClassifySettings::default();
        let (class, summary) = classify_point(&test_functions::saddle_2d, &[0.0, 0.0], &settings);
        pa::assert_eq!(class, Classification::Saddle);
        let summary = summary.unwrap();
        assert_lt!(summary.min_eigenvalue, 0.0);
        assert!(summary.max_eigenvalue > 0.0);

        let cap = |x: &[f64]| -x[0] * x[0] - 3.0 * x[1] * x[1];
        pa::assert_eq!(classify_point(&cap, &[0.0, 0.0], &settings).0, Classification::Maximum);
    }

    #[test]
    fn eigenvalue_rules() {
        pa::assert_eq!(classify_eigenvalues(&[1.0, 2.0], 1e-8), Classification::Minimum);
        pa::assert_eq!(classify_eigenvalues(&[-1.0, -2.0], 1e-8), Classification::Maximum);
        pa::assert_eq!(classify_eigenvalues(&[-1.0, 2.0], 1e-8), Classification::Saddle);
        pa::assert_eq!(classify_eigenvalues(&[1e-9, 2.0], 1e-8), Classification::Degenerate);
        pa::assert_eq!(classify_eigenvalues(&[-1e-8, -2.0], 1e-8), Classification::Degenerate);
        pa::assert_eq!(
            classify_eigenvalues(&[f64::NAN, 2.0], 1e-8),
            Classification::Degenerate
        );
    }

    #[test]
    fn degenerate_points_are_kept_and_flagged() {
        struct Cliff;

        impl Objective for Cliff {
            fn value(&self, x: &[f64]) -> Result<f64, Undefined> {
                if x[0] > 0.5 {
                    return Err(Undefined("off the cliff".into()));
                }
                Ok(x[0].powi(6) + x[1] * x[1])
            }
        }

        let mut records = vec![
            CriticalPointRecord::new(vec![0.0, 0.0], 0.0, 0.0),
            CriticalPointRecord::new(vec![0.5, 0.0], 0.015625, 0.1875),
        ];
        let mut warnings = Vec::new();
        classify_records(&Cliff, &mut records, &ClassifySettings::default(), &mut warnings);

        // x^6 has a vanishing second derivative at the origin.
        pa::assert_eq!(records[0].classification, Some(Classification::Degenerate));
        assert!(records[0].hessian.is_some());
        pa::assert_eq!(records[1].classification, Some(Classification::Error));
        assert!(records[1].hessian.is_none());
        pa::assert_eq!(
            warnings,
            vec![
                Warning::DegenerateClassification { index: 0 },
                Warning::DegenerateClassification { index: 1 }
            ]
        );
    }
}
