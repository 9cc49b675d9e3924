use rayon::prelude::*;

use crate::{
    CritcoolError, CriticalPointRecord, DomainConfig, Objective, Solution, evaluate_at,
    evaluator::norm, finite_difference_gradient,
};

/// Turn solver solutions into candidate critical points of the true objective.
///
/// Solutions with an imaginary part above the configured tolerance are dropped, the
/// rest are mapped from normalized to actual coordinates, and anything outside the
/// sampled box (beyond the domain slack) is discarded. Survivors are evaluated on the
/// true objective, never on the polynomial; a failure there is fatal.
pub fn postprocess(
    config: &DomainConfig,
    solutions: &[Solution],
    objective: &dyn Objective,
) -> Result<Vec<CriticalPointRecord>, CritcoolError> {
    let tolerance = config.imaginary_tolerance();
    let real: Vec<Vec<f64>> = solutions
        .iter()
        .filter(|s| s.is_real(tolerance))
        .map(Solution::real_part)
        .collect();
    let real_count = real.len();

    let in_domain: Vec<Vec<f64>> = real
        .into_iter()
        .filter(|u| u.len() == config.dim())
        .map(|u| config.to_actual(&u))
        .filter(|x| config.contains(x))
        .collect();

    log::info!(
        "Post-processing kept {} of {} solutions ({} real)",
        in_domain.len(),
        solutions.len(),
        real_count
    );

    let step = config.refine().step;
    in_domain
        .into_par_iter()
        .map(|coords| {
            let value = evaluate_at(objective, &coords)?;
            let gradient = finite_difference_gradient(objective, &coords, step)?;
            Ok(CriticalPointRecord::new(coords, value, norm(&gradient)))
        })
        .collect()
}
