//! One pipeline instance end to end, and independent instances in parallel.
use rayon::prelude::*;

use crate::{
    CritcoolError, CriticalPointRecord, CriticalPointSolver, DomainConfig, GradientSystem, Grid,
    Objective, PolynomialApproximant, SolveOutcome, SubdivisionSolver, Warning, classify_records,
    deduplicate, expand, postprocess, refine_candidates,
};

/// Everything one instance produced.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub approximant: PolynomialApproximant,
    /// Refined, de-duplicated and (when enabled) classified critical points, sorted by
    /// objective value.
    pub points: Vec<CriticalPointRecord>,
    /// The captured points that are minima. Without classification, every captured
    /// point, capture itself requiring a positive definite Hessian.
    pub minimizers: Vec<CriticalPointRecord>,
    pub warnings: Vec<Warning>,
}

/// A single (config, degree) instance. Stages run strictly in order.
pub struct Pipeline<'a> {
    config: &'a DomainConfig,
    solver: Option<&'a dyn CriticalPointSolver>,
    grid: Option<&'a Grid>,
}

impl<'a> Pipeline<'a> {
    /// A pipeline using the built-in [`SubdivisionSolver`] and the grid described by
    /// `config`.
    pub fn new(config: &'a DomainConfig) -> Self {
        Self {
            config,
            solver: None,
            grid: None,
        }
    }

    pub fn with_solver(mut self, solver: &'a dyn CriticalPointSolver) -> Self {
        self.solver = Some(solver);
        self
    }

    /// Sample on `grid` instead of building one from the config.
    pub fn with_grid(mut self, grid: &'a Grid) -> Self {
        self.grid = Some(grid);
        self
    }

    pub fn run(&self, objective: &dyn Objective) -> Result<PipelineOutput, CritcoolError> {
        let config = self.config;

        let fit = match self.grid {
            Some(grid) => PolynomialApproximant::fit_on_grid(config, grid, objective)?,
            None => PolynomialApproximant::fit(config, objective)?,
        };
        let approximant = fit.approximant;
        let mut warnings = fit.warnings;

        let poly = expand(&approximant, config.tiers())?;
        let system = GradientSystem::from_polynomial(&poly);

        let default_solver;
        let solver: &dyn CriticalPointSolver = match self.solver {
            Some(solver) => solver,
            None => {
                default_solver = SubdivisionSolver::new(*config.solver());
                &default_solver
            }
        };
        let solutions = match solver.solve(&system)? {
            SolveOutcome::Solved(solutions) => solutions,
            SolveOutcome::TimedOut { elapsed } => {
                Warning::SolverTimeout { elapsed }.emit(&mut warnings);
                Vec::new()
            }
        };

        let candidates = postprocess(config, &solutions, objective)?;
        let refined = refine_candidates(config, objective, candidates, &mut warnings)?;
        let mut points = deduplicate(refined, config.cluster_tolerance());

        if config.classify().enabled {
            classify_records(objective, &mut points, config.classify(), &mut warnings);
        }

        let minimizers: Vec<CriticalPointRecord> = points
            .iter()
            .filter(|p| p.captured && (p.classification.is_none() || p.is_minimum()))
            .cloned()
            .collect();

        log::info!(
            "Pipeline found {} critical points, {} minimizers, {} warnings",
            points.len(),
            minimizers.len(),
            warnings.len()
        );
        Ok(PipelineOutput {
            approximant,
            points,
            minimizers,
            warnings,
        })
    }
}

/// Run independent instances in parallel, one result per config, in order.
pub fn run_sweep(
    configs: &[DomainConfig],
    objective: &dyn Objective,
) -> Vec<Result<PipelineOutput, CritcoolError>> {
    configs
        .par_iter()
        .map(|config| Pipeline::new(config).run(objective))
        .collect()
}
