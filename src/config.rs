//! Immutable description of one pipeline instance: the sampled box, the grid, the
//! polynomial degree policy, precision handling and the tolerances of every stage.
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{BasisKind, CritcoolError, PrecisionMode, PrecisionTiers, invalid_config};

/// Largest polynomial degree accepted in any variable.
pub const MAX_DEGREE: usize = 40;

/// Polynomial degree policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DegreeSpec {
    /// Total degree: every multi-index with `|α| <= d`.
    Fixed(usize),

    /// Tensor degree: every multi-index with `α_i <= d_i`.
    PerDimension(Vec<usize>),

    /// Raise the total degree from `start` until the approximation error drops below
    /// `tolerance`, giving up (with a warning) after `max_degree`.
    Adaptive {
        tolerance: f64,
        start: usize,
        max_degree: usize,
    },
}

impl DegreeSpec {
    /// Highest degree the policy may use in any single variable.
    pub fn max_degree(&self) -> usize {
        match self {
            DegreeSpec::Fixed(d) => *d,
            DegreeSpec::PerDimension(ds) => ds.iter().copied().max().unwrap_or(0),
            DegreeSpec::Adaptive { max_degree, .. } => *max_degree,
        }
    }
}

/// Settings of the polynomial system solver.
///
/// ### Default Values
/// - `tolerance`: `1e-8` (box side length in normalized coordinates)
/// - `max_iterations`: `500_000`
/// - `timeout`: `60s`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverSettings {
    pub tolerance: f64,
    pub max_iterations: usize,
    pub timeout: Option<Duration>,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            tolerance: 1e-8,
            max_iterations: 500_000,
            timeout: Some(Duration::from_secs(60)),
        }
    }
}

/// Settings of the local minimizer that refines every candidate point.
///
/// ### Default Values
/// - `max_iterations`: `200`
/// - `gradient_tolerance`: `1e-8`
/// - `step`: `1e-6` (relative central difference step)
/// - `time_budget`: `10s` per candidate
/// - `capture_radius`: `5e-2`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RefineSettings {
    pub max_iterations: usize,
    pub gradient_tolerance: f64,
    pub step: f64,
    pub time_budget: Option<Duration>,
    /// A candidate whose local minimizer ends within this distance of it is
    /// captured, and takes the minimizer's coordinates.
    pub capture_radius: f64,
}

impl Default for RefineSettings {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            gradient_tolerance: 1e-8,
            step: 1e-6,
            time_budget: Some(Duration::from_secs(10)),
            capture_radius: 5e-2,
        }
    }
}

/// Settings of the Hessian based classification.
///
/// ### Default Values
/// - `enabled`: `true`
/// - `zero_tolerance`: `1e-8`
/// - `step`: `1e-4` (relative second difference step)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassifySettings {
    pub enabled: bool,
    pub zero_tolerance: f64,
    pub step: f64,
}

impl Default for ClassifySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            zero_tolerance: 1e-8,
            step: 1e-4,
        }
    }
}

/// Everything a pipeline instance needs, validated once and never mutated.
///
/// Build one with [`DomainConfig::builder`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainConfig {
    dim: usize,
    center: Vec<f64>,
    radius: Vec<f64>,
    nodes: Vec<usize>,
    basis: BasisKind,
    precision: PrecisionMode,
    tiers: PrecisionTiers,
    degree: DegreeSpec,
    sparsify: Option<f64>,
    cluster_tolerance: f64,
    condition_alarm: f64,
    imaginary_tolerance: f64,
    domain_slack: f64,
    solver: SolverSettings,
    refine: RefineSettings,
    classify: ClassifySettings,
}

impl DomainConfig {
    pub fn builder(dim: usize) -> DomainConfigBuilder {
        DomainConfigBuilder::new(dim)
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn center(&self) -> &[f64] {
        &self.center
    }

    /// Per-dimension half width of the sampled box.
    pub fn radius(&self) -> &[f64] {
        &self.radius
    }

    /// Per-dimension node count of the sample grid.
    pub fn nodes(&self) -> &[usize] {
        &self.nodes
    }

    pub fn basis(&self) -> BasisKind {
        self.basis
    }

    pub fn precision(&self) -> PrecisionMode {
        self.precision
    }

    pub fn tiers(&self) -> &PrecisionTiers {
        &self.tiers
    }

    pub fn degree(&self) -> &DegreeSpec {
        &self.degree
    }

    /// Threshold below which fitted coefficients are zeroed, when enabled.
    pub fn sparsify(&self) -> Option<f64> {
        self.sparsify
    }

    /// Distance below which refined points are merged.
    pub fn cluster_tolerance(&self) -> f64 {
        self.cluster_tolerance
    }

    /// Vandermonde condition number above which an ill-conditioning warning is raised.
    pub fn condition_alarm(&self) -> f64 {
        self.condition_alarm
    }

    /// Relative imaginary magnitude above which a solver solution counts as non-real.
    pub fn imaginary_tolerance(&self) -> f64 {
        self.imaginary_tolerance
    }

    /// Absolute slack allowed on the sampled box boundary.
    pub fn domain_slack(&self) -> f64 {
        self.domain_slack
    }

    pub fn solver(&self) -> &SolverSettings {
        &self.solver
    }

    pub fn refine(&self) -> &RefineSettings {
        &self.refine
    }

    pub fn classify(&self) -> &ClassifySettings {
        &self.classify
    }

    /// Map a point of `[-1, 1]^n` into the sampled box.
    pub fn to_actual(&self, normalized: &[f64]) -> Vec<f64> {
        normalized
            .iter()
            .zip(self.center.iter().zip(&self.radius))
            .map(|(u, (c, r))| c + r * u)
            .collect()
    }

    /// Map a point of the sampled box into `[-1, 1]^n`.
    pub fn to_normalized(&self, actual: &[f64]) -> Vec<f64> {
        actual
            .iter()
            .zip(self.center.iter().zip(&self.radius))
            .map(|(x, (c, r))| (x - c) / r)
            .collect()
    }

    /// Whether `point` lies in the sampled box, up to the configured slack.
    pub fn contains(&self, point: &[f64]) -> bool {
        point.len() == self.dim
            && point
                .iter()
                .zip(self.center.iter().zip(&self.radius))
                .all(|(x, (c, r))| (x - c).abs() <= r + self.domain_slack)
    }

    /// A copy with another degree policy, for degree sweeps over one domain.
    pub fn with_degree(&self, degree: DegreeSpec) -> Result<DomainConfig, CritcoolError> {
        validate_degree(self.dim, &degree)?;
        Ok(DomainConfig {
            degree,
            ..self.clone()
        })
    }
}

enum PerDim<T> {
    All(T),
    Each(Vec<T>),
}

impl<T: Clone> PerDim<T> {
    fn expand(self, dim: usize, what: &str) -> Result<Vec<T>, CritcoolError> {
        match self {
            PerDim::All(v) => Ok(vec![v; dim]),
            PerDim::Each(vs) if vs.len() == dim => Ok(vs),
            PerDim::Each(vs) => Err(invalid_config(format!(
                "{what} has {} entries for dimension {dim}",
                vs.len()
            ))),
        }
    }
}

/// A convenience builder for [`DomainConfig`], called via [`DomainConfig::builder`].
pub struct DomainConfigBuilder {
    dim: usize,
    center: Option<Vec<f64>>,
    radius: PerDim<f64>,
    nodes: Option<PerDim<usize>>,
    basis: BasisKind,
    precision: PrecisionMode,
    tiers: PrecisionTiers,
    degree: DegreeSpec,
    sparsify: Option<f64>,
    cluster_tolerance: f64,
    condition_alarm: f64,
    imaginary_tolerance: f64,
    domain_slack: f64,
    solver: SolverSettings,
    refine: RefineSettings,
    classify: ClassifySettings,
}

impl DomainConfigBuilder {
    fn new(dim: usize) -> Self {
        Self {
            dim,
            center: None,
            radius: PerDim::All(1.0),
            nodes: None,
            basis: BasisKind::Chebyshev,
            precision: PrecisionMode::default(),
            tiers: PrecisionTiers::default(),
            degree: DegreeSpec::Fixed(4),
            sparsify: None,
            cluster_tolerance: 1e-4,
            condition_alarm: 1e12,
            imaginary_tolerance: 1e-8,
            domain_slack: 1e-10,
            solver: SolverSettings::default(),
            refine: RefineSettings::default(),
            classify: ClassifySettings::default(),
        }
    }

    /// Center of the sampled box. Defaults to the origin.
    pub fn center(mut self, center: Vec<f64>) -> Self {
        self.center = Some(center);
        self
    }

    /// Same half width in every dimension. Defaults to `1.0`.
    pub fn radius(mut self, radius: f64) -> Self {
        self.radius = PerDim::All(radius);
        self
    }

    pub fn radius_per_dim(mut self, radius: Vec<f64>) -> Self {
        self.radius = PerDim::Each(radius);
        self
    }

    /// Same node count in every dimension. Defaults to `2 * (max_degree + 1)`.
    pub fn nodes(mut self, nodes: usize) -> Self {
        self.nodes = Some(PerDim::All(nodes));
        self
    }

    pub fn nodes_per_dim(mut self, nodes: Vec<usize>) -> Self {
        self.nodes = Some(PerDim::Each(nodes));
        self
    }

    pub fn basis(mut self, basis: BasisKind) -> Self {
        self.basis = basis;
        self
    }

    pub fn precision(mut self, precision: PrecisionMode) -> Self {
        self.precision = precision;
        self
    }

    pub fn tiers(mut self, tiers: PrecisionTiers) -> Self {
        self.tiers = tiers;
        self
    }

    pub fn degree(mut self, degree: DegreeSpec) -> Self {
        self.degree = degree;
        self
    }

    /// Zero every fitted coefficient with magnitude below `threshold`.
    pub fn sparsify(mut self, threshold: f64) -> Self {
        self.sparsify = Some(threshold);
        self
    }

    pub fn cluster_tolerance(mut self, tolerance: f64) -> Self {
        self.cluster_tolerance = tolerance;
        self
    }

    pub fn condition_alarm(mut self, threshold: f64) -> Self {
        self.condition_alarm = threshold;
        self
    }

    pub fn imaginary_tolerance(mut self, tolerance: f64) -> Self {
        self.imaginary_tolerance = tolerance;
        self
    }

    pub fn domain_slack(mut self, slack: f64) -> Self {
        self.domain_slack = slack;
        self
    }

    pub fn solver(mut self, solver: SolverSettings) -> Self {
        self.solver = solver;
        self
    }

    pub fn refine(mut self, refine: RefineSettings) -> Self {
        self.refine = refine;
        self
    }

    pub fn classify(mut self, classify: ClassifySettings) -> Self {
        self.classify = classify;
        self
    }

    /// Validate and freeze the configuration.
    pub fn build(self) -> Result<DomainConfig, CritcoolError> {
        let dim = self.dim;
        if dim == 0 {
            return Err(invalid_config("dimension must be at least 1"));
        }

        let center = self.center.unwrap_or_else(|| vec![0.0; dim]);
        if center.len() != dim {
            return Err(invalid_config(format!(
                "center has {} entries for dimension {dim}",
                center.len()
            )));
        }
        if center.iter().any(|c| !c.is_finite()) {
            return Err(invalid_config("center must be finite"));
        }

        let radius = self.radius.expand(dim, "radius")?;
        if radius.iter().any(|r| !r.is_finite() || *r <= 0.0) {
            return Err(invalid_config("radius must be finite and positive"));
        }

        validate_degree(dim, &self.degree)?;

        let default_nodes = 2 * (self.degree.max_degree() + 1);
        let nodes = self
            .nodes
            .unwrap_or(PerDim::All(default_nodes))
            .expand(dim, "node count")?;
        if let Some(bad) = nodes.iter().find(|&&n| n < 1) {
            return Err(invalid_config(format!("node count {bad} is below 1")));
        }

        if let Some(threshold) = self.sparsify {
            if !threshold.is_finite() || threshold < 0.0 {
                return Err(invalid_config("sparsification threshold must be >= 0"));
            }
        }
        let tolerances = [
            ("cluster tolerance", self.cluster_tolerance),
            ("condition alarm", self.condition_alarm),
            ("imaginary tolerance", self.imaginary_tolerance),
            ("domain slack", self.domain_slack),
            ("solver tolerance", self.solver.tolerance),
            ("gradient tolerance", self.refine.gradient_tolerance),
            ("refinement step", self.refine.step),
            ("capture radius", self.refine.capture_radius),
            ("classification zero tolerance", self.classify.zero_tolerance),
            ("hessian step", self.classify.step),
        ];
        for (name, value) in tolerances {
            if !(value >= 0.0) {
                return Err(invalid_config(format!("{name} must be >= 0, got {value}")));
            }
        }
        if self.refine.step == 0.0 || self.classify.step == 0.0 || self.solver.tolerance == 0.0 {
            return Err(invalid_config("step sizes and solver tolerance must be positive"));
        }

        Ok(DomainConfig {
            dim,
            center,
            radius,
            nodes,
            basis: self.basis,
            precision: self.precision,
            tiers: self.tiers,
            degree: self.degree,
            sparsify: self.sparsify,
            cluster_tolerance: self.cluster_tolerance,
            condition_alarm: self.condition_alarm,
            imaginary_tolerance: self.imaginary_tolerance,
            domain_slack: self.domain_slack,
            solver: self.solver,
            refine: self.refine,
            classify: self.classify,
        })
    }
}

fn validate_degree(dim: usize, degree: &DegreeSpec) -> Result<(), CritcoolError> {
    match degree {
        DegreeSpec::Fixed(_) => {}
        DegreeSpec::PerDimension(ds) => {
            if ds.len() != dim {
                return Err(invalid_config(format!(
                    "per-dimension degree has {} entries for dimension {dim}",
                    ds.len()
                )));
            }
        }
        DegreeSpec::Adaptive {
            tolerance,
            start,
            max_degree,
        } => {
            if !(*tolerance > 0.0) {
                return Err(invalid_config("adaptive tolerance must be positive"));
            }
            if start > max_degree {
                return Err(invalid_config(format!(
                    "adaptive start degree {start} exceeds ceiling {max_degree}"
                )));
            }
        }
    }
    if degree.max_degree() > MAX_DEGREE {
        return Err(invalid_config(format!(
            "degree {} exceeds the supported maximum {MAX_DEGREE}",
            degree.max_degree()
        )));
    }
    Ok(())
}
