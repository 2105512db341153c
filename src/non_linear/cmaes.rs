use anyhow::{Context, Result};
use cmaes_lbfgsb::cmaes::{canonical_cmaes_optimize, CmaesCanonicalConfig};
use cmaes_lbfgsb::lbfgsb_optimize::lbfgsb_optimize;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Deserialize;

use crate::config::Config;
use crate::error::ModelFitError;
use crate::model::ModelMapper;
use crate::non_linear::fitness::Fitness;
use crate::non_linear::initializer::Initializer;
use crate::non_linear::paths::Paths;
use crate::non_linear::result::SearchResult;
use crate::non_linear::run::SearchRun;
use crate::non_linear::{Analysis, NonLinearSearch};

/// Unit vectors are clamped to `[UNIT_EPSILON, 1 - UNIT_EPSILON]` so that
/// Gaussian priors never map to infinity.
const UNIT_EPSILON: f64 = 1e-9;

/// Contents of `non_linear/Cmaes.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct CmaesConfig {
    /// Population size per generation
    #[serde(default = "default_pop_size")]
    pub pop_size: usize,
    /// Maximum generations per run
    #[serde(default = "default_max_gen")]
    pub max_gen: usize,
    /// Tolerance of the L-BFGS-B refinement
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    /// Random seed for reproducibility
    #[serde(default = "default_seed")]
    pub seed: Option<u64>,
    /// Whether to evaluate the population in parallel
    #[serde(default)]
    pub parallel_eval: bool,
    /// Verbosity level (0=silent, 1=minimal, 2=normal)
    #[serde(default)]
    pub verbosity: u8,
    /// Number of IPOP restarts (0 = no IPOP)
    #[serde(default)]
    pub ipop_restarts: usize,
    /// Factor to increase population size in IPOP restarts
    #[serde(default = "default_ipop_increase_factor")]
    pub ipop_increase_factor: f64,
    /// Number of BIPOP restarts (0 = no BIPOP)
    #[serde(default)]
    pub bipop_restarts: usize,
    /// Total function evaluations budget
    #[serde(default = "default_total_evals_budget")]
    pub total_evals_budget: usize,
    #[serde(default)]
    pub use_subrun_budgeting: bool,
    /// Enable L-BFGS-B refinement after CMA-ES?
    #[serde(default = "default_lbfgsb_enabled")]
    pub lbfgsb_enabled: bool,
    #[serde(default = "default_lbfgsb_max_iterations")]
    pub lbfgsb_max_iterations: usize,
    /// Source of the initial distribution centre
    #[serde(default)]
    pub initializer: Initializer,
}

impl Default for CmaesConfig {
    fn default() -> Self {
        Self {
            pop_size: default_pop_size(),
            max_gen: default_max_gen(),
            tolerance: default_tolerance(),
            seed: default_seed(),
            parallel_eval: false,
            verbosity: 0,
            ipop_restarts: 0,
            ipop_increase_factor: default_ipop_increase_factor(),
            bipop_restarts: 0,
            total_evals_budget: default_total_evals_budget(),
            use_subrun_budgeting: false,
            lbfgsb_enabled: default_lbfgsb_enabled(),
            lbfgsb_max_iterations: default_lbfgsb_max_iterations(),
            initializer: Initializer::default(),
        }
    }
}

fn default_pop_size() -> usize {
    20
}

fn default_max_gen() -> usize {
    100
}

fn default_tolerance() -> f64 {
    1e-6
}

fn default_seed() -> Option<u64> {
    Some(123456)
}

fn default_ipop_increase_factor() -> f64 {
    2.0
}

fn default_total_evals_budget() -> usize {
    20000
}

fn default_lbfgsb_enabled() -> bool {
    true
}

fn default_lbfgsb_max_iterations() -> usize {
    200
}

/// CMA-ES global search in the unit hypercube, refined with L-BFGS-B.
///
/// The objective is `-log_likelihood`; non-finite likelihoods score `f64::MAX`.
#[derive(Debug, Clone)]
pub struct Cmaes {
    paths: Paths,
    config: Config,
    settings: CmaesConfig,
}

impl Cmaes {
    pub fn new(paths: Paths, config: &Config) -> Result<Self> {
        let settings = config.non_linear::<CmaesConfig>("Cmaes")?;
        Self::with_settings(paths, config, settings)
    }

    /// Fails with a `Config` error when the initializer ball is empty or
    /// leaves the unit interval.
    pub fn with_settings(paths: Paths, config: &Config, settings: CmaesConfig) -> Result<Self> {
        settings
            .initializer
            .validate()
            .context("invalid initializer in non_linear/Cmaes.toml")?;
        tracing::debug!(search = %paths.name(), ?settings, "creating Cmaes");
        Ok(Self {
            paths,
            config: config.clone(),
            settings,
        })
    }

    pub fn settings(&self) -> &CmaesConfig {
        &self.settings
    }

    fn canonical_config(&self) -> CmaesCanonicalConfig {
        let settings = &self.settings;
        CmaesCanonicalConfig {
            population_size: settings.pop_size,
            max_generations: settings.max_gen,
            seed: settings.seed.unwrap_or(123456),
            c1: None,
            c_mu: None,
            c_sigma: None,
            d_sigma: None,
            parallel_eval: settings.parallel_eval,
            verbosity: settings.verbosity,
            ipop_restarts: settings.ipop_restarts,
            ipop_increase_factor: settings.ipop_increase_factor,
            bipop_restarts: settings.bipop_restarts,
            total_evals_budget: settings.total_evals_budget,
            use_subrun_budgeting: settings.use_subrun_budgeting,
            alpha_mu: None,
            hsig_threshold_factor: None,
            bipop_small_population_factor: None,
            bipop_small_budget_factor: None,
            bipop_large_budget_factor: None,
            bipop_large_pop_increase_factor: None,
            max_bound_iterations: None,
            eig_precision_threshold: None,
            min_eig_value: None,
            matrix_op_threshold: None,
            stagnation_limit: None,
            min_sigma: None,
        }
    }
}

fn clamp_unit(unit: &[f64]) -> Vec<f64> {
    unit.iter()
        .map(|u| u.clamp(UNIT_EPSILON, 1.0 - UNIT_EPSILON))
        .collect()
}

impl NonLinearSearch for Cmaes {
    fn paths(&self) -> &Paths {
        &self.paths
    }

    fn with_paths(&self, paths: Paths) -> Box<dyn NonLinearSearch> {
        Box::new(Self {
            paths,
            ..self.clone()
        })
    }

    fn fit(&self, model: &ModelMapper, analysis: &dyn Analysis) -> Result<SearchResult> {
        let run = SearchRun::start(&self.paths, model, &self.config)?;
        let fitness = Fitness::new(analysis, &self.paths, self.config.output());
        let dimensions = model.prior_count();

        let objective = |unit: &[f64]| -> f64 {
            match model.instance_from_unit_vector(&clamp_unit(unit)) {
                Ok(instance) => {
                    let likelihood = fitness.fit_instance(instance);
                    if likelihood.is_finite() {
                        -likelihood
                    } else {
                        f64::MAX
                    }
                }
                Err(e) => {
                    tracing::debug!(error = %e, "cmaes candidate rejected");
                    f64::MAX
                }
            }
        };

        let best_unit = if dimensions == 0 {
            let _ = objective(&[]);
            Vec::new()
        } else {
            let mut rng = StdRng::seed_from_u64(self.settings.seed.unwrap_or(123456));
            let guess = self.settings.initializer.initial_unit_point(model, &mut rng);
            let bounds = vec![(0.0, 1.0); dimensions];

            tracing::info!(search = %self.paths.name(), dimensions, "running Cmaes");
            let cmaes_result =
                canonical_cmaes_optimize(&objective, &bounds, self.canonical_config(), Some(guess));
            let (_, global) = cmaes_result.best_solution;
            let global_obj = objective(&global);

            if self.settings.lbfgsb_enabled {
                let mut refined = global.clone();
                let refine_res = lbfgsb_optimize(
                    &mut refined,
                    &bounds,
                    &objective,
                    self.settings.lbfgsb_max_iterations,
                    self.settings.tolerance,
                    if self.settings.verbosity >= 1 {
                        Some(|_current_x: &[f64], current_obj: f64| {
                            tracing::debug!(objective = current_obj, "L-BFGS-B iteration");
                        })
                    } else {
                        None
                    },
                    None,
                );
                match refine_res {
                    Ok((local_obj, local_sol)) if local_obj < global_obj => {
                        tracing::debug!(from = global_obj, to = local_obj, "L-BFGS-B improved objective");
                        local_sol
                    }
                    Ok(_) => global,
                    Err(e) => {
                        tracing::debug!(error = ?e, "L-BFGS-B failed, keeping CMA-ES solution");
                        global
                    }
                }
            } else {
                global
            }
        };
        tracing::info!(search = %self.paths.name(), "Cmaes complete");

        let best_physical = model.physical_vector_from_hypercube_vector(&clamp_unit(&best_unit))?;
        let (instance, log_likelihood) = fitness.best().ok_or_else(|| {
            ModelFitError::Search("Cmaes finished without evaluating the model".into())
        })?;
        let linked = model.mapper_from_gaussian_means(&best_physical, &self.config)?;
        let result = SearchResult::new(instance, log_likelihood, linked, best_physical);

        run.finish(model, analysis, &result)?;
        Ok(result)
    }
}
