use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use serde::Deserialize;

use crate::config::Config;
use crate::error::ModelFitError;
use crate::model::ModelMapper;
use crate::non_linear::fitness::Fitness;
use crate::non_linear::paths::Paths;
use crate::non_linear::result::SearchResult;
use crate::non_linear::run::SearchRun;
use crate::non_linear::simplex::{nelder_mead, SimplexOptions};
use crate::non_linear::{Analysis, NonLinearSearch};

/// Contents of `non_linear/DownhillSimplex.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct DownhillSimplexConfig {
    #[serde(default = "default_tolerance")]
    pub xtol: f64,
    #[serde(default = "default_tolerance")]
    pub ftol: f64,
    /// Defaults to `200 * priors`
    #[serde(default)]
    pub maxiter: Option<usize>,
    /// Defaults to `200 * priors`
    #[serde(default)]
    pub maxfun: Option<usize>,
}

impl Default for DownhillSimplexConfig {
    fn default() -> Self {
        Self {
            xtol: default_tolerance(),
            ftol: default_tolerance(),
            maxiter: None,
            maxfun: None,
        }
    }
}

impl DownhillSimplexConfig {
    pub fn options(&self) -> SimplexOptions {
        SimplexOptions {
            xtol: self.xtol,
            ftol: self.ftol,
            maxiter: self.maxiter,
            maxfun: self.maxfun,
        }
    }
}

fn default_tolerance() -> f64 {
    1e-4
}

/// Minimiser used by [`DownhillSimplex`]: objective, start point and options
/// in, best point out.
pub type Fmin = Arc<dyn Fn(&dyn Fn(&[f64]) -> f64, &[f64], &SimplexOptions) -> Vec<f64> + Send + Sync>;

fn default_fmin() -> Fmin {
    Arc::new(
        |objective: &dyn Fn(&[f64]) -> f64, x0: &[f64], options: &SimplexOptions| {
            nelder_mead(objective, x0, options).x
        },
    )
}

/// Nelder-Mead search in physical space starting from the prior medians.
///
/// The objective is `-2 * log_likelihood`; vectors outside a prior's limits
/// score `+inf`.
#[derive(Clone)]
pub struct DownhillSimplex {
    paths: Paths,
    config: Config,
    settings: DownhillSimplexConfig,
    fmin: Fmin,
}

impl fmt::Debug for DownhillSimplex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownhillSimplex")
            .field("paths", &self.paths)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl DownhillSimplex {
    pub fn new(paths: Paths, config: &Config) -> Result<Self> {
        let settings = config.non_linear::<DownhillSimplexConfig>("DownhillSimplex")?;
        tracing::debug!(search = %paths.name(), ?settings, "creating DownhillSimplex");
        Ok(Self {
            paths,
            config: config.clone(),
            settings,
            fmin: default_fmin(),
        })
    }

    /// Replaces the minimiser.
    pub fn with_fmin<F>(mut self, fmin: F) -> Self
    where
        F: Fn(&dyn Fn(&[f64]) -> f64, &[f64], &SimplexOptions) -> Vec<f64> + Send + Sync + 'static,
    {
        self.fmin = Arc::new(fmin);
        self
    }

    pub fn settings(&self) -> &DownhillSimplexConfig {
        &self.settings
    }

    pub fn fmin(&self) -> &Fmin {
        &self.fmin
    }
}

impl NonLinearSearch for DownhillSimplex {
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

        let initial = model.physical_values_from_prior_medians()?;
        let objective = |vector: &[f64]| match model.instance_from_physical_vector(vector) {
            Ok(instance) => -2.0 * fitness.fit_instance(instance),
            Err(e) => {
                tracing::debug!(error = %e, "simplex vertex rejected");
                f64::INFINITY
            }
        };

        tracing::info!(search = %self.paths.name(), "running DownhillSimplex");
        let best = (self.fmin)(&objective, &initial, &self.settings.options());
        tracing::info!(search = %self.paths.name(), "DownhillSimplex complete");

        let (instance, log_likelihood) = fitness.best().ok_or_else(|| {
            ModelFitError::Search("DownhillSimplex finished without evaluating the model".into())
        })?;
        let linked = model.mapper_from_gaussian_means(&best, &self.config)?;
        let result = SearchResult::new(instance, log_likelihood, linked, best);

        run.finish(model, analysis, &result)?;
        Ok(result)
    }
}
