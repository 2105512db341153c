//! Non-linear searches over a [`ModelMapper`].
//!
//! A search turns parameter vectors into [`ModelInstance`]s, scores them with
//! an [`Analysis`] through a [`Fitness`] wrapper, and returns a
//! [`SearchResult`] whose model carries Gaussian priors centred on the best
//! fit.

pub mod cmaes;
pub mod downhill_simplex;
pub mod fitness;
pub mod grid;
pub mod initializer;
pub mod paths;
pub mod result;
pub(crate) mod run;
pub mod simplex;

use std::path::Path;

use anyhow::Result;

use crate::error::FitError;
use crate::model::{ModelInstance, ModelMapper};

pub use cmaes::{Cmaes, CmaesConfig};
pub use downhill_simplex::{DownhillSimplex, DownhillSimplexConfig, Fmin};
pub use fitness::{Fitness, IntervalCounter};
pub use grid::{Grid, GridConfig};
pub use initializer::Initializer;
pub use paths::Paths;
pub use result::SearchResult;
pub use simplex::{initial_simplex, nelder_mead, SimplexOptions, SimplexOutcome};

/// User-supplied scoring of model instances.
pub trait Analysis: Send + Sync {
    /// Log likelihood of `instance`. Return a [`FitError`] for instances that
    /// cannot be fitted; searches score them as `-inf`.
    fn log_likelihood(&self, instance: &ModelInstance) -> Result<f64, FitError>;

    /// Writes images of `instance` under `image_path`.
    fn visualize(
        &self,
        _instance: &ModelInstance,
        _image_path: &Path,
        _during_analysis: bool,
    ) -> Result<()> {
        Ok(())
    }

    fn describe(&self, instance: &ModelInstance) -> String {
        format!("{instance:?}")
    }
}

/// A search algorithm bound to an output location.
pub trait NonLinearSearch: Send + Sync {
    fn paths(&self) -> &Paths;

    fn name(&self) -> &str {
        self.paths().name()
    }

    /// Identical search writing below `paths`.
    fn with_paths(&self, paths: Paths) -> Box<dyn NonLinearSearch>;

    /// Identical search writing to `<name>/<extension>`.
    fn copy_with_name_extension(&self, extension: &str) -> Box<dyn NonLinearSearch> {
        self.with_paths(self.paths().with_name_extension(extension))
    }

    fn fit(&self, model: &ModelMapper, analysis: &dyn Analysis) -> Result<SearchResult>;
}
