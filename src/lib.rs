//! # modelfit-lib: model composition and non-linear fitting
//!
//! `modelfit-lib` fits parametric models to data. A model is assembled from
//! named components, each an instance of a [`ComponentClass`] whose free
//! parameters carry [`Prior`]s. A [`ModelMapper`] maps unit-hypercube or
//! physical vectors onto [`ModelInstance`]s, an [`Analysis`] scores each
//! instance with a log likelihood, and a [`NonLinearSearch`] looks for the
//! best one.
//!
//! ## Core Features
//!
//! - **Priors**: Uniform, LogUniform and Gaussian priors; tied parameters share one prior
//! - **Configuration**: default priors, limits, widths and labels read from a config directory
//! - **Searches**: Nelder-Mead downhill simplex, CMA-ES with L-BFGS-B refinement, resumable grid
//! - **Grid search**: one sub-search per cell of a lattice over chosen priors, run on a worker pool
//! - **Pipelines**: phases run in order, later phases linking priors from earlier results
//! - **Sensitivity mapping**: fits with and without a perturbation over a grid of simulations
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use modelfit_lib::{
//!     Analysis, ComponentClass, Config, DownhillSimplex, FitError, ModelInstance, ModelMapper,
//!     NonLinearSearch, Paths, PriorModel,
//! };
//!
//! struct Peak;
//!
//! impl Analysis for Peak {
//!     fn log_likelihood(&self, instance: &ModelInstance) -> Result<f64, FitError> {
//!         let centre = instance.value("gaussian.centre").unwrap_or(0.0);
//!         Ok(-(centre - 1.0).powi(2))
//!     }
//! }
//!
//! let config = Config::load("config", "output")?;
//! let class = ComponentClass::new("Gaussian", ["centre", "intensity", "sigma"]);
//!
//! let mut model = ModelMapper::new();
//! model.add_model("gaussian", PriorModel::from_config(class, &config)?);
//!
//! let search = DownhillSimplex::new(Paths::new("peak", config.output_path()), &config)?;
//! let result = search.fit(&model, &Peak)?;
//! println!("best log likelihood {}", result.log_likelihood);
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Searches
//!
//! Every search reads its defaults from `non_linear/<Search>.toml`:
//! - [`DownhillSimplex`]: local Nelder-Mead search from the prior medians
//! - [`Cmaes`]: global CMA-ES search with optional L-BFGS-B polish
//! - [`Grid`]: exhaustive lattice evaluation with checkpointed restarts
//! - [`GridSearch`]: any of the above run once per grid cell

// ================================================================================================
// MODULES
// ================================================================================================

pub mod config;
pub mod error;
pub mod grid;
pub mod grid_search;
pub mod logging;
pub mod model;
pub mod non_linear;
pub mod pipeline;
pub mod prior;
pub mod sensitivity;
pub mod visualize;

// ================================================================================================
// PUBLIC RE-EXPORTS
// ================================================================================================

// Errors
pub use error::{FitError, ModelFitError};

// Configuration
pub use config::{
    Config, GeneralConfig, LabelConfig, NumberFormat, OutputConfig, PriorConfig, PriorSpec,
    WidthSpec,
};
pub use visualize::{Backend, VisualizeConfig};

// Priors and model composition
pub use model::{
    CollectionPriorModel, ComponentClass, ComponentInstance, InstanceEntry, ModelEntry,
    ModelInstance, ModelMapper, Parameter, PriorModel, PriorTuple,
};
pub use prior::{Prior, PriorId, PriorKind};

// Searches
pub use non_linear::{
    Analysis, Cmaes, CmaesConfig, DownhillSimplex, DownhillSimplexConfig, Fitness, Grid,
    GridConfig, Initializer, NonLinearSearch, Paths, SearchResult,
};

// Grid search, pipelines and sensitivity mapping
pub use grid_search::{GridSearch, GridSearchConfig, GridSearchResult};
pub use pipeline::{Phase, PhaseModel, Pipeline, ResultsCollection};
pub use sensitivity::{JobResult, Sensitivity};
