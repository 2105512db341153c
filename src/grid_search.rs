//! Grid search: one non-linear search per cell of a lattice over selected priors.
//!
//! The calling thread is the farmer. It builds one job per cell, hands the
//! jobs to `number_of_cores - 1` worker threads and collects the results in
//! cell order. With one core every job runs on the calling thread.

use std::collections::{HashMap, HashSet};
use std::fs;

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::Deserialize;

use crate::config::Config;
use crate::error::ModelFitError;
use crate::grid;
use crate::model::ModelMapper;
use crate::non_linear::{Analysis, NonLinearSearch, Paths, SearchResult};
use crate::prior::{Prior, PriorId};
use crate::visualize;

/// Contents of `non_linear/GridSearch.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct GridSearchConfig {
    /// Width of a cell in unit-hypercube coordinates
    #[serde(default = "default_step_size")]
    pub step_size: f64,
    /// Worker threads plus the farmer
    #[serde(default = "default_number_of_cores")]
    pub number_of_cores: usize,
}

impl Default for GridSearchConfig {
    fn default() -> Self {
        Self {
            step_size: default_step_size(),
            number_of_cores: default_number_of_cores(),
        }
    }
}

fn default_step_size() -> f64 {
    0.1
}

fn default_number_of_cores() -> usize {
    1
}

/// Outcome of a grid search, one entry per cell in lattice order.
#[derive(Debug, Clone)]
pub struct GridSearchResult {
    pub grid_priors: Vec<Prior>,
    /// Unit lower limit of every cell
    pub lower_limit_lists: Vec<Vec<f64>>,
    /// Physical lower limit of every cell
    pub physical_lower_limit_lists: Vec<Vec<f64>>,
    pub results: Vec<SearchResult>,
    /// Cells per swept dimension
    pub side_length: usize,
    /// Cell width in unit-hypercube coordinates
    pub step_size: f64,
}

impl GridSearchResult {
    /// The cell result with the highest log likelihood.
    pub fn best_result(&self) -> Option<&SearchResult> {
        self.results
            .iter()
            .max_by(|a, b| a.log_likelihood.total_cmp(&b.log_likelihood))
    }

    pub fn figure_of_merits(&self) -> Vec<f64> {
        self.results.iter().map(|r| r.log_likelihood).collect()
    }

    /// Figures of merit in rows of `side_length`, first grid prior slowest.
    pub fn figure_of_merit_grid(&self) -> Vec<Vec<f64>> {
        self.figure_of_merits()
            .chunks(self.side_length.max(1))
            .map(<[f64]>::to_vec)
            .collect()
    }

    pub fn dimensions(&self) -> usize {
        self.grid_priors.len()
    }
}

struct Job {
    label: String,
    model: ModelMapper,
    search: Box<dyn NonLinearSearch>,
}

pub struct GridSearch {
    paths: Paths,
    config: Config,
    step_size: f64,
    number_of_cores: usize,
    search: Box<dyn NonLinearSearch>,
}

impl GridSearch {
    /// Runs `search` in every cell; settings come from `non_linear/GridSearch.toml`.
    ///
    /// Only the settings of `search` are used. Cell `<label>` writes to
    /// `paths.with_name_extension(<label>)`, next to `grid_search.csv`.
    pub fn new(paths: Paths, search: Box<dyn NonLinearSearch>, config: &Config) -> Result<Self> {
        let settings = config.non_linear::<GridSearchConfig>("GridSearch")?;
        grid::steps_per_dimension(settings.step_size, false)?;
        Ok(Self {
            paths,
            config: config.clone(),
            step_size: settings.step_size,
            number_of_cores: settings.number_of_cores,
            search,
        })
    }

    pub fn with_step_size(mut self, step_size: f64) -> Self {
        self.step_size = step_size;
        self
    }

    pub fn with_number_of_cores(mut self, number_of_cores: usize) -> Self {
        self.number_of_cores = number_of_cores;
        self
    }

    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    pub fn step_size(&self) -> f64 {
        self.step_size
    }

    pub fn number_of_cores(&self) -> usize {
        self.number_of_cores
    }

    /// Unit lower limits of every cell over `dimensions` priors.
    pub fn make_lists(&self, dimensions: usize) -> Result<Vec<Vec<f64>>> {
        grid::make_lists(dimensions, self.step_size, false)
    }

    /// For each cell, a model whose swept priors are replaced by uniform priors
    /// spanning the cell. Other priors are left free.
    pub fn model_mappers(
        &self,
        model: &ModelMapper,
        grid_priors: &[Prior],
    ) -> Result<Vec<ModelMapper>> {
        let grid_priors = unique_priors(grid_priors);
        check_in_model(model, &grid_priors)?;
        self.make_lists(grid_priors.len())?
            .iter()
            .map(|values| self.cell_model(model, &grid_priors, values))
            .collect()
    }

    fn cell_model(
        &self,
        model: &ModelMapper,
        grid_priors: &[Prior],
        values: &[f64],
    ) -> Result<ModelMapper> {
        let mut arguments: HashMap<PriorId, Prior> = HashMap::new();
        for (prior, &value) in grid_priors.iter().zip(values) {
            let lower = prior.value_for(value);
            let upper = prior.value_for(value + self.step_size);
            if !(lower.is_finite() && upper.is_finite()) {
                return Err(ModelFitError::Prior(format!(
                    "grid cell [{value}, {}] of prior {} has non-finite physical limits",
                    value + self.step_size,
                    prior.id()
                ))
                .into());
            }
            arguments.insert(prior.id(), Prior::uniform(lower, upper)?);
        }
        Ok(model.mapper_from_partial_prior_arguments(&arguments))
    }

    /// Fits every cell and writes `grid_search.csv` (and the figure-of-merit
    /// plot when visualisation is on).
    pub fn fit(
        &self,
        model: &ModelMapper,
        analysis: &dyn Analysis,
        grid_priors: &[Prior],
    ) -> Result<GridSearchResult> {
        let grid_priors = unique_priors(grid_priors);
        check_in_model(model, &grid_priors)?;
        let names = swept_names(model, &grid_priors);

        let lists = self.make_lists(grid_priors.len())?;
        let jobs = lists
            .iter()
            .map(|values| {
                let label = grid::cell_label(&names, values);
                Ok(Job {
                    search: self.search.with_paths(self.paths.with_name_extension(&label)),
                    model: self.cell_model(model, &grid_priors, values)?,
                    label,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::info!(
            search = %self.paths.name(),
            cells = jobs.len(),
            cores = self.number_of_cores,
            "running grid search"
        );
        let outcomes = self.run_jobs(&jobs, analysis)?;
        let results = jobs
            .iter()
            .zip(outcomes)
            .map(|(job, outcome)| {
                outcome.with_context(|| format!("grid search cell {} failed", job.label))
            })
            .collect::<Result<Vec<_>>>()?;

        let physical_lower_limit_lists = lists
            .iter()
            .map(|values| {
                grid_priors
                    .iter()
                    .zip(values)
                    .map(|(prior, &v)| prior.value_for(v))
                    .collect()
            })
            .collect();

        let result = GridSearchResult {
            side_length: grid::steps_per_dimension(self.step_size, false)?,
            step_size: self.step_size,
            grid_priors,
            lower_limit_lists: lists,
            physical_lower_limit_lists,
            results,
        };

        self.write_csv(&names, &result)?;
        let image = self.paths.image_path().join("figure_of_merit.svg");
        if visualize::plot_figure_of_merit(&result, &image, &self.config.visualize)? {
            tracing::debug!(path = %image.display(), "wrote figure of merit plot");
        }
        tracing::info!(search = %self.paths.name(), "grid search complete");
        Ok(result)
    }

    fn run_jobs(&self, jobs: &[Job], analysis: &dyn Analysis) -> Result<Vec<Result<SearchResult>>> {
        let run = |job: &Job| {
            tracing::debug!(cell = %job.label, "starting grid cell");
            job.search.fit(&job.model, analysis)
        };

        if self.number_of_cores <= 1 {
            return Ok(jobs.iter().map(run).collect());
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.number_of_cores - 1)
            .thread_name(|i| format!("grid-worker-{i}"))
            .build()
            .context("failed to start grid search workers")?;
        Ok(pool.install(|| jobs.par_iter().map(run).collect()))
    }

    fn write_csv(&self, names: &[String], result: &GridSearchResult) -> Result<()> {
        let dir = self.paths.output_path();
        fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
        let path = dir.join("grid_search.csv");
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("failed to create {}", path.display()))?;

        let mut header = names.to_vec();
        header.push("figure_of_merit".to_string());
        writer.write_record(&header)?;
        for (limits, cell) in result.physical_lower_limit_lists.iter().zip(&result.results) {
            let mut record: Vec<String> = limits.iter().map(|v| v.to_string()).collect();
            record.push(cell.log_likelihood.to_string());
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn unique_priors(grid_priors: &[Prior]) -> Vec<Prior> {
    let mut seen = HashSet::new();
    grid_priors
        .iter()
        .filter(|prior| seen.insert(prior.id()))
        .cloned()
        .collect()
}

fn check_in_model(model: &ModelMapper, grid_priors: &[Prior]) -> Result<()> {
    let ids: HashSet<PriorId> = model.priors().iter().map(|p| p.id()).collect();
    match grid_priors.iter().find(|prior| !ids.contains(&prior.id())) {
        Some(missing) => Err(ModelFitError::Prior(format!(
            "grid prior {} ({missing}) is not part of the model",
            missing.id()
        ))
        .into()),
        None => Ok(()),
    }
}

fn swept_names(model: &ModelMapper, grid_priors: &[Prior]) -> Vec<String> {
    let tuples = model.prior_tuples_ordered_by_id();
    grid_priors
        .iter()
        .map(|prior| {
            tuples
                .iter()
                .find(|t| t.prior.id() == prior.id())
                .map_or_else(|| format!("prior_{}", prior.id()), |t| t.name.clone())
        })
        .collect()
}
