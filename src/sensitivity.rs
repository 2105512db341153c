//! Sensitivity mapping: how well a perturbation added to a simulated dataset
//! can be detected.
//!
//! The unit hypercube of the perturbation model is cut into cells of
//! `step_size`. For the midpoint of every cell the perturbation is added to a
//! base instance, a dataset is simulated from the sum, and two fits are run
//! on it: one of the model alone and one of the model plus the perturbation.
//! The difference of their log likelihoods measures how detectable the
//! perturbation is.

use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result};
use rayon::prelude::*;

use crate::grid;
use crate::model::{ModelInstance, ModelMapper, PriorModel};
use crate::non_linear::{Analysis, NonLinearSearch, SearchResult};

/// Entry name of the perturbation in simulated instances and perturbed models.
pub const PERTURBATION: &str = "perturbation";

/// Simulates a dataset from an instance holding the base model and the
/// perturbation, and returns the analysis that fits it.
pub type AnalysisFactory = dyn Fn(&ModelInstance) -> Result<Box<dyn Analysis>> + Send + Sync;

/// One cell: fits the model and the perturbed model to the same simulation.
pub struct Job {
    pub label: String,
    pub model: ModelMapper,
    pub perturbed_model: ModelMapper,
    pub analysis: Box<dyn Analysis>,
    pub search: Box<dyn NonLinearSearch>,
}

impl Job {
    /// The two fits write to `<search>/no_perturbation` and `<search>/perturbation`.
    pub fn perform(&self) -> Result<JobResult> {
        tracing::debug!(cell = %self.label, "starting sensitivity job");
        let result = self
            .search
            .copy_with_name_extension("no_perturbation")
            .fit(&self.model, self.analysis.as_ref())
            .context("fit without perturbation failed")?;
        let perturbed_result = self
            .search
            .copy_with_name_extension(PERTURBATION)
            .fit(&self.perturbed_model, self.analysis.as_ref())
            .context("fit with perturbation failed")?;
        Ok(JobResult {
            label: self.label.clone(),
            result,
            perturbed_result,
        })
    }
}

#[derive(Debug, Clone)]
pub struct JobResult {
    pub label: String,
    pub result: SearchResult,
    pub perturbed_result: SearchResult,
}

impl JobResult {
    /// Positive when the perturbed model fits better.
    pub fn log_likelihood_increase(&self) -> f64 {
        self.perturbed_result.log_likelihood - self.result.log_likelihood
    }
}

pub struct Sensitivity {
    instance: ModelInstance,
    model: ModelMapper,
    perturbation_model: PriorModel,
    search: Box<dyn NonLinearSearch>,
    analysis_factory: Arc<AnalysisFactory>,
    step_size: f64,
    number_of_cores: usize,
}

impl Sensitivity {
    /// `instance` is the base of every simulation and `model` is fitted to
    /// it. `step_size` must lie in `(0, 1]`.
    pub fn new<F>(
        instance: ModelInstance,
        model: ModelMapper,
        perturbation_model: PriorModel,
        search: Box<dyn NonLinearSearch>,
        analysis_factory: F,
        step_size: f64,
    ) -> Result<Self>
    where
        F: Fn(&ModelInstance) -> Result<Box<dyn Analysis>> + Send + Sync + 'static,
    {
        grid::steps_per_dimension(step_size, false)?;
        Ok(Self {
            instance,
            model,
            perturbation_model,
            search,
            analysis_factory: Arc::new(analysis_factory),
            step_size,
            number_of_cores: 1,
        })
    }

    pub fn with_number_of_cores(mut self, number_of_cores: usize) -> Self {
        self.number_of_cores = number_of_cores;
        self
    }

    pub fn step_size(&self) -> f64 {
        self.step_size
    }

    fn perturbation_mapper(&self) -> ModelMapper {
        let mut mapper = ModelMapper::new();
        mapper.add_model(PERTURBATION, self.perturbation_model.clone());
        mapper
    }

    /// The fitted model with the perturbation added as a free component.
    pub fn perturbed_model(&self) -> ModelMapper {
        let mut model = self.model.clone();
        model.add_model(PERTURBATION, self.perturbation_model.clone());
        model
    }

    /// Unit midpoint of every cell, first perturbation prior slowest.
    fn midpoints(&self) -> Result<Vec<Vec<f64>>> {
        let dimensions = self.perturbation_mapper().prior_count();
        let half = self.step_size / 2.0;
        Ok(grid::make_lists(dimensions, self.step_size, false)?
            .into_iter()
            .map(|list| list.into_iter().map(|v| v + half).collect())
            .collect())
    }

    /// One perturbation instance per cell midpoint.
    pub fn perturbation_instances(&self) -> Result<Vec<ModelInstance>> {
        let mapper = self.perturbation_mapper();
        self.midpoints()?
            .iter()
            .map(|midpoint| mapper.instance_from_unit_vector(midpoint))
            .collect()
    }

    /// `centre_0.25_intensity_0.75` style label of every cell.
    pub fn labels(&self) -> Result<Vec<String>> {
        let mapper = self.perturbation_mapper();
        let names: Vec<&str> = mapper
            .prior_tuples_ordered_by_id()
            .iter()
            .map(|tuple| tuple.parameter)
            .collect();
        Ok(self
            .midpoints()?
            .iter()
            .map(|midpoint| grid::cell_label(&names, midpoint))
            .collect())
    }

    /// One copy of the search per cell, named `<search>/<label>`.
    pub fn searches(&self) -> Result<Vec<Box<dyn NonLinearSearch>>> {
        Ok(self
            .labels()?
            .iter()
            .map(|label| self.search.copy_with_name_extension(label))
            .collect())
    }

    /// Builds one job per cell, simulating each cell's dataset.
    pub fn jobs(&self) -> Result<Vec<Job>> {
        let perturbed_model = self.perturbed_model();
        let instances = self.perturbation_instances()?;
        self.labels()?
            .into_iter()
            .zip(instances)
            .zip(self.searches()?)
            .map(|((label, perturbation), search)| {
                let mut simulated = self.instance.clone();
                simulated.merge(&perturbation);
                let analysis = (self.analysis_factory)(&simulated)
                    .with_context(|| format!("failed to simulate sensitivity cell {label}"))?;
                Ok(Job {
                    label,
                    model: self.model.clone(),
                    perturbed_model: perturbed_model.clone(),
                    analysis,
                    search,
                })
            })
            .collect()
    }

    /// Performs every job, in cell order, and writes `sensitivity.csv`. Jobs
    /// run on `number_of_cores - 1` worker threads when more than one core
    /// is configured.
    pub fn run(&self) -> Result<Vec<JobResult>> {
        let jobs = self.jobs()?;
        tracing::info!(
            search = %self.search.name(),
            cells = jobs.len(),
            cores = self.number_of_cores,
            "running sensitivity mapping"
        );

        let outcomes: Vec<Result<JobResult>> = if self.number_of_cores <= 1 {
            jobs.iter().map(Job::perform).collect()
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.number_of_cores - 1)
                .thread_name(|i| format!("sensitivity-worker-{i}"))
                .build()
                .context("failed to start sensitivity workers")?;
            pool.install(|| jobs.par_iter().map(Job::perform).collect())
        };
        let results = jobs
            .iter()
            .zip(outcomes)
            .map(|(job, outcome)| {
                outcome.with_context(|| format!("sensitivity cell {} failed", job.label))
            })
            .collect::<Result<Vec<_>>>()?;

        self.write_csv(&results)?;
        tracing::info!(search = %self.search.name(), "sensitivity mapping complete");
        Ok(results)
    }

    fn write_csv(&self, results: &[JobResult]) -> Result<()> {
        let dir = self.search.paths().output_path();
        fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
        let path = dir.join("sensitivity.csv");
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("failed to create {}", path.display()))?;

        writer.write_record([
            "label",
            "log_likelihood",
            "perturbed_log_likelihood",
            "log_likelihood_increase",
        ])?;
        for result in results {
            writer.write_record([
                result.label.clone(),
                result.result.log_likelihood.to_string(),
                result.perturbed_result.log_likelihood.to_string(),
                result.log_likelihood_increase().to_string(),
            ])?;
        }
        writer.flush()?;
        Ok(())
    }
}
