use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::ModelFitError;
use crate::grid::grid;
use crate::model::ModelMapper;
use crate::non_linear::fitness::{Fitness, IntervalCounter};
use crate::non_linear::paths::Paths;
use crate::non_linear::result::SearchResult;
use crate::non_linear::run::SearchRun;
use crate::non_linear::{Analysis, NonLinearSearch};

/// Contents of `non_linear/Grid.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct GridConfig {
    /// Lattice spacing in unit-hypercube coordinates
    #[serde(default = "default_step_size")]
    pub step_size: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            step_size: default_step_size(),
        }
    }
}

fn default_step_size() -> f64 {
    0.1
}

/// Progress of a grid run, stored as JSON in `search/.checkpoint`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Checkpoint {
    total_calls: usize,
    /// `None` while nothing better than `-inf` has been seen
    best_fit: Option<f64>,
    best_cube: Option<Vec<f64>>,
    step_size: f64,
    prior_count: usize,
}

impl Checkpoint {
    fn load(path: &Path) -> Result<Option<Self>> {
        if !path.is_file() {
            return Ok(None);
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let checkpoint = serde_json::from_str(&text).map_err(|e| {
            ModelFitError::Checkpoint(format!("unreadable checkpoint {}: {e}", path.display()))
        })?;
        Ok(Some(checkpoint))
    }

    fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, text).with_context(|| format!("failed to write {}", tmp.display()))?;
        fs::rename(&tmp, path).with_context(|| format!("failed to replace {}", path.display()))?;
        Ok(())
    }
}

/// Exhaustive search over a unit-hypercube lattice, upper limit included.
///
/// Every evaluation updates the checkpoint, so an interrupted run resumes
/// after the last completed point.
#[derive(Debug, Clone)]
pub struct Grid {
    paths: Paths,
    config: Config,
    step_size: f64,
}

impl Grid {
    pub fn new(paths: Paths, config: &Config) -> Result<Self> {
        let settings = config.non_linear::<GridConfig>("Grid")?;
        Ok(Self {
            paths,
            config: config.clone(),
            step_size: settings.step_size,
        })
    }

    pub fn with_step_size(mut self, step_size: f64) -> Self {
        self.step_size = step_size;
        self
    }

    pub fn step_size(&self) -> f64 {
        self.step_size
    }

    fn restore_checkpoint(&self, model: &ModelMapper) -> Result<Option<Checkpoint>> {
        let Some(checkpoint) = Checkpoint::load(&self.paths.checkpoint_path())? else {
            return Ok(None);
        };
        if checkpoint.prior_count != model.prior_count() {
            return Err(ModelFitError::Checkpoint(
                "the number of dimensions does not match that found in the checkpoint".into(),
            )
            .into());
        }
        if checkpoint.step_size != self.step_size {
            return Err(ModelFitError::Checkpoint(
                "the step size does not match that found in the checkpoint".into(),
            )
            .into());
        }
        tracing::info!(
            search = %self.paths.name(),
            completed = checkpoint.total_calls,
            "resuming grid from checkpoint"
        );
        Ok(Some(checkpoint))
    }

    /// Writes the evaluated points to `<output>/results`.
    fn save_results(&self, model: &ModelMapper, fits: &[(Vec<f64>, f64)]) -> Result<()> {
        let path = self.paths.grid_results_path();
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("failed to create {}", path.display()))?;

        let mut header = model.param_names();
        header.push("fit".to_string());
        writer.write_record(&header)?;

        for (cube, fit) in fits {
            let mut record: Vec<String> = model
                .physical_vector_from_hypercube_vector(cube)?
                .iter()
                .map(|value| format!("{value:.2}"))
                .collect();
            record.push(format!("{fit:.2}"));
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl NonLinearSearch for Grid {
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
        let checkpoint = self.restore_checkpoint(model)?;
        let fitness = Fitness::new(analysis, &self.paths, self.config.output());

        let skip = checkpoint.as_ref().map_or(0, |c| c.total_calls);
        let mut best_fit = checkpoint
            .as_ref()
            .and_then(|c| c.best_fit)
            .unwrap_or(f64::NEG_INFINITY);
        let mut best_cube = checkpoint.and_then(|c| c.best_cube);
        if let Some(cube) = &best_cube {
            fitness.fit_instance(model.instance_from_unit_vector(cube)?);
        }

        let checkpoint_path = self.paths.checkpoint_path();
        let mut should_save_results =
            IntervalCounter::new(self.config.output().grid_results_interval);
        let mut total_calls = 0;
        let mut fits: Vec<(Vec<f64>, f64)> = Vec::new();
        let mut failure: Option<anyhow::Error> = None;

        tracing::info!(search = %self.paths.name(), step_size = self.step_size, "running grid search");
        grid(
            |cube| {
                total_calls += 1;
                if failure.is_some() || total_calls <= skip {
                    return f64::NEG_INFINITY;
                }
                let fit = match model.instance_from_unit_vector(cube) {
                    Ok(instance) => fitness.fit_instance(instance),
                    Err(e) => {
                        failure = Some(e);
                        return f64::NEG_INFINITY;
                    }
                };
                fits.push((cube.to_vec(), fit));
                if fit > best_fit {
                    best_fit = fit;
                    best_cube = Some(cube.to_vec());
                }

                let saved = Checkpoint {
                    total_calls,
                    best_fit: best_fit.is_finite().then_some(best_fit),
                    best_cube: best_cube.clone(),
                    step_size: self.step_size,
                    prior_count: model.prior_count(),
                }
                .save(&checkpoint_path);
                let saved = saved.and_then(|()| {
                    if should_save_results.tick() {
                        self.save_results(model, &fits)
                    } else {
                        Ok(())
                    }
                });
                if let Err(e) = saved {
                    failure = Some(e);
                }
                fit
            },
            model.prior_count(),
            self.step_size,
        )?;
        if let Some(e) = failure {
            return Err(e);
        }
        self.save_results(model, &fits)?;
        tracing::info!(search = %self.paths.name(), evaluations = fits.len(), "grid search complete");

        let best_cube = match best_cube {
            Some(cube) => cube,
            // Every point failed to fit; the lattice origin stands in as the best cube.
            None => vec![0.0; model.prior_count()],
        };
        let best_physical = model.physical_vector_from_hypercube_vector(&best_cube)?;
        let (instance, log_likelihood) = match fitness.best() {
            Some(best) => best,
            None => (model.instance_from_unit_vector(&best_cube)?, best_fit),
        };
        let samples = fits
            .iter()
            .map(|(cube, fit)| Ok((model.physical_vector_from_hypercube_vector(cube)?, *fit)))
            .collect::<Result<Vec<_>>>()?;

        let linked = model.mapper_from_gaussian_means(&best_physical, &self.config)?;
        let result = SearchResult::new(instance, log_likelihood, linked, best_physical)
            .with_samples(samples);

        run.finish(model, analysis, &result)?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkpoint_round_trips_through_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".checkpoint");
        let checkpoint = Checkpoint {
            total_calls: 7,
            best_fit: Some(-1.5),
            best_cube: Some(vec![0.5, 0.0]),
            step_size: 0.5,
            prior_count: 2,
        };
        checkpoint.save(&path).unwrap();
        assert_eq!(Checkpoint::load(&path).unwrap(), Some(checkpoint));
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn missing_checkpoint_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(Checkpoint::load(&dir.path().join(".checkpoint")).unwrap(), None);
    }

    #[test]
    fn corrupt_checkpoint_is_checkpoint_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".checkpoint");
        fs::write(&path, "not json").unwrap();
        let err = Checkpoint::load(&path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ModelFitError>(),
            Some(ModelFitError::Checkpoint(_))
        ));
    }
}
