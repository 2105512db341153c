use anyhow::Result;

use crate::config::Config;
use crate::model::{ModelInstance, ModelMapper};

/// Outcome of a non-linear search.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// Best-fit instance
    pub instance: ModelInstance,
    pub log_likelihood: f64,
    /// Model with Gaussian priors centred on the best fit, for linking into a later phase
    pub model: ModelMapper,
    /// Best-fit physical vector, ordered by prior id
    pub best_physical: Vec<f64>,
    /// Every evaluated physical vector with its log likelihood, for searches that keep them
    pub samples: Vec<(Vec<f64>, f64)>,
}

impl SearchResult {
    pub fn new(
        instance: ModelInstance,
        log_likelihood: f64,
        model: ModelMapper,
        best_physical: Vec<f64>,
    ) -> Self {
        Self {
            instance,
            log_likelihood,
            model,
            best_physical,
            samples: Vec::new(),
        }
    }

    pub fn with_samples(mut self, samples: Vec<(Vec<f64>, f64)>) -> Self {
        self.samples = samples;
        self
    }

    /// The linked model with every Gaussian width set to `a`.
    pub fn model_absolute(&self, a: f64, config: &Config) -> Result<ModelMapper> {
        self.model
            .mapper_from_gaussian_tuples(&self.gaussian_tuples(), Some(a), None, config)
    }

    /// The linked model with every Gaussian width set to `r * |mean|`.
    pub fn model_relative(&self, r: f64, config: &Config) -> Result<ModelMapper> {
        self.model
            .mapper_from_gaussian_tuples(&self.gaussian_tuples(), None, Some(r), config)
    }

    fn gaussian_tuples(&self) -> Vec<(f64, f64)> {
        self.best_physical.iter().map(|&mean| (mean, 0.0)).collect()
    }
}
