use anyhow::Result;
use rand::Rng;
use serde::Deserialize;

use crate::error::ModelFitError;
use crate::model::ModelMapper;

/// Chooses starting points (unit vectors) for a search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum Initializer {
    /// Uniform draws over the whole unit hypercube, i.e. draws from the priors
    #[default]
    Prior,
    /// Uniform draws from `[lower, upper]` in every dimension
    Ball { lower: f64, upper: f64 },
}

impl Initializer {
    pub fn ball(lower: f64, upper: f64) -> Result<Self> {
        let ball = Initializer::Ball { lower, upper };
        ball.validate()?;
        Ok(ball)
    }

    /// A ball must satisfy `0 <= lower < upper <= 1`.
    pub fn validate(&self) -> Result<()> {
        match *self {
            Initializer::Prior => Ok(()),
            Initializer::Ball { lower, upper } => {
                if !(0.0..=1.0).contains(&lower) || !(0.0..=1.0).contains(&upper) || lower >= upper
                {
                    return Err(ModelFitError::Config(format!(
                        "initializer ball [{lower}, {upper}] must satisfy 0 <= lower < upper <= 1"
                    ))
                    .into());
                }
                Ok(())
            }
        }
    }

    pub fn initial_unit_point<R: Rng>(&self, model: &ModelMapper, rng: &mut R) -> Vec<f64> {
        match *self {
            Initializer::Prior => model.random_unit_vector(rng),
            Initializer::Ball { lower, upper } => (0..model.prior_count())
                .map(|_| lower + (upper - lower) * rng.gen::<f64>())
                .collect(),
        }
    }

    /// `points` starting unit vectors.
    pub fn initial_points<R: Rng>(
        &self,
        points: usize,
        model: &ModelMapper,
        rng: &mut R,
    ) -> Vec<Vec<f64>> {
        (0..points)
            .map(|_| self.initial_unit_point(model, rng))
            .collect()
    }
}
