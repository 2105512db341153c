//! Priors attached to model parameters.
//!
//! A prior maps a unit value in `[0, 1]` to a physical parameter value. Every
//! prior carries a unique id drawn from a process-wide counter: the id fixes
//! the prior's position in a parameter vector, and two parameters holding
//! clones of the same prior are tied together.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use statrs::function::erf::erf_inv;

use crate::error::ModelFitError;

pub type PriorId = u64;

static NEXT_PRIOR_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> PriorId {
    NEXT_PRIOR_ID.fetch_add(1, Ordering::Relaxed)
}

/// Distribution of a prior together with its hard limits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PriorKind {
    Uniform {
        lower_limit: f64,
        upper_limit: f64,
    },
    LogUniform {
        lower_limit: f64,
        upper_limit: f64,
    },
    Gaussian {
        mean: f64,
        sigma: f64,
        lower_limit: f64,
        upper_limit: f64,
    },
}

#[derive(Debug, Clone)]
pub struct Prior {
    id: PriorId,
    kind: PriorKind,
}

impl Prior {
    pub fn uniform(lower_limit: f64, upper_limit: f64) -> Result<Self> {
        check_range("UniformPrior", lower_limit, upper_limit)?;
        Ok(Self::from_kind(PriorKind::Uniform {
            lower_limit,
            upper_limit,
        }))
    }

    pub fn log_uniform(lower_limit: f64, upper_limit: f64) -> Result<Self> {
        check_range("LogUniformPrior", lower_limit, upper_limit)?;
        if lower_limit <= 0.0 {
            return Err(ModelFitError::Prior(format!(
                "LogUniformPrior requires a positive lower limit, got {lower_limit}"
            ))
            .into());
        }
        Ok(Self::from_kind(PriorKind::LogUniform {
            lower_limit,
            upper_limit,
        }))
    }

    /// Unbounded Gaussian prior.
    pub fn gaussian(mean: f64, sigma: f64) -> Self {
        Self::from_kind(PriorKind::Gaussian {
            mean,
            sigma,
            lower_limit: f64::NEG_INFINITY,
            upper_limit: f64::INFINITY,
        })
    }

    pub fn gaussian_with_limits(mean: f64, sigma: f64, lower_limit: f64, upper_limit: f64) -> Self {
        Self::from_kind(PriorKind::Gaussian {
            mean,
            sigma,
            lower_limit,
            upper_limit,
        })
    }

    fn from_kind(kind: PriorKind) -> Self {
        Self {
            id: next_id(),
            kind,
        }
    }

    pub fn id(&self) -> PriorId {
        self.id
    }

    pub fn kind(&self) -> &PriorKind {
        &self.kind
    }

    pub fn is_gaussian(&self) -> bool {
        matches!(self.kind, PriorKind::Gaussian { .. })
    }

    pub fn lower_limit(&self) -> f64 {
        match self.kind {
            PriorKind::Uniform { lower_limit, .. }
            | PriorKind::LogUniform { lower_limit, .. }
            | PriorKind::Gaussian { lower_limit, .. } => lower_limit,
        }
    }

    pub fn upper_limit(&self) -> f64 {
        match self.kind {
            PriorKind::Uniform { upper_limit, .. }
            | PriorKind::LogUniform { upper_limit, .. }
            | PriorKind::Gaussian { upper_limit, .. } => upper_limit,
        }
    }

    /// Physical value corresponding to a unit value.
    pub fn value_for(&self, unit: f64) -> f64 {
        match self.kind {
            PriorKind::Uniform {
                lower_limit,
                upper_limit,
            } => lower_limit + unit * (upper_limit - lower_limit),
            PriorKind::LogUniform {
                lower_limit,
                upper_limit,
            } => {
                let lower = lower_limit.log10();
                let upper = upper_limit.log10();
                10f64.powf(lower + unit * (upper - lower))
            }
            PriorKind::Gaussian { mean, sigma, .. } => {
                if sigma <= 0.0 {
                    return mean;
                }
                mean + sigma * std::f64::consts::SQRT_2 * erf_inv(2.0 * unit - 1.0)
            }
        }
    }

    pub fn is_within_limits(&self, value: f64) -> bool {
        value >= self.lower_limit() && value <= self.upper_limit()
    }

    pub fn assert_within_limits(&self, value: f64) -> Result<()> {
        if self.is_within_limits(value) {
            Ok(())
        } else {
            Err(ModelFitError::PriorLimit {
                id: self.id,
                value,
                lower: self.lower_limit(),
                upper: self.upper_limit(),
            }
            .into())
        }
    }
}

fn check_range(name: &str, lower_limit: f64, upper_limit: f64) -> Result<()> {
    if !(lower_limit.is_finite() && upper_limit.is_finite() && lower_limit < upper_limit) {
        return Err(ModelFitError::Prior(format!(
            "{name} requires finite limits with lower < upper, got [{lower_limit}, {upper_limit}]"
        ))
        .into());
    }
    Ok(())
}

impl PartialEq for Prior {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Prior {}

impl Hash for Prior {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Prior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            PriorKind::Uniform {
                lower_limit,
                upper_limit,
            } => write!(
                f,
                "UniformPrior, lower_limit = {lower_limit:?}, upper_limit = {upper_limit:?}"
            ),
            PriorKind::LogUniform {
                lower_limit,
                upper_limit,
            } => write!(
                f,
                "LogUniformPrior, lower_limit = {lower_limit:?}, upper_limit = {upper_limit:?}"
            ),
            PriorKind::Gaussian { mean, sigma, .. } => {
                write!(f, "GaussianPrior, mean = {mean:?}, sigma = {sigma:?}")
            }
        }
    }
}
