use thiserror::Error;

use crate::prior::PriorId;

/// Typed failures raised by the library.
///
/// Public operations return `anyhow::Result`; these values travel inside the
/// `anyhow::Error` and can be recovered with `downcast_ref::<ModelFitError>()`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelFitError {
    #[error("prior error: {0}")]
    Prior(String),

    #[error("value {value} is outside the limits [{lower}, {upper}] of prior {id}")]
    PriorLimit {
        id: PriorId,
        value: f64,
        lower: f64,
        upper: f64,
    },

    #[error("config error: {0}")]
    Config(String),

    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    #[error("pipeline error: {0}")]
    Pipeline(String),

    #[error("expected a vector of {expected} values, got {found}")]
    Dimension { expected: usize, found: usize },

    #[error("search error: {0}")]
    Search(String),
}

/// Raised by an [`Analysis`](crate::non_linear::Analysis) when an instance
/// cannot be fitted. Searches score such instances as `-inf`.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("fit failed: {0}")]
pub struct FitError(pub String);

impl FitError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
