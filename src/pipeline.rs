//! Phases and pipelines: searches run in sequence, each phase able to build
//! its model from the results of the phases before it.

use std::fmt;
use std::ops::{Add, Index};
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::error::ModelFitError;
use crate::model::ModelMapper;
use crate::non_linear::{Analysis, NonLinearSearch, SearchResult};

/// Results keyed by the phase that produced them, in run order.
#[derive(Debug, Clone)]
pub struct ResultsCollection<T = SearchResult> {
    entries: Vec<(String, T)>,
}

impl<T> Default for ResultsCollection<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> ResultsCollection<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `result`, replacing an earlier result of the same phase.
    pub fn add(&mut self, phase_name: impl Into<String>, result: T) {
        let phase_name = phase_name.into();
        match self.entries.iter_mut().find(|(name, _)| *name == phase_name) {
            Some(slot) => slot.1 = result,
            None => self.entries.push((phase_name, result)),
        }
    }

    pub fn from_phase(&self, phase_name: &str) -> Result<&T> {
        self.entries
            .iter()
            .find(|(name, _)| name == phase_name)
            .map(|(_, result)| result)
            .ok_or_else(|| {
                ModelFitError::Pipeline(format!("no result for phase '{phase_name}'")).into()
            })
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.entries.get(index).map(|(_, result)| result)
    }

    pub fn first(&self) -> Option<&T> {
        self.get(0)
    }

    pub fn last(&self) -> Option<&T> {
        self.entries.last().map(|(_, result)| result)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(phase name, result)` pairs in run order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|(name, result)| (name.as_str(), result))
    }
}

type ModelBuilder = dyn Fn(&ResultsCollection) -> Result<ModelMapper> + Send + Sync;

/// Where a phase gets its model from.
#[derive(Clone)]
pub enum PhaseModel {
    Fixed(ModelMapper),
    /// Built from earlier results, typically linking their Gaussian priors
    Linked(Arc<ModelBuilder>),
}

impl fmt::Debug for PhaseModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(model) => f.debug_tuple("Fixed").field(model).finish(),
            Self::Linked(_) => f.write_str("Linked(..)"),
        }
    }
}

/// One search of one model. The phase name is the name of its search.
pub struct Phase {
    pipeline_name: Option<String>,
    model: PhaseModel,
    search: Arc<dyn NonLinearSearch>,
}

impl Phase {
    pub fn new(search: Box<dyn NonLinearSearch>, model: ModelMapper) -> Self {
        Self {
            pipeline_name: None,
            model: PhaseModel::Fixed(model),
            search: Arc::from(search),
        }
    }

    /// A phase whose model is built from earlier results when it runs.
    pub fn linked<F>(search: Box<dyn NonLinearSearch>, builder: F) -> Self
    where
        F: Fn(&ResultsCollection) -> Result<ModelMapper> + Send + Sync + 'static,
    {
        Self {
            pipeline_name: None,
            model: PhaseModel::Linked(Arc::new(builder)),
            search: Arc::from(search),
        }
    }

    pub fn name(&self) -> &str {
        self.search.name()
    }

    pub fn pipeline_name(&self) -> Option<&str> {
        self.pipeline_name.as_deref()
    }

    pub fn model(&self) -> &PhaseModel {
        &self.model
    }

    pub fn search(&self) -> &dyn NonLinearSearch {
        self.search.as_ref()
    }

    pub fn run(&self, analysis: &dyn Analysis, results: &ResultsCollection) -> Result<SearchResult> {
        let model = match &self.model {
            PhaseModel::Fixed(model) => model.clone(),
            PhaseModel::Linked(builder) => builder(results)
                .with_context(|| format!("failed to build the model of phase '{}'", self.name()))?,
        };
        tracing::info!(
            phase = %self.name(),
            pipeline = self.pipeline_name().unwrap_or("-"),
            priors = model.prior_count(),
            "running phase"
        );
        self.search.fit(&model, analysis)
    }
}

impl Clone for Phase {
    fn clone(&self) -> Self {
        Self {
            pipeline_name: self.pipeline_name.clone(),
            model: self.model.clone(),
            search: Arc::clone(&self.search),
        }
    }
}

impl fmt::Debug for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Phase")
            .field("name", &self.name())
            .field("pipeline_name", &self.pipeline_name)
            .field("model", &self.model)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    name: String,
    phases: Vec<Phase>,
}

impl Pipeline {
    /// Phase names must be unique. Phases not yet part of a pipeline take its name.
    pub fn new(name: impl Into<String>, phases: Vec<Phase>) -> Result<Self> {
        let name = name.into();
        for (i, phase) in phases.iter().enumerate() {
            if phases[..i].iter().any(|p| p.name() == phase.name()) {
                return Err(ModelFitError::Pipeline(format!(
                    "phase name '{}' is used more than once in pipeline '{name}'",
                    phase.name()
                ))
                .into());
            }
        }
        let phases = phases
            .into_iter()
            .map(|mut phase| {
                if phase.pipeline_name.is_none() {
                    phase.pipeline_name = Some(name.clone());
                }
                phase
            })
            .collect();
        Ok(Self { name, phases })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    /// Runs every phase in order. Each phase sees the results of those before it.
    pub fn run(&self, analysis: &dyn Analysis) -> Result<ResultsCollection> {
        let mut results = ResultsCollection::new();
        for phase in &self.phases {
            let result = phase
                .run(analysis, &results)
                .with_context(|| format!("pipeline '{}' failed in phase '{}'", self.name, phase.name()))?;
            results.add(phase.name(), result);
        }
        tracing::info!(pipeline = %self.name, phases = results.len(), "pipeline complete");
        Ok(results)
    }
}

impl Index<usize> for Pipeline {
    type Output = Phase;

    fn index(&self, index: usize) -> &Phase {
        &self.phases[index]
    }
}

impl Add for Pipeline {
    type Output = Pipeline;

    fn add(mut self, other: Pipeline) -> Pipeline {
        self.phases.extend(other.phases);
        Pipeline {
            name: format!("{} + {}", self.name, other.name),
            phases: self.phases,
        }
    }
}
