// src/model/mapper.rs

//! The model mapper: a named set of components and the bridge between
//! parameter vectors and model instances.
//!
//! Vectors handed to or produced by the mapper hold one value per distinct
//! prior, ordered by prior id. Because ids come from a global counter this is
//! the order in which the priors were created, regardless of which component
//! they belong to.

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use rand::Rng;

use crate::config::{Config, LabelConfig};
use crate::error::ModelFitError;
use crate::model::class::ComponentClass;
use crate::model::info::{info_lines, InfoNode};
use crate::model::instance::{ComponentInstance, InstanceEntry, ModelInstance};
use crate::model::prior_model::{CollectionPriorModel, Parameter, PriorModel};
use crate::prior::{Prior, PriorId};

#[derive(Debug, Clone, PartialEq)]
pub enum ModelEntry {
    Model(PriorModel),
    Collection(CollectionPriorModel),
    /// A component held at fixed values; copied into every instance as-is
    Fixed(ComponentInstance),
}

/// A prior together with where it lives in the mapper.
#[derive(Debug, Clone)]
pub struct PriorTuple<'a> {
    /// Full parameter name, e.g. `gaussian_centre` or `lights_bulge_sigma`
    pub name: String,
    pub parameter: &'a str,
    pub prior: &'a Prior,
    pub class: &'a ComponentClass,
    pub component_number: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelMapper {
    entries: Vec<(String, ModelEntry)>,
}

impl ModelMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replacing an entry keeps its position.
    fn insert(&mut self, name: String, entry: ModelEntry) {
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = entry,
            None => self.entries.push((name, entry)),
        }
        self.renumber_components();
    }

    /// Numbers components by entry position, collection items one each.
    fn renumber_components(&mut self) {
        let mut number = 0;
        for (_, entry) in &mut self.entries {
            match entry {
                ModelEntry::Model(model) => {
                    model.set_component_number(number);
                    number += 1;
                }
                ModelEntry::Collection(collection) => {
                    for model in collection.items_mut() {
                        model.set_component_number(number);
                        number += 1;
                    }
                }
                ModelEntry::Fixed(_) => {}
            }
        }
    }

    /// Adds (or replaces) a component. Components are numbered in entry order.
    pub fn add_model(&mut self, name: impl Into<String>, model: PriorModel) -> &mut Self {
        self.insert(name.into(), ModelEntry::Model(model));
        self
    }

    pub fn add_collection(
        &mut self,
        name: impl Into<String>,
        collection: CollectionPriorModel,
    ) -> &mut Self {
        self.insert(name.into(), ModelEntry::Collection(collection));
        self
    }

    pub fn add_fixed(&mut self, name: impl Into<String>, instance: ComponentInstance) -> &mut Self {
        self.insert(name.into(), ModelEntry::Fixed(instance));
        self
    }

    pub fn entries(&self) -> &[(String, ModelEntry)] {
        &self.entries
    }

    pub fn entry(&self, name: &str) -> Option<&ModelEntry> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, e)| e)
    }

    pub fn model(&self, name: &str) -> Option<&PriorModel> {
        match self.entry(name)? {
            ModelEntry::Model(model) => Some(model),
            _ => None,
        }
    }

    pub fn model_mut(&mut self, name: &str) -> Option<&mut PriorModel> {
        self.entries
            .iter_mut()
            .find(|(n, _)| n == name)
            .and_then(|(_, entry)| match entry {
                ModelEntry::Model(model) => Some(model),
                _ => None,
            })
    }

    pub fn collection(&self, name: &str) -> Option<&CollectionPriorModel> {
        match self.entry(name)? {
            ModelEntry::Collection(collection) => Some(collection),
            _ => None,
        }
    }

    pub fn collection_mut(&mut self, name: &str) -> Option<&mut CollectionPriorModel> {
        self.entries
            .iter_mut()
            .find(|(n, _)| n == name)
            .and_then(|(_, entry)| match entry {
                ModelEntry::Collection(collection) => Some(collection),
                _ => None,
            })
    }

    /// Every `(prefix, component)` pair, collections flattened.
    fn components(&self) -> Vec<(String, &PriorModel)> {
        let mut out = Vec::new();
        for (name, entry) in &self.entries {
            match entry {
                ModelEntry::Model(model) => out.push((name.clone(), model)),
                ModelEntry::Collection(collection) => {
                    for (item, model) in collection.items() {
                        out.push((format!("{name}_{item}"), model));
                    }
                }
                ModelEntry::Fixed(_) => {}
            }
        }
        out
    }

    /// Distinct priors ordered by id. A prior shared by several parameters is
    /// reported under the first name it appears with.
    pub fn prior_tuples_ordered_by_id(&self) -> Vec<PriorTuple<'_>> {
        let mut seen = HashSet::new();
        let mut tuples = Vec::new();
        for (prefix, model) in self.components() {
            for (parameter, prior) in model.prior_tuples() {
                if seen.insert(prior.id()) {
                    tuples.push(PriorTuple {
                        name: format!("{prefix}_{parameter}"),
                        parameter,
                        prior,
                        class: model.class(),
                        component_number: model.component_number(),
                    });
                }
            }
        }
        tuples.sort_by_key(|t| t.prior.id());
        tuples
    }

    pub fn priors(&self) -> Vec<&Prior> {
        self.prior_tuples_ordered_by_id()
            .into_iter()
            .map(|t| t.prior)
            .collect()
    }

    pub fn prior_count(&self) -> usize {
        self.prior_tuples_ordered_by_id().len()
    }

    /// Fixed parameter values as `(full name, value)`.
    pub fn constant_tuples(&self) -> Vec<(String, f64)> {
        let mut out = Vec::new();
        for (prefix, model) in self.components() {
            for (parameter, value) in model.constant_tuples() {
                out.push((format!("{prefix}_{parameter}"), value));
            }
        }
        out
    }

    pub fn constant_count(&self) -> usize {
        self.constant_tuples().len()
    }

    pub fn constant_names(&self) -> Vec<String> {
        self.constant_tuples().into_iter().map(|(n, _)| n).collect()
    }

    pub fn param_names(&self) -> Vec<String> {
        self.prior_tuples_ordered_by_id()
            .into_iter()
            .map(|t| t.name)
            .collect()
    }

    /// LaTeX-style labels, e.g. `x_{\mathrm{g1}}`.
    pub fn param_labels(&self, labels: &LabelConfig) -> Vec<String> {
        self.prior_tuples_ordered_by_id()
            .iter()
            .map(|t| {
                format!(
                    "{}_{{\\mathrm{{{}{}}}}}",
                    labels.label(t.parameter),
                    labels.subscript(t.class),
                    t.component_number + 1
                )
            })
            .collect()
    }

    fn check_length(&self, found: usize) -> Result<()> {
        let expected = self.prior_count();
        if expected != found {
            return Err(ModelFitError::Dimension { expected, found }.into());
        }
        Ok(())
    }

    pub fn physical_vector_from_hypercube_vector(&self, unit_vector: &[f64]) -> Result<Vec<f64>> {
        self.check_length(unit_vector.len())?;
        Ok(self
            .prior_tuples_ordered_by_id()
            .iter()
            .zip(unit_vector)
            .map(|(t, unit)| t.prior.value_for(*unit))
            .collect())
    }

    pub fn physical_values_from_prior_medians(&self) -> Result<Vec<f64>> {
        self.physical_vector_from_hypercube_vector(&vec![0.5; self.prior_count()])
    }

    pub fn instance_from_unit_vector(&self, unit_vector: &[f64]) -> Result<ModelInstance> {
        let physical = self.physical_vector_from_hypercube_vector(unit_vector)?;
        self.instance_from_physical_vector(&physical)
    }

    pub fn instance_from_prior_medians(&self) -> Result<ModelInstance> {
        self.instance_from_unit_vector(&vec![0.5; self.prior_count()])
    }

    /// Builds an instance from physical values; each value must lie within its prior's limits.
    pub fn instance_from_physical_vector(&self, physical_vector: &[f64]) -> Result<ModelInstance> {
        self.check_length(physical_vector.len())?;
        let mut arguments = HashMap::new();
        for (tuple, value) in self.prior_tuples_ordered_by_id().iter().zip(physical_vector) {
            tuple.prior.assert_within_limits(*value)?;
            arguments.insert(tuple.prior.id(), *value);
        }
        self.instance_for_arguments(&arguments)
    }

    pub fn instance_for_arguments(&self, arguments: &HashMap<PriorId, f64>) -> Result<ModelInstance> {
        let mut instance = ModelInstance::new();
        for (name, entry) in &self.entries {
            let built = match entry {
                ModelEntry::Model(model) => {
                    InstanceEntry::Component(model.instance_for_arguments(arguments)?)
                }
                ModelEntry::Collection(collection) => InstanceEntry::Collection(
                    collection
                        .items()
                        .iter()
                        .map(|(item, model)| {
                            Ok((item.clone(), model.instance_for_arguments(arguments)?))
                        })
                        .collect::<Result<Vec<_>>>()?,
                ),
                ModelEntry::Fixed(fixed) => InstanceEntry::Component(fixed.clone()),
            };
            instance.insert(name.clone(), built);
        }
        Ok(instance)
    }

    /// Uniform random unit vector, one value per prior.
    pub fn random_unit_vector<R: Rng>(&self, rng: &mut R) -> Vec<f64> {
        (0..self.prior_count()).map(|_| rng.gen::<f64>()).collect()
    }

    /// A new mapper with every prior replaced through `arguments`.
    ///
    /// Priors without an entry are left untouched, which makes this the
    /// partial form as well.
    pub fn mapper_from_prior_arguments(&self, arguments: &HashMap<PriorId, Prior>) -> ModelMapper {
        let entries = self
            .entries
            .iter()
            .map(|(name, entry)| {
                let replaced = match entry {
                    ModelEntry::Model(model) => ModelEntry::Model(model.with_prior_arguments(arguments)),
                    ModelEntry::Collection(collection) => {
                        let mut copy = collection.clone();
                        for model in copy.items_mut() {
                            *model = model.with_prior_arguments(arguments);
                        }
                        ModelEntry::Collection(copy)
                    }
                    ModelEntry::Fixed(fixed) => ModelEntry::Fixed(fixed.clone()),
                };
                (name.clone(), replaced)
            })
            .collect();
        ModelMapper { entries }
    }

    pub fn mapper_from_partial_prior_arguments(
        &self,
        arguments: &HashMap<PriorId, Prior>,
    ) -> ModelMapper {
        self.mapper_from_prior_arguments(arguments)
    }

    /// Replaces every prior with a Gaussian centred on `tuples[i].0`.
    ///
    /// The width is `max(tuples[i].1, w)` where `w` is the absolute width `a`,
    /// the relative width `r * |mean|`, or the configured `priors/width` entry.
    /// Gaussian priors keep their limits; others take `priors/limit` (or none).
    pub fn mapper_from_gaussian_tuples(
        &self,
        tuples: &[(f64, f64)],
        a: Option<f64>,
        r: Option<f64>,
        config: &Config,
    ) -> Result<ModelMapper> {
        if a.is_some() && r.is_some() {
            return Err(ModelFitError::Prior(
                "width of new priors cannot be both relative and absolute".to_string(),
            )
            .into());
        }
        self.check_length(tuples.len())?;

        let mut arguments = HashMap::new();
        for (tuple, &(mean, sigma)) in self.prior_tuples_ordered_by_id().iter().zip(tuples) {
            let width = match (a, r) {
                (Some(a), _) => a,
                (None, Some(r)) => r * mean.abs(),
                (None, None) => config
                    .priors
                    .width_for(tuple.class, tuple.parameter)?
                    .width_for(mean),
            };
            let (lower, upper) = if tuple.prior.is_gaussian() {
                (tuple.prior.lower_limit(), tuple.prior.upper_limit())
            } else {
                config
                    .priors
                    .limit_for(tuple.class, tuple.parameter)
                    .unwrap_or((f64::NEG_INFINITY, f64::INFINITY))
            };
            arguments.insert(
                tuple.prior.id(),
                Prior::gaussian_with_limits(mean, sigma.max(width), lower, upper),
            );
        }
        Ok(self.mapper_from_prior_arguments(&arguments))
    }

    pub fn mapper_from_gaussian_means(&self, means: &[f64], config: &Config) -> Result<ModelMapper> {
        let tuples: Vec<(f64, f64)> = means.iter().map(|&m| (m, 0.0)).collect();
        self.mapper_from_gaussian_tuples(&tuples, None, None, config)
    }

    /// Human-readable listing of every entry with its priors and constants.
    pub fn info(&self) -> String {
        let mut root = InfoNode::default();
        for (name, entry) in &self.entries {
            let mut node = InfoNode::default();
            match entry {
                ModelEntry::Model(model) => describe_model(&mut node, model),
                ModelEntry::Collection(collection) => {
                    for (item, model) in collection.items() {
                        let mut child = InfoNode::default();
                        describe_model(&mut child, model);
                        node.node(item, child);
                    }
                }
                ModelEntry::Fixed(fixed) => {
                    for (parameter, value) in fixed.values() {
                        node.leaf(parameter, format!("{value:?}"));
                    }
                }
            }
            root.node(name, node);
        }
        info_lines(&root, 100, 4).join("\n")
    }
}

fn describe_model(node: &mut InfoNode, model: &PriorModel) {
    for (parameter, value) in model.parameters() {
        let text = match value {
            Parameter::Free(prior) => prior.to_string(),
            Parameter::Fixed(v) => format!("{v:?}"),
        };
        node.leaf(parameter, text);
    }
}
