use std::collections::{HashMap, HashSet};

use anyhow::Result;

use crate::config::Config;
use crate::error::ModelFitError;
use crate::model::class::ComponentClass;
use crate::model::instance::ComponentInstance;
use crate::prior::{Prior, PriorId};

/// A component parameter: free (sampled through a prior) or held fixed.
#[derive(Debug, Clone, PartialEq)]
pub enum Parameter {
    Free(Prior),
    Fixed(f64),
}

/// A model component whose parameters carry priors.
#[derive(Debug, Clone, PartialEq)]
pub struct PriorModel {
    class: ComponentClass,
    parameters: Vec<(String, Parameter)>,
    component_number: usize,
}

impl PriorModel {
    /// Builds a component with explicit parameters, in class order.
    ///
    /// Every class parameter must be provided exactly once.
    pub fn new(class: ComponentClass, parameters: Vec<(String, Parameter)>) -> Result<Self> {
        for name in class.parameters() {
            if parameters.iter().filter(|(n, _)| n == name).count() != 1 {
                return Err(ModelFitError::Prior(format!(
                    "parameter {name} of {} must be given exactly once",
                    class.name()
                ))
                .into());
            }
        }
        if let Some((extra, _)) = parameters
            .iter()
            .find(|(n, _)| !class.parameters().contains(n))
        {
            return Err(ModelFitError::Prior(format!(
                "{} has no parameter {extra}",
                class.name()
            ))
            .into());
        }

        let ordered = class
            .parameters()
            .iter()
            .filter_map(|name| parameters.iter().find(|(n, _)| n == name).cloned())
            .collect();

        Ok(Self {
            class,
            parameters: ordered,
            component_number: 0,
        })
    }

    /// Builds a component whose parameters take the configured default priors.
    pub fn from_config(class: ComponentClass, config: &Config) -> Result<Self> {
        let parameters = class
            .parameters()
            .iter()
            .map(|name| {
                let spec = config.priors.default_for(&class, name)?;
                Ok((name.clone(), spec.to_parameter()?))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            class,
            parameters,
            component_number: 0,
        })
    }

    pub fn class(&self) -> &ComponentClass {
        &self.class
    }

    pub fn component_number(&self) -> usize {
        self.component_number
    }

    pub(crate) fn set_component_number(&mut self, number: usize) {
        self.component_number = number;
    }

    pub fn parameters(&self) -> &[(String, Parameter)] {
        &self.parameters
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, p)| p)
    }

    pub fn prior(&self, name: &str) -> Option<&Prior> {
        match self.parameter(name)? {
            Parameter::Free(prior) => Some(prior),
            Parameter::Fixed(_) => None,
        }
    }

    fn slot_mut(&mut self, name: &str) -> Result<&mut Parameter> {
        let class_name = self.class.name().to_string();
        self.parameters
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, p)| p)
            .ok_or_else(|| {
                ModelFitError::Prior(format!("{class_name} has no parameter {name}")).into()
            })
    }

    /// Replaces the prior of one parameter. Passing a clone of another
    /// parameter's prior ties the two together.
    pub fn set_prior(&mut self, name: &str, prior: Prior) -> Result<()> {
        *self.slot_mut(name)? = Parameter::Free(prior);
        Ok(())
    }

    pub fn fix(&mut self, name: &str, value: f64) -> Result<()> {
        *self.slot_mut(name)? = Parameter::Fixed(value);
        Ok(())
    }

    /// `(parameter name, prior)` for each distinct prior; the first name of a tied prior wins.
    pub fn prior_tuples(&self) -> Vec<(&str, &Prior)> {
        let mut seen = HashSet::new();
        self.parameters
            .iter()
            .filter_map(|(name, parameter)| match parameter {
                Parameter::Free(prior) if seen.insert(prior.id()) => Some((name.as_str(), prior)),
                _ => None,
            })
            .collect()
    }

    pub fn constant_tuples(&self) -> Vec<(&str, f64)> {
        self.parameters
            .iter()
            .filter_map(|(name, parameter)| match parameter {
                Parameter::Fixed(value) => Some((name.as_str(), *value)),
                Parameter::Free(_) => None,
            })
            .collect()
    }

    pub fn name_for_prior(&self, id: PriorId) -> Option<&str> {
        self.prior_tuples()
            .into_iter()
            .find(|(_, prior)| prior.id() == id)
            .map(|(name, _)| name)
    }

    pub fn instance_for_arguments(&self, arguments: &HashMap<PriorId, f64>) -> Result<ComponentInstance> {
        let values = self
            .parameters
            .iter()
            .map(|(name, parameter)| {
                let value = match parameter {
                    Parameter::Fixed(value) => *value,
                    Parameter::Free(prior) => *arguments.get(&prior.id()).ok_or_else(|| {
                        ModelFitError::Prior(format!(
                            "no value supplied for {}.{name}",
                            self.class.name()
                        ))
                    })?,
                };
                Ok((name.clone(), value))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(ComponentInstance::new(self.class.name(), values))
    }

    /// A copy with priors swapped according to `arguments`; priors without an entry are kept.
    pub fn with_prior_arguments(&self, arguments: &HashMap<PriorId, Prior>) -> Self {
        let mut copy = self.clone();
        for (_, parameter) in copy.parameters.iter_mut() {
            if let Parameter::Free(prior) = parameter {
                if let Some(replacement) = arguments.get(&prior.id()) {
                    *prior = replacement.clone();
                }
            }
        }
        copy
    }
}

/// Ordered, named group of components (e.g. several light profiles).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionPriorModel {
    items: Vec<(String, PriorModel)>,
}

impl CollectionPriorModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, model: PriorModel) -> Self {
        self.push(name, model);
        self
    }

    pub fn push(&mut self, name: impl Into<String>, model: PriorModel) {
        let name = name.into();
        match self.items.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = model,
            None => self.items.push((name, model)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&PriorModel> {
        self.items.iter().find(|(n, _)| n == name).map(|(_, m)| m)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut PriorModel> {
        self.items
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, m)| m)
    }

    pub fn items(&self) -> &[(String, PriorModel)] {
        &self.items
    }

    pub(crate) fn items_mut(&mut self) -> impl Iterator<Item = &mut PriorModel> {
        self.items.iter_mut().map(|(_, m)| m)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
