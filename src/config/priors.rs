//! Prior configuration: `priors/default`, `priors/limit` and `priors/width`.
//!
//! Each directory holds any number of TOML files whose top-level tables are
//! component class names. Lookups walk the class lineage nearest-first, so a
//! class without its own entry inherits the entry of its closest ancestor.

use std::collections::HashMap;

use anyhow::Result;
use serde::Deserialize;

use crate::error::ModelFitError;
use crate::model::{ComponentClass, Parameter};
use crate::prior::Prior;

/// Class name -> parameter name -> entry.
pub type ClassTable<T> = HashMap<String, HashMap<String, T>>;

/// Default prior of a parameter, as written in `priors/default/*.toml`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum PriorSpec {
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
        #[serde(default = "neg_infinity")]
        lower_limit: f64,
        #[serde(default = "infinity")]
        upper_limit: f64,
    },
    Constant {
        value: f64,
    },
}

impl PriorSpec {
    /// Builds a fresh parameter (with a new prior id) from this entry.
    pub fn to_parameter(&self) -> Result<Parameter> {
        let parameter = match *self {
            PriorSpec::Uniform {
                lower_limit,
                upper_limit,
            } => Parameter::Free(Prior::uniform(lower_limit, upper_limit)?),
            PriorSpec::LogUniform {
                lower_limit,
                upper_limit,
            } => Parameter::Free(Prior::log_uniform(lower_limit, upper_limit)?),
            PriorSpec::Gaussian {
                mean,
                sigma,
                lower_limit,
                upper_limit,
            } => Parameter::Free(Prior::gaussian_with_limits(
                mean,
                sigma,
                lower_limit,
                upper_limit,
            )),
            PriorSpec::Constant { value } => Parameter::Fixed(value),
        };
        Ok(parameter)
    }
}

/// Width used when a result is turned into Gaussian priors for the next phase.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum WidthSpec {
    /// Width is `value * |mean|`
    Relative(f64),
    /// Width is `value`
    Absolute(f64),
}

impl WidthSpec {
    pub fn width_for(&self, mean: f64) -> f64 {
        match *self {
            WidthSpec::Relative(r) => r * mean.abs(),
            WidthSpec::Absolute(a) => a,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PriorConfig {
    pub default: ClassTable<PriorSpec>,
    pub limit: ClassTable<(f64, f64)>,
    pub width: ClassTable<WidthSpec>,
}

impl PriorConfig {
    pub fn default_for(&self, class: &ComponentClass, parameter: &str) -> Result<PriorSpec> {
        nearest_ancestor(&self.default, class, parameter)
            .cloned()
            .ok_or_else(|| {
                ModelFitError::Config(format!(
                    "no default prior for {}.{parameter} in priors/default",
                    class.name()
                ))
                .into()
            })
    }

    /// Hard limits for a parameter; `None` when no ancestor configures one.
    pub fn limit_for(&self, class: &ComponentClass, parameter: &str) -> Option<(f64, f64)> {
        nearest_ancestor(&self.limit, class, parameter).copied()
    }

    pub fn width_for(&self, class: &ComponentClass, parameter: &str) -> Result<WidthSpec> {
        nearest_ancestor(&self.width, class, parameter)
            .copied()
            .ok_or_else(|| {
                ModelFitError::Config(format!(
                    "no prior width for {}.{parameter} in priors/width",
                    class.name()
                ))
                .into()
            })
    }
}

fn nearest_ancestor<'a, T>(
    table: &'a ClassTable<T>,
    class: &ComponentClass,
    parameter: &str,
) -> Option<&'a T> {
    class
        .lineage()
        .find_map(|name| table.get(name).and_then(|entries| entries.get(parameter)))
}

fn neg_infinity() -> f64 {
    f64::NEG_INFINITY
}

fn infinity() -> f64 {
    f64::INFINITY
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> PriorConfig {
        let default: ClassTable<PriorSpec> = toml::from_str(
            r#"
            [Profile.centre]
            type = "Uniform"
            lower_limit = 0.0
            upper_limit = 1.0

            [Gaussian.sigma]
            type = "Gaussian"
            mean = 1.0
            sigma = 0.5

            [Gaussian.intensity]
            type = "Constant"
            value = 2.0
            "#,
        )
        .unwrap();
        let width: ClassTable<WidthSpec> = toml::from_str(
            r#"
            [Profile]
            centre = { type = "absolute", value = 0.2 }
            [Gaussian]
            sigma = { type = "relative", value = 0.5 }
            "#,
        )
        .unwrap();
        let limit: ClassTable<(f64, f64)> = toml::from_str(
            r#"
            [Profile]
            centre = [0.0, 1.0]
            "#,
        )
        .unwrap();
        PriorConfig {
            default,
            limit,
            width,
        }
    }

    #[test]
    fn lookups_fall_back_to_nearest_ancestor() {
        let profile = ComponentClass::new("Profile", ["centre"]);
        let gaussian =
            ComponentClass::new("Gaussian", ["centre", "intensity", "sigma"]).with_parent(&profile);
        let config = table();

        assert_eq!(
            config.default_for(&gaussian, "centre").unwrap(),
            PriorSpec::Uniform {
                lower_limit: 0.0,
                upper_limit: 1.0
            }
        );
        assert_eq!(config.limit_for(&gaussian, "centre"), Some((0.0, 1.0)));
        assert_eq!(
            config.width_for(&gaussian, "centre").unwrap(),
            WidthSpec::Absolute(0.2)
        );
        assert_eq!(
            config.width_for(&gaussian, "sigma").unwrap(),
            WidthSpec::Relative(0.5)
        );
        assert_eq!(config.limit_for(&gaussian, "sigma"), None);
    }

    #[test]
    fn gaussian_limits_default_to_unbounded() {
        let gaussian = ComponentClass::new("Gaussian", ["sigma"]);
        match table().default_for(&gaussian, "sigma").unwrap() {
            PriorSpec::Gaussian {
                lower_limit,
                upper_limit,
                ..
            } => {
                assert_eq!(lower_limit, f64::NEG_INFINITY);
                assert_eq!(upper_limit, f64::INFINITY);
            }
            other => panic!("unexpected spec {other:?}"),
        }
    }

    #[test]
    fn missing_entries_are_config_errors() {
        let other = ComponentClass::new("Other", ["x"]);
        let err = table().default_for(&other, "x").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ModelFitError>(),
            Some(ModelFitError::Config(_))
        ));
    }

    #[test]
    fn constants_become_fixed_parameters() {
        let gaussian = ComponentClass::new("Gaussian", ["intensity"]);
        let spec = table().default_for(&gaussian, "intensity").unwrap();
        assert!(matches!(spec.to_parameter().unwrap(), Parameter::Fixed(v) if v == 2.0));
    }
}
