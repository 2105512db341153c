//! Display labels (`label.toml`) and numeric output formats (`label_format.toml`).

use std::collections::HashMap;

use anyhow::Result;
use serde::Deserialize;

use crate::error::ModelFitError;
use crate::model::ComponentClass;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LabelConfig {
    /// Parameter name -> label (e.g. `centre = "x"`)
    #[serde(default)]
    pub label: HashMap<String, String>,
    /// Class name -> subscript used in LaTeX labels
    #[serde(default)]
    pub subscript: HashMap<String, String>,
    /// Parameter name -> format string, from `label_format.toml`
    #[serde(default)]
    pub format: HashMap<String, String>,
}

/// Shape of `label_format.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct LabelFormatFile {
    #[serde(default)]
    pub format: HashMap<String, String>,
}

impl LabelConfig {
    pub fn label<'a>(&'a self, parameter: &'a str) -> &'a str {
        self.label
            .get(parameter)
            .map(String::as_str)
            .unwrap_or(parameter)
    }

    pub fn subscript<'a>(&'a self, class: &'a ComponentClass) -> &'a str {
        class
            .lineage()
            .find_map(|name| self.subscript.get(name).map(String::as_str))
            .unwrap_or_else(|| class.name())
    }

    /// Formats `value` with the configured format of `parameter` (plain display otherwise).
    pub fn format_value(&self, parameter: &str, value: f64) -> Result<String> {
        match self.format.get(parameter) {
            Some(spec) => Ok(NumberFormat::parse(spec)?.apply(value)),
            None => Ok(NumberFormat::Display.apply(value)),
        }
    }
}

/// Numeric format string such as `{:.4e}` or `{:.2f}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberFormat {
    Display,
    Fixed(usize),
    Exponent(usize),
}

impl NumberFormat {
    pub fn parse(spec: &str) -> Result<Self> {
        let invalid = || ModelFitError::Config(format!("unsupported number format '{spec}'"));

        let inner = spec
            .trim()
            .strip_prefix('{')
            .and_then(|s| s.strip_suffix('}'))
            .ok_or_else(invalid)?;
        if inner.is_empty() || inner == ":" {
            return Ok(NumberFormat::Display);
        }
        let body = inner
            .strip_prefix(":.")
            .ok_or_else(invalid)?;

        let (digits, kind) = match body.chars().last() {
            Some(c) if c.is_ascii_alphabetic() => (&body[..body.len() - 1], Some(c)),
            _ => (body, None),
        };
        let precision: usize = digits.parse().map_err(|_| invalid())?;

        match kind {
            None | Some('f') => Ok(NumberFormat::Fixed(precision)),
            Some('e') => Ok(NumberFormat::Exponent(precision)),
            Some(_) => Err(invalid().into()),
        }
    }

    pub fn apply(&self, value: f64) -> String {
        match *self {
            NumberFormat::Display => format!("{value:?}"),
            NumberFormat::Fixed(precision) => format!("{value:.precision$}"),
            NumberFormat::Exponent(precision) => {
                // Rust renders `1.5e3`; output uses the signed two-digit form `1.5e+03`.
                let rendered = format!("{value:.precision$e}");
                match rendered.split_once('e') {
                    Some((mantissa, exponent)) => {
                        let (sign, digits) = match exponent.strip_prefix('-') {
                            Some(digits) => ('-', digits),
                            None => ('+', exponent),
                        };
                        format!("{mantissa}e{sign}{digits:0>2}")
                    }
                    None => rendered,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supported_formats() {
        assert_eq!(NumberFormat::parse("{}").unwrap(), NumberFormat::Display);
        assert_eq!(NumberFormat::parse("{:.2f}").unwrap(), NumberFormat::Fixed(2));
        assert_eq!(NumberFormat::parse("{:.3}").unwrap(), NumberFormat::Fixed(3));
        assert_eq!(NumberFormat::parse("{:.4e}").unwrap(), NumberFormat::Exponent(4));
        assert!(NumberFormat::parse("{:>8}").is_err());
        assert!(NumberFormat::parse("%.2f").is_err());
    }

    #[test]
    fn exponent_output_has_signed_two_digit_exponent() {
        assert_eq!(NumberFormat::Exponent(4).apply(1234.5), "1.2345e+03");
        assert_eq!(NumberFormat::Exponent(2).apply(0.00012), "1.20e-04");
        assert_eq!(NumberFormat::Fixed(2).apply(3.14159), "3.14");
    }

    #[test]
    fn labels_fall_back_to_names() {
        let mut config = LabelConfig::default();
        config.label.insert("centre".into(), "x".into());
        config.subscript.insert("Profile".into(), "p".into());

        let profile = ComponentClass::new("Profile", ["centre"]);
        let gaussian = ComponentClass::new("Gaussian", ["centre"]).with_parent(&profile);
        let other = ComponentClass::new("Other", ["centre"]);

        assert_eq!(config.label("centre"), "x");
        assert_eq!(config.label("sigma"), "sigma");
        assert_eq!(config.subscript(&gaussian), "p");
        assert_eq!(config.subscript(&other), "Other");
    }
}
