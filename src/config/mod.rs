//! Configuration directory loading.
//!
//! ```text
//! config/
//!   general.toml
//!   label.toml
//!   label_format.toml
//!   priors/default/*.toml
//!   priors/limit/*.toml
//!   priors/width/*.toml
//!   visualize/general.toml
//!   non_linear/<Search>.toml
//! ```
//!
//! Every file is optional. Absent files leave the defaults in place; files
//! that fail to parse are reported with their path.

pub mod general;
pub mod labels;
pub mod priors;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

use crate::error::ModelFitError;
use crate::visualize::VisualizeConfig;

pub use general::{GeneralConfig, OutputConfig};
pub use labels::{LabelConfig, NumberFormat};
pub use priors::{ClassTable, PriorConfig, PriorSpec, WidthSpec};

#[derive(Debug, Clone)]
pub struct Config {
    config_path: PathBuf,
    output_path: PathBuf,
    pub general: GeneralConfig,
    pub priors: PriorConfig,
    pub labels: LabelConfig,
    pub visualize: VisualizeConfig,
}

impl Config {
    /// Loads every configuration file under `config_path`. Search output is
    /// written beneath `output_path`.
    pub fn load(config_path: impl AsRef<Path>, output_path: impl AsRef<Path>) -> Result<Self> {
        let config_path = config_path.as_ref().to_path_buf();
        let output_path = output_path.as_ref().to_path_buf();

        let general: GeneralConfig = read_optional(&config_path.join("general.toml"))?;

        let priors = PriorConfig {
            default: read_class_tables(&config_path.join("priors").join("default"))?,
            limit: read_class_tables(&config_path.join("priors").join("limit"))?,
            width: read_class_tables(&config_path.join("priors").join("width"))?,
        };

        let mut labels: LabelConfig = read_optional(&config_path.join("label.toml"))?;
        let formats: labels::LabelFormatFile =
            read_optional(&config_path.join("label_format.toml"))?;
        labels.format.extend(formats.format);

        let visualize: VisualizeConfig =
            read_optional(&config_path.join("visualize").join("general.toml"))?;
        visualize.backend()?;

        tracing::debug!(
            config = %config_path.display(),
            output = %output_path.display(),
            "loaded configuration"
        );

        Ok(Self {
            config_path,
            output_path,
            general,
            priors,
            labels,
            visualize,
        })
    }

    /// Config with every default and no files behind it.
    pub fn empty(output_path: impl AsRef<Path>) -> Self {
        Self {
            config_path: PathBuf::new(),
            output_path: output_path.as_ref().to_path_buf(),
            general: GeneralConfig::default(),
            priors: PriorConfig::default(),
            labels: LabelConfig::default(),
            visualize: VisualizeConfig::default(),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn with_output_path(mut self, output_path: impl AsRef<Path>) -> Self {
        self.output_path = output_path.as_ref().to_path_buf();
        self
    }

    pub fn output(&self) -> &OutputConfig {
        &self.general.output
    }

    /// Settings of a non-linear search from `non_linear/<search_name>.toml`.
    pub fn non_linear<T: DeserializeOwned + Default>(&self, search_name: &str) -> Result<T> {
        if self.config_path.as_os_str().is_empty() {
            return Ok(T::default());
        }
        read_optional(
            &self
                .config_path
                .join("non_linear")
                .join(format!("{search_name}.toml")),
        )
    }
}

fn read_optional<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    if !path.is_file() {
        return Ok(T::default());
    }
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    toml::from_str(&text).map_err(|e| {
        ModelFitError::Config(format!("failed to parse {}: {e}", path.display())).into()
    })
}

/// Merges every `*.toml` file of a directory, in file-name order.
fn read_class_tables<T: DeserializeOwned>(dir: &Path) -> Result<ClassTable<T>> {
    let mut merged: ClassTable<T> = HashMap::new();
    if !dir.is_dir() {
        return Ok(merged);
    }

    let mut files: Vec<PathBuf> = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("failed to list {}", dir.display()))? {
        let path = entry
            .with_context(|| format!("failed to read an entry of {}", dir.display()))?
            .path();
        if path.extension().is_some_and(|ext| ext == "toml") {
            files.push(path);
        }
    }
    files.sort();

    for file in files {
        let text = fs::read_to_string(&file)
            .with_context(|| format!("failed to read {}", file.display()))?;
        let table: ClassTable<T> = toml::from_str(&text).map_err(|e| {
            ModelFitError::Config(format!("failed to parse {}: {e}", file.display()))
        })?;
        for (class, entries) in table {
            merged.entry(class).or_default().extend(entries);
        }
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_directory_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path().join("nothing"), dir.path()).unwrap();
        assert_eq!(config.output().log_interval, 100);
        assert!(config.priors.default.is_empty());
        assert!(config.labels.label.is_empty());
    }

    #[test]
    fn class_tables_merge_across_files() {
        let dir = tempfile::tempdir().unwrap();
        let default_dir = dir.path().join("priors").join("default");
        fs::create_dir_all(&default_dir).unwrap();
        fs::write(
            default_dir.join("a.toml"),
            "[Gaussian.centre]\ntype = \"Uniform\"\nlower_limit = 0.0\nupper_limit = 1.0\n",
        )
        .unwrap();
        fs::write(
            default_dir.join("b.toml"),
            "[Gaussian.sigma]\ntype = \"Constant\"\nvalue = 3.0\n",
        )
        .unwrap();

        let config = Config::load(dir.path(), dir.path()).unwrap();
        let gaussian = &config.priors.default["Gaussian"];
        assert_eq!(gaussian.len(), 2);
        assert_eq!(gaussian["sigma"], PriorSpec::Constant { value: 3.0 });
    }

    #[test]
    fn malformed_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("general.toml"), "[output\nlog_interval = 1").unwrap();
        let err = Config::load(dir.path(), dir.path()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ModelFitError>(),
            Some(ModelFitError::Config(_))
        ));
    }

    #[test]
    fn unreadable_table_entries_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let limit_dir = dir.path().join("priors").join("limit");
        fs::create_dir_all(limit_dir.join("nested.toml")).unwrap();
        fs::write(limit_dir.join("notes.txt"), "not a table").unwrap();

        let err = Config::load(dir.path(), dir.path()).unwrap_err();
        assert!(format!("{err:#}").contains("nested.toml"), "{err:#}");

        fs::remove_dir(limit_dir.join("nested.toml")).unwrap();
        let config = Config::load(dir.path(), dir.path()).unwrap();
        assert!(config.priors.limit.is_empty());
    }
}
