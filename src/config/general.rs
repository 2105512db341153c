use serde::Deserialize;

/// Contents of `general.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeneralConfig {
    #[serde(default)]
    pub output: OutputConfig,
}

/// The `[output]` section: logging, backup and visualisation frequency.
///
/// Intervals count fitness evaluations; `-1` disables the action.
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// File (inside the search output folder) receiving log output; empty logs to stdout
    #[serde(default)]
    pub log_file: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_interval")]
    pub log_interval: i64,

    #[serde(default = "default_interval")]
    pub backup_interval: i64,

    #[serde(default = "default_interval")]
    pub visualise_interval: i64,

    #[serde(default = "default_interval")]
    pub grid_results_interval: i64,

    #[serde(default = "default_decimal_places")]
    pub model_results_decimal_places: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            log_file: String::new(),
            log_level: default_log_level(),
            log_interval: default_interval(),
            backup_interval: default_interval(),
            visualise_interval: default_interval(),
            grid_results_interval: default_interval(),
            model_results_decimal_places: default_decimal_places(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_interval() -> i64 {
    100
}

fn default_decimal_places() -> usize {
    4
}
