//! Global `tracing` subscriber configured from `general.toml`.

use std::fs::{self, File};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::config::OutputConfig;
use crate::error::ModelFitError;

/// Parses `log_level`, accepting the `warning` and `critical` spellings too.
pub fn parse_level(log_level: &str) -> Result<Level> {
    let level = match log_level.trim().to_ascii_lowercase().as_str() {
        "warning" => "warn".to_string(),
        "critical" | "fatal" => "error".to_string(),
        other => other.to_string(),
    };
    level
        .parse::<Level>()
        .map_err(|_| ModelFitError::Config(format!("unknown log level '{log_level}'")).into())
}

/// Installs the global subscriber. Output goes to `<log_dir>/<log_file>` when
/// `log_file` is set, otherwise to stdout.
pub fn init(output: &OutputConfig, log_dir: &Path) -> Result<()> {
    let level = parse_level(&output.log_level)?;
    // Checked before the log file is created so that an installed
    // subscriber's file is never truncated.
    if tracing::dispatcher::has_been_set() {
        return Err(already_initialised());
    }
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_names(true)
        .compact();

    let installed = if output.log_file.trim().is_empty() {
        tracing::subscriber::set_global_default(builder.finish())
    } else {
        fs::create_dir_all(log_dir)
            .with_context(|| format!("failed to create {}", log_dir.display()))?;
        let path = log_dir.join(output.log_file.trim());
        let file = File::create(&path)
            .with_context(|| format!("failed to create log file {}", path.display()))?;
        let subscriber = builder
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .finish();
        tracing::subscriber::set_global_default(subscriber)
    };
    installed.map_err(|_| already_initialised())
}

fn already_initialised() -> anyhow::Error {
    ModelFitError::Config("logging is already initialised".to_string()).into()
}
