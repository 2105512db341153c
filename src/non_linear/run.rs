//! Steps shared by every search: folder setup, backups, model files and timing.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};

use crate::config::Config;
use crate::model::ModelMapper;
use crate::non_linear::paths::Paths;
use crate::non_linear::result::SearchResult;
use crate::non_linear::Analysis;

const PARAM_NAMES_WIDTH: usize = 70;
const MODEL_RESULTS_WIDTH: usize = 60;

/// A search in progress. Created before the first evaluation, finished once
/// the result is known.
pub(crate) struct SearchRun<'a> {
    paths: &'a Paths,
    config: &'a Config,
    start: f64,
}

impl<'a> SearchRun<'a> {
    pub(crate) fn start(paths: &'a Paths, model: &ModelMapper, config: &'a Config) -> Result<Self> {
        for dir in [paths.output_path(), paths.search_path(), paths.image_path()] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        restore(paths)?;

        let info_path = paths.model_info_path();
        if !info_path.is_file() {
            write_file(&info_path, &model.info())?;
        }
        write_file(&paths.param_names_path(), &param_names(model, config))?;

        let start = read_or_create_start_time(&paths.start_time_path())?;
        tracing::info!(search = %paths.name(), priors = model.prior_count(), "search started");
        Ok(Self {
            paths,
            config,
            start,
        })
    }

    /// Writes `model.results`, runs the final visualisation, backs up the
    /// search folder and records the execution time.
    pub(crate) fn finish(
        self,
        model: &ModelMapper,
        analysis: &dyn Analysis,
        result: &SearchResult,
    ) -> Result<()> {
        write_file(
            &self.paths.model_results_path(),
            &model_results(model, result, self.config),
        )?;
        analysis.visualize(&result.instance, &self.paths.image_path(), false)?;
        backup(self.paths)?;

        let elapsed = (now_seconds() - self.start).max(0.0);
        let execution_time = format_duration(elapsed);
        write_file(&self.paths.execution_time_path(), &execution_time)?;
        tracing::info!(
            search = %self.paths.name(),
            execution_time = %execution_time,
            log_likelihood = result.log_likelihood,
            "search finished"
        );
        Ok(())
    }
}

/// Replaces the backup folder with a copy of the search folder.
pub(crate) fn backup(paths: &Paths) -> Result<()> {
    let backup = paths.backup_path();
    if backup.exists() {
        fs::remove_dir_all(&backup)
            .with_context(|| format!("failed to clear {}", backup.display()))?;
    }
    copy_dir(&paths.search_path(), &backup, true)
}

/// Copies backed-up files missing from the search folder back into it.
/// Files still present in the search folder are newer and are kept.
pub(crate) fn restore(paths: &Paths) -> Result<()> {
    let backup = paths.backup_path();
    if backup.is_dir() {
        tracing::debug!(backup = %backup.display(), "restoring search folder from backup");
        copy_dir(&backup, &paths.search_path(), false)?;
    }
    Ok(())
}

fn copy_dir(from: &Path, to: &Path, overwrite: bool) -> Result<()> {
    fs::create_dir_all(to).with_context(|| format!("failed to create {}", to.display()))?;
    if !from.is_dir() {
        return Ok(());
    }
    for entry in fs::read_dir(from).with_context(|| format!("failed to list {}", from.display()))? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target, overwrite)?;
        } else if overwrite || !target.exists() {
            fs::copy(entry.path(), &target).with_context(|| {
                format!("failed to copy {} to {}", entry.path().display(), target.display())
            })?;
        }
    }
    Ok(())
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

fn pad(name: &str, width: usize) -> String {
    format!("{name:<width$}")
}

/// One line per prior: name padded to 70 columns, then its LaTeX label.
pub(crate) fn param_names(model: &ModelMapper, config: &Config) -> String {
    model
        .param_names()
        .iter()
        .zip(model.param_labels(&config.labels))
        .fold(String::new(), |mut out, (name, label)| {
            let _ = writeln!(out, "{}{label}", pad(name, PARAM_NAMES_WIDTH));
            out
        })
}

fn rounded(value: f64, decimal_places: usize) -> f64 {
    let scale = 10f64.powi(decimal_places as i32);
    (value * scale).round() / scale
}

/// Contents of `model.results`.
pub(crate) fn model_results(model: &ModelMapper, result: &SearchResult, config: &Config) -> String {
    let places = config.output().model_results_decimal_places;
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Most likely model, Likelihood = {:?}",
        rounded(result.log_likelihood, places)
    );
    out.push('\n');

    for (tuple, value) in model
        .prior_tuples_ordered_by_id()
        .iter()
        .zip(&result.best_physical)
    {
        let text = if config.labels.format.contains_key(tuple.parameter) {
            config
                .labels
                .format_value(tuple.parameter, *value)
                .unwrap_or_else(|_| format!("{:?}", rounded(*value, places)))
        } else {
            format!("{:?}", rounded(*value, places))
        };
        let _ = writeln!(out, "{}{text}", pad(&tuple.name, MODEL_RESULTS_WIDTH));
    }

    out.push_str("\nConstants\n\n");
    for (name, value) in model.constant_tuples() {
        let _ = writeln!(out, "{}{value:?}", pad(&name, MODEL_RESULTS_WIDTH));
    }
    out
}

fn now_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// The first run of a search records its start time; restarts reuse it.
fn read_or_create_start_time(path: &Path) -> Result<f64> {
    if let Ok(text) = fs::read_to_string(path) {
        if let Ok(start) = text.trim().parse::<f64>() {
            return Ok(start);
        }
    }
    let start = now_seconds();
    write_file(path, &start.to_string())?;
    Ok(start)
}

/// `H:MM:SS.ffffff`
fn format_duration(seconds: f64) -> String {
    let whole = seconds.trunc() as u64;
    let micros = ((seconds - seconds.trunc()) * 1e6).round() as u64;
    format!(
        "{}:{:02}:{:02}.{:06}",
        whole / 3600,
        (whole % 3600) / 60,
        whole % 60,
        micros.min(999_999)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_render_like_clock_time() {
        assert_eq!(format_duration(3725.5), "1:02:05.500000");
        assert_eq!(format_duration(0.0), "0:00:00.000000");
    }

    #[test]
    fn rounding_respects_decimal_places() {
        assert_eq!(rounded(1.23456, 2), 1.23);
        assert_eq!(rounded(-0.5556, 3), -0.556);
    }

    #[test]
    fn backup_and_restore_round_trip_search_files() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::new("phase", dir.path());
        fs::create_dir_all(paths.search_path()).unwrap();
        fs::write(paths.search_path().join("state"), "42").unwrap();

        backup(&paths).unwrap();
        fs::remove_dir_all(paths.search_path()).unwrap();
        restore(&paths).unwrap();

        let restored = fs::read_to_string(paths.search_path().join("state")).unwrap();
        assert_eq!(restored, "42");
    }

    #[test]
    fn restore_keeps_newer_search_files() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::new("phase", dir.path());
        fs::create_dir_all(paths.search_path()).unwrap();
        fs::write(paths.search_path().join("state"), "old").unwrap();
        backup(&paths).unwrap();

        fs::write(paths.search_path().join("state"), "new").unwrap();
        restore(&paths).unwrap();
        let kept = fs::read_to_string(paths.search_path().join("state")).unwrap();
        assert_eq!(kept, "new");
    }

    #[test]
    fn start_time_survives_restarts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".start_time");
        fs::write(&path, "100.5").unwrap();
        assert_eq!(read_or_create_start_time(&path).unwrap(), 100.5);
    }
}
