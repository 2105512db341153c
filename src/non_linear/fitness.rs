use std::sync::{Mutex, PoisonError};

use crate::config::OutputConfig;
use crate::model::ModelInstance;
use crate::non_linear::paths::Paths;
use crate::non_linear::run;
use crate::non_linear::Analysis;

/// Fires on every `interval`-th call. Non-positive intervals (`-1` in
/// configuration) never fire.
#[derive(Debug, Clone)]
pub struct IntervalCounter {
    count: u64,
    interval: i64,
}

impl IntervalCounter {
    pub fn new(interval: i64) -> Self {
        Self { count: 0, interval }
    }

    pub fn tick(&mut self) -> bool {
        if self.interval <= 0 {
            return false;
        }
        self.count += 1;
        self.count % self.interval as u64 == 0
    }
}

#[derive(Debug)]
struct FitnessState {
    best: Option<(ModelInstance, f64)>,
    evaluations: u64,
    should_log: IntervalCounter,
    should_visualise: IntervalCounter,
    should_backup: IntervalCounter,
}

/// Wraps an [`Analysis`] for a search: scores instances and tracks the best one.
///
/// The analysis is called without holding the internal lock, so a search may
/// evaluate from several threads at once.
pub struct Fitness<'a> {
    analysis: &'a dyn Analysis,
    paths: &'a Paths,
    state: Mutex<FitnessState>,
}

impl<'a> Fitness<'a> {
    pub fn new(analysis: &'a dyn Analysis, paths: &'a Paths, output: &OutputConfig) -> Self {
        Self {
            analysis,
            paths,
            state: Mutex::new(FitnessState {
                best: None,
                evaluations: 0,
                should_log: IntervalCounter::new(output.log_interval),
                should_visualise: IntervalCounter::new(output.visualise_interval),
                should_backup: IntervalCounter::new(output.backup_interval),
            }),
        }
    }

    /// Log likelihood of `instance`; a [`FitError`](crate::FitError) scores `-inf`.
    pub fn fit_instance(&self, instance: ModelInstance) -> f64 {
        let likelihood = match self.analysis.log_likelihood(&instance) {
            Ok(likelihood) => likelihood,
            Err(e) => {
                tracing::info!(error = %e, "fit failed, scoring -inf");
                f64::NEG_INFINITY
            }
        };

        let mut visualise = None;
        let (backup, log) = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.evaluations += 1;

            let improved = state
                .best
                .as_ref()
                .map_or(!likelihood.is_nan(), |(_, best)| likelihood > *best);
            if improved {
                if state.should_visualise.tick() {
                    visualise = Some(instance.clone());
                }
                state.best = Some((instance, likelihood));
            }

            let backup = state.should_backup.tick();
            let log = state.should_log.tick().then(|| {
                (
                    state.evaluations,
                    state.best.as_ref().map_or(f64::NEG_INFINITY, |(_, l)| *l),
                )
            });
            (backup, log)
        };

        if let Some(instance) = visualise {
            if let Err(e) = self
                .analysis
                .visualize(&instance, &self.paths.image_path(), true)
            {
                tracing::warn!(error = %e, "visualisation during search failed");
            }
        }
        if backup {
            if let Err(e) = run::backup(self.paths) {
                tracing::warn!(error = %e, "backup of search folder failed");
            }
        }
        if let Some((evaluations, best)) = log {
            tracing::info!(
                search = %self.paths.name(),
                evaluations,
                max_log_likelihood = best,
                "search progress"
            );
        }

        likelihood
    }

    /// Best instance seen so far with its log likelihood.
    pub fn best(&self) -> Option<(ModelInstance, f64)> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .best
            .clone()
    }

    pub fn max_log_likelihood(&self) -> f64 {
        self.best().map_or(f64::NEG_INFINITY, |(_, l)| l)
    }

    pub fn evaluations(&self) -> u64 {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .evaluations
    }
}
