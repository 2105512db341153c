//! Nelder-Mead downhill simplex minimiser backed by argmin.

use std::cell::{Cell, RefCell};

use argmin::core::{CostFunction, Error, Executor, State};
use argmin::solver::neldermead::NelderMead;

use crate::error::ModelFitError;

/// Stopping criteria of [`nelder_mead`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimplexOptions {
    /// Spread of the simplex vertices below which a minimiser may stop.
    /// The argmin solver stops on `ftol` alone.
    pub xtol: f64,
    /// Standard deviation of the vertex values below which the search stops
    pub ftol: f64,
    /// Defaults to `200 * n`
    pub maxiter: Option<usize>,
    /// Defaults to `200 * n`
    pub maxfun: Option<usize>,
}

impl Default for SimplexOptions {
    fn default() -> Self {
        Self {
            xtol: 1e-4,
            ftol: 1e-4,
            maxiter: None,
            maxfun: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimplexOutcome {
    pub x: Vec<f64>,
    pub fun: f64,
    pub iterations: usize,
    pub evaluations: usize,
}

const NONZERO_DELTA: f64 = 0.05;
const ZERO_DELTA: f64 = 0.00025;

/// `x0` plus one vertex per coordinate, perturbed by 5% (or set to
/// `0.00025` when the coordinate is zero).
pub fn initial_simplex(x0: &[f64]) -> Vec<Vec<f64>> {
    let mut simplex = Vec::with_capacity(x0.len() + 1);
    simplex.push(x0.to_vec());
    for k in 0..x0.len() {
        let mut vertex = x0.to_vec();
        vertex[k] = if vertex[k] != 0.0 {
            (1.0 + NONZERO_DELTA) * vertex[k]
        } else {
            ZERO_DELTA
        };
        simplex.push(vertex);
    }
    simplex
}

/// Counts evaluations of the objective and keeps the best vertex.
struct Tracked<F> {
    f: RefCell<F>,
    calls: Cell<usize>,
    best: RefCell<Option<(Vec<f64>, f64)>>,
}

impl<F> Tracked<F>
where
    F: FnMut(&[f64]) -> f64,
{
    fn evaluate(&self, x: &[f64]) -> f64 {
        let value = (self.f.borrow_mut())(x);
        self.calls.set(self.calls.get() + 1);
        // NaN ranks as +inf
        let value = if value.is_nan() { f64::INFINITY } else { value };
        let mut best = self.best.borrow_mut();
        if best.as_ref().map_or(true, |(_, fun)| value < *fun) {
            *best = Some((x.to_vec(), value));
        }
        value
    }
}

/// The argmin problem. Stops the executor once `maxfun` evaluations are spent.
struct Budgeted<'a, F> {
    tracked: &'a Tracked<F>,
    maxfun: usize,
}

impl<F> CostFunction for Budgeted<'_, F>
where
    F: FnMut(&[f64]) -> f64,
{
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, param: &Self::Param) -> Result<Self::Output, Error> {
        if self.tracked.calls.get() >= self.maxfun {
            return Err(ModelFitError::Search(format!(
                "simplex evaluation budget of {} spent",
                self.maxfun
            ))
            .into());
        }
        Ok(self.tracked.evaluate(param))
    }
}

/// Minimises `f` starting from `x0` with the fmin coefficients (reflection 1,
/// expansion 2, contraction 0.5, shrink 0.5).
///
/// Running out of `maxiter` iterations or `maxfun` evaluations returns the
/// best vertex seen so far.
pub fn nelder_mead<F>(f: F, x0: &[f64], options: &SimplexOptions) -> SimplexOutcome
where
    F: FnMut(&[f64]) -> f64,
{
    let n = x0.len();
    let tracked = Tracked {
        f: RefCell::new(f),
        calls: Cell::new(0),
        best: RefCell::new(None),
    };

    let mut iterations = 0;
    if n > 0 {
        let maxiter = options.maxiter.unwrap_or(200 * n);
        let maxfun = options.maxfun.unwrap_or(200 * n);
        let problem = Budgeted {
            tracked: &tracked,
            maxfun,
        };
        let run = NelderMead::new(initial_simplex(x0))
            .with_sd_tolerance(options.ftol.max(0.0))
            .and_then(|solver| {
                Executor::new(problem, solver)
                    .configure(|state| state.max_iters(maxiter as u64))
                    .run()
            });
        match run {
            Ok(result) => {
                iterations = result.state().get_iter() as usize;
                tracing::debug!(
                    iterations,
                    termination = ?result.state().get_termination_status(),
                    "simplex finished"
                );
            }
            Err(e) => tracing::debug!(error = %e, "simplex stopped early"),
        }
    }

    let evaluations = tracked.calls.get();
    let (x, fun) = match tracked.best.into_inner() {
        Some(best) => best,
        // Zero dimensions, or a budget too small for a single vertex
        None => {
            let fun = (tracked.f.into_inner())(x0);
            let fun = if fun.is_nan() { f64::INFINITY } else { fun };
            return SimplexOutcome {
                x: x0.to_vec(),
                fun,
                iterations,
                evaluations: evaluations + 1,
            };
        }
    };
    SimplexOutcome {
        x,
        fun,
        iterations,
        evaluations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_simplex_perturbs_each_coordinate() {
        let simplex = initial_simplex(&[2.0, 0.0]);
        assert_eq!(simplex.len(), 3);
        assert_eq!(simplex[0], vec![2.0, 0.0]);
        assert!((simplex[1][0] - 2.1).abs() < 1e-12);
        assert_eq!(simplex[1][1], 0.0);
        assert_eq!(simplex[2], vec![2.0, ZERO_DELTA]);
    }

    #[test]
    fn finds_minimum_of_shifted_quadratic() {
        let outcome = nelder_mead(
            |x| (x[0] - 1.0).powi(2) + 2.0 * (x[1] + 0.5).powi(2),
            &[0.0, 0.0],
            &SimplexOptions {
                xtol: 1e-8,
                ftol: 1e-10,
                maxiter: Some(2000),
                maxfun: Some(4000),
            },
        );
        assert!((outcome.x[0] - 1.0).abs() < 1e-3, "{outcome:?}");
        assert!((outcome.x[1] + 0.5).abs() < 1e-3, "{outcome:?}");
        assert!(outcome.fun < 1e-6);
    }

    #[test]
    fn rosenbrock_converges_from_standard_start() {
        let rosenbrock = |x: &[f64]| 100.0 * (x[1] - x[0] * x[0]).powi(2) + (1.0 - x[0]).powi(2);
        let outcome = nelder_mead(
            rosenbrock,
            &[-1.2, 1.0],
            &SimplexOptions {
                xtol: 1e-8,
                ftol: 1e-10,
                maxiter: Some(5000),
                maxfun: Some(10000),
            },
        );
        assert!((outcome.x[0] - 1.0).abs() < 1e-2, "{outcome:?}");
        assert!((outcome.x[1] - 1.0).abs() < 2e-2, "{outcome:?}");
    }

    #[test]
    fn zero_dimensions_evaluate_once() {
        let mut calls = 0;
        let outcome = nelder_mead(
            |_| {
                calls += 1;
                3.0
            },
            &[],
            &SimplexOptions::default(),
        );
        assert_eq!(calls, 1);
        assert_eq!(outcome.fun, 3.0);
        assert!(outcome.x.is_empty());
    }

    #[test]
    fn evaluation_budget_is_respected() {
        let outcome = nelder_mead(
            |x| x.iter().map(|v| v * v).sum(),
            &[5.0, 5.0, 5.0],
            &SimplexOptions {
                maxfun: Some(20),
                ..SimplexOptions::default()
            },
        );
        assert_eq!(outcome.evaluations, 20, "{outcome:?}");
        assert!(outcome.fun <= 75.0, "{outcome:?}");
    }

    #[test]
    fn nan_values_rank_last() {
        let outcome = nelder_mead(
            |x| if x[0] < 0.0 { f64::NAN } else { (x[0] - 1.0).powi(2) },
            &[0.5],
            &SimplexOptions {
                ftol: 1e-12,
                ..SimplexOptions::default()
            },
        );
        assert!((outcome.x[0] - 1.0).abs() < 1e-3, "{outcome:?}");
    }
}
