//! Visualisation settings (`visualize/general.toml`) and grid search plots.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use plotters::prelude::*;
use serde::Deserialize;

use crate::error::ModelFitError;
use crate::grid_search::GridSearchResult;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VisualizeConfig {
    #[serde(default)]
    pub general: VisualizeGeneral,
}

/// The `[general]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct VisualizeGeneral {
    /// `svg`, `default` (same as `svg`) or `none`
    #[serde(default = "default_backend")]
    pub backend: String,
}

impl Default for VisualizeGeneral {
    fn default() -> Self {
        Self {
            backend: default_backend(),
        }
    }
}

fn default_backend() -> String {
    "default".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Svg,
    None,
}

impl VisualizeConfig {
    pub fn backend(&self) -> Result<Backend> {
        match self.general.backend.trim().to_ascii_lowercase().as_str() {
            "svg" | "default" => Ok(Backend::Svg),
            "none" => Ok(Backend::None),
            other => Err(ModelFitError::Config(format!(
                "unknown visualisation backend '{other}' in visualize/general.toml"
            ))
            .into()),
        }
    }
}

/// Plots the figure of merit of a 1D (line) or 2D (heat map) grid search as
/// SVG. Returns whether a file was written; other grids and the `none`
/// backend write nothing.
pub fn plot_figure_of_merit(
    result: &GridSearchResult,
    path: &Path,
    config: &VisualizeConfig,
) -> Result<bool> {
    if config.backend()? == Backend::None {
        return Ok(false);
    }
    if !matches!(result.dimensions(), 1 | 2) || result.results.is_empty() {
        return Ok(false);
    }
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    }

    match result.dimensions() {
        1 => plot_line(result, path)?,
        _ => plot_heat_map(result, path)?,
    }
    Ok(true)
}

fn finite_range(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if lo > hi {
        return None;
    }
    // A flat range still needs a non-empty axis.
    if lo == hi {
        Some((lo - 0.5, hi + 0.5))
    } else {
        Some((lo, hi))
    }
}

/// Physical `[lower, upper)` extent of one cell along `axis`.
fn cell_extent(result: &GridSearchResult, cell: usize, axis: usize) -> (f64, f64) {
    let unit = result.lower_limit_lists[cell][axis];
    let prior = &result.grid_priors[axis];
    (prior.value_for(unit), prior.value_for(unit + result.step_size))
}

fn plot_line(result: &GridSearchResult, path: &Path) -> Result<()> {
    let points: Vec<(f64, f64)> = (0..result.results.len())
        .map(|cell| {
            let (lo, hi) = cell_extent(result, cell, 0);
            (0.5 * (lo + hi), result.results[cell].log_likelihood)
        })
        .filter(|(_, fom)| fom.is_finite())
        .collect();

    let x_range = finite_range((0..result.results.len()).flat_map(|cell| {
        let (lo, hi) = cell_extent(result, cell, 0);
        [lo, hi]
    }))
    .unwrap_or((0.0, 1.0));
    let y_range = finite_range(points.iter().map(|(_, y)| *y)).unwrap_or((0.0, 1.0));

    let root = SVGBackend::new(path, (1024, 768)).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .caption("Grid search figure of merit", ("sans-serif", 30))
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range.0..x_range.1, y_range.0..y_range.1)?;

    chart
        .configure_mesh()
        .x_desc("Cell centre")
        .y_desc("Log likelihood")
        .draw()?;

    chart.draw_series(points.iter().map(|pt| Circle::new(*pt, 3, RED.filled())))?;
    chart.draw_series(vec![PathElement::new(points, RED)])?;
    root.present()?;
    Ok(())
}

/// Blue (low) to red (high).
fn heat_colour(fraction: f64) -> RGBColor {
    let f = fraction.clamp(0.0, 1.0);
    RGBColor((255.0 * f) as u8, 64, (255.0 * (1.0 - f)) as u8)
}

fn plot_heat_map(result: &GridSearchResult, path: &Path) -> Result<()> {
    let cells = result.results.len();
    let extents: Vec<((f64, f64), (f64, f64))> = (0..cells)
        .map(|cell| (cell_extent(result, cell, 0), cell_extent(result, cell, 1)))
        .collect();

    let x_range = finite_range(extents.iter().flat_map(|(x, _)| [x.0, x.1])).unwrap_or((0.0, 1.0));
    let y_range = finite_range(extents.iter().flat_map(|(_, y)| [y.0, y.1])).unwrap_or((0.0, 1.0));
    let (fom_lo, fom_hi) =
        finite_range(result.results.iter().map(|r| r.log_likelihood)).unwrap_or((0.0, 1.0));

    let root = SVGBackend::new(path, (1024, 1024)).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .caption("Grid search figure of merit", ("sans-serif", 30))
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range.0..x_range.1, y_range.0..y_range.1)?;

    chart
        .configure_mesh()
        .x_desc("First grid prior")
        .y_desc("Second grid prior")
        .draw()?;

    chart.draw_series(extents.iter().zip(&result.results).map(|((x, y), cell)| {
        let fom = cell.log_likelihood;
        let colour = if fom.is_finite() {
            heat_colour((fom - fom_lo) / (fom_hi - fom_lo))
        } else {
            RGBColor(200, 200, 200)
        };
        Rectangle::new([(x.0, y.0), (x.1, y.1)], colour.filled())
    }))?;
    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_names_are_validated() {
        let config = |name: &str| VisualizeConfig {
            general: VisualizeGeneral {
                backend: name.to_string(),
            },
        };
        assert_eq!(config("default").backend().unwrap(), Backend::Svg);
        assert_eq!(config("SVG").backend().unwrap(), Backend::Svg);
        assert_eq!(config("none").backend().unwrap(), Backend::None);
        assert!(config("TKAgg").backend().is_err());
    }

    #[test]
    fn ranges_ignore_non_finite_values() {
        let range = finite_range([1.0, f64::NEG_INFINITY, 3.0].into_iter());
        assert_eq!(range, Some((1.0, 3.0)));
        assert_eq!(finite_range([2.0].into_iter()), Some((1.5, 2.5)));
        assert_eq!(finite_range([f64::NAN].into_iter()), None);
    }
}
