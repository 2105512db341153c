// Example: fit_gaussian.rs
// Fits a Gaussian line profile to noisy synthetic data with a two-phase
// pipeline: a global Cmaes search, then a DownhillSimplex refinement whose
// priors are linked from the first phase.
//
// Usage:
//     cargo run --example fit_gaussian -- [output_dir]
//
// Configuration is read from demos/config. Results, model files and an SVG
// of the best fit are written below the output directory (default: output).

use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use modelfit_lib::{
    logging, Analysis, Cmaes, ComponentClass, Config, DownhillSimplex, FitError, ModelInstance,
    ModelMapper, Paths, Phase, Pipeline, PriorModel,
};
use plotters::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use statrs::distribution::Normal;

// ---------------------------------------------------------------------------
// Synthetic data
// ---------------------------------------------------------------------------

fn gaussian_line(x: f64, centre: f64, intensity: f64, sigma: f64) -> f64 {
    intensity * (-0.5 * ((x - centre) / sigma).powi(2)).exp()
}

struct Dataset {
    xs: Vec<f64>,
    ys: Vec<f64>,
    noise: f64,
}

fn simulate(centre: f64, intensity: f64, sigma: f64, noise: f64) -> Result<Dataset> {
    let mut rng = StdRng::seed_from_u64(1);
    let normal = Normal::new(0.0, noise).context("invalid noise level")?;
    let xs: Vec<f64> = (0..100).map(f64::from).collect();
    let ys = xs
        .iter()
        .map(|&x| {
            gaussian_line(x, centre, intensity, sigma)
                + rand::distributions::Distribution::sample(&normal, &mut rng)
        })
        .collect();
    Ok(Dataset { xs, ys, noise })
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

struct LineFit {
    data: Dataset,
}

impl LineFit {
    fn profile(instance: &ModelInstance) -> Result<(f64, f64, f64), FitError> {
        let get = |parameter: &str| {
            instance
                .value(&format!("gaussian.{parameter}"))
                .ok_or_else(|| FitError::new(format!("missing gaussian.{parameter}")))
        };
        Ok((get("centre")?, get("intensity")?, get("sigma")?))
    }
}

impl Analysis for LineFit {
    fn log_likelihood(&self, instance: &ModelInstance) -> Result<f64, FitError> {
        let (centre, intensity, sigma) = Self::profile(instance)?;
        if sigma <= 0.0 {
            return Err(FitError::new("sigma must be positive"));
        }
        let chi_squared: f64 = self
            .data
            .xs
            .iter()
            .zip(&self.data.ys)
            .map(|(&x, &y)| ((y - gaussian_line(x, centre, intensity, sigma)) / self.data.noise).powi(2))
            .sum();
        Ok(-0.5 * chi_squared)
    }

    fn visualize(&self, instance: &ModelInstance, image_path: &Path, _during_analysis: bool) -> Result<()> {
        let (centre, intensity, sigma) = Self::profile(instance)?;
        fs::create_dir_all(image_path)?;
        let path = image_path.join("fit.svg");

        let y_max = self.data.ys.iter().cloned().fold(f64::NEG_INFINITY, f64::max) * 1.2;
        let y_min = self.data.ys.iter().cloned().fold(f64::INFINITY, f64::min).min(0.0);

        let root = SVGBackend::new(&path, (1280, 768)).into_drawing_area();
        root.fill(&WHITE)?;
        let mut chart = ChartBuilder::on(&root)
            .margin(20)
            .caption("Gaussian line fit", ("sans-serif", 30))
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(0.0..100.0, y_min..y_max)?;
        chart.configure_mesh().x_desc("x").y_desc("Flux").draw()?;

        chart.draw_series(
            self.data
                .xs
                .iter()
                .zip(&self.data.ys)
                .map(|(&x, &y)| Circle::new((x, y), 2, BLUE.filled())),
        )?;
        let model_line: Vec<(f64, f64)> = (0..=1000)
            .map(|i| {
                let x = i as f64 * 0.1;
                (x, gaussian_line(x, centre, intensity, sigma))
            })
            .collect();
        chart.draw_series(vec![PathElement::new(model_line, RED)])?;
        root.present()?;
        Ok(())
    }
}

fn main() -> Result<()> {
    let output = env::args().nth(1).unwrap_or_else(|| "output".to_string());
    let config_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("demos").join("config");
    let config = Config::load(&config_dir, &output)?;
    logging::init(config.output(), Path::new(&output))?;

    let analysis = LineFit {
        data: simulate(50.0, 25.0, 10.0, 1.0)?,
    };

    let gaussian = ComponentClass::new("Gaussian", ["centre", "intensity", "sigma"]);
    let mut model = ModelMapper::new();
    model.add_model("gaussian", PriorModel::from_config(gaussian, &config)?);
    println!("{}", model.info());

    let global = Cmaes::new(Paths::new("phase_1_cmaes", &output).with_folders(["fit_gaussian"]), &config)?;
    let refine = DownhillSimplex::new(
        Paths::new("phase_2_simplex", &output).with_folders(["fit_gaussian"]),
        &config,
    )?;

    let pipeline = Pipeline::new(
        "fit_gaussian",
        vec![
            Phase::new(Box::new(global), model),
            Phase::linked(Box::new(refine), |results| {
                Ok(results.from_phase("phase_1_cmaes")?.model.clone())
            }),
        ],
    )?;
    let results = pipeline.run(&analysis)?;

    println!("\n=== Results ===");
    for (phase, result) in results.iter() {
        println!("{phase}: log likelihood {:.4}", result.log_likelihood);
        for (name, value) in result.model.param_names().iter().zip(&result.best_physical) {
            println!("    {name:<24} {value:.4}");
        }
    }
    println!("\nTruth: centre 50, intensity 25, sigma 10");
    Ok(())
}
