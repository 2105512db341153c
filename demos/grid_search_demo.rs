// Example: grid_search_demo.rs
// Sweeps the centre and sigma of a Gaussian over a 4x4 grid, running a
// DownhillSimplex fit in every cell on a pool of worker threads, and writes
// the figure of merit as a heat map.
//
// Usage:
//     cargo run --example grid_search_demo -- [output_dir]
//
// Configuration is read from demos/config (non_linear/GridSearch.toml sets
// the step size and the number of cores).

use std::env;
use std::path::Path;

use anyhow::Result;
use modelfit_lib::{
    logging, Analysis, ComponentClass, Config, DownhillSimplex, FitError, GridSearch,
    ModelInstance, ModelMapper, Paths, PriorModel,
};

/// Two-peaked likelihood in (centre, sigma) so that the grid shows structure.
struct TwoPeaks;

impl Analysis for TwoPeaks {
    fn log_likelihood(&self, instance: &ModelInstance) -> Result<f64, FitError> {
        let value = |path: &str| {
            instance
                .value(path)
                .ok_or_else(|| FitError::new(format!("missing {path}")))
        };
        let centre = value("gaussian.centre")?;
        let sigma = value("gaussian.sigma")?;
        let intensity = value("gaussian.intensity")?;

        let peak = |c: f64, s: f64| -0.5 * (((centre - c) / 5.0).powi(2) + ((sigma - s) / 2.0).powi(2));
        let shape = peak(30.0, 5.0).max(peak(70.0, 18.0) - 2.0);
        Ok(shape - 0.5 * ((intensity.ln() - 10f64.ln()) / 0.5).powi(2))
    }
}

fn main() -> Result<()> {
    let output = env::args().nth(1).unwrap_or_else(|| "output".to_string());
    let config_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("demos").join("config");
    let config = Config::load(&config_dir, &output)?;
    logging::init(config.output(), Path::new(&output))?;

    let gaussian = ComponentClass::new("Gaussian", ["centre", "intensity", "sigma"]);
    let mut model = ModelMapper::new();
    model.add_model("gaussian", PriorModel::from_config(gaussian, &config)?);

    let priors = model.priors();
    let swept = [priors[0].clone(), priors[2].clone()];

    // Cells write below the grid search folder; only the settings of this
    // search are used.
    let cells = DownhillSimplex::new(Paths::new("cells", &output), &config)?;
    let search = GridSearch::new(
        Paths::new("grid_search", &output).with_folders(["grid_search_demo"]),
        Box::new(cells),
        &config,
    )?;
    println!(
        "Running {} cells on {} cores",
        search.make_lists(swept.len())?.len(),
        search.number_of_cores()
    );

    let result = search.fit(&model, &TwoPeaks, &swept)?;

    println!("\n=== Figure of merit (rows: centre, columns: sigma) ===");
    for row in result.figure_of_merit_grid() {
        let cells: Vec<String> = row.iter().map(|fom| format!("{fom:>9.3}")).collect();
        println!("{}", cells.join(" "));
    }
    if let Some(best) = result.best_result() {
        println!(
            "\nBest cell: centre {:.3}, sigma {:.3}, log likelihood {:.3}",
            best.instance.value("gaussian.centre").unwrap_or(f64::NAN),
            best.instance.value("gaussian.sigma").unwrap_or(f64::NAN),
            best.log_likelihood
        );
    }
    println!(
        "Heat map: {}",
        search.paths().image_path().join("figure_of_merit.svg").display()
    );
    Ok(())
}
