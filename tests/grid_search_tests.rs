
use std::path::Path;

use modelfit_lib::{
    Analysis, Config, DownhillSimplex, FitError, GridSearch, ModelFitError, ModelInstance,
    ModelMapper, Paths, Prior, PriorKind, PriorModel,
};
use test_utils::{gaussian_class, gaussian_model, load_config, TargetAnalysis};

fn line_targets() -> TargetAnalysis {
    TargetAnalysis::new(
        &[
            ("gaussian.centre", 6.0),
            ("gaussian.intensity", 2.0),
            ("gaussian.sigma", 1.0),
        ],
        0.1,
    )
}

fn centre_only_model(config: &Config) -> ModelMapper {
    let mut gaussian = PriorModel::from_config(gaussian_class(), config).unwrap();
    gaussian.fix("intensity", 2.0).unwrap();
    gaussian.fix("sigma", 1.0).unwrap();
    let mut model = ModelMapper::new();
    model.add_model("gaussian", gaussian);
    model
}

fn grid_search(config: &Config, root: &Path) -> GridSearch {
    let cells = DownhillSimplex::new(Paths::new("cells", root), config).unwrap();
    GridSearch::new(Paths::new("grid_search", root), Box::new(cells), config).unwrap()
}

#[test]
fn test_cell_models_narrow_the_swept_prior() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config(dir.path());
    let model = centre_only_model(&config);
    let centre = model.priors()[0].clone();

    let search = grid_search(&config, dir.path());
    assert_eq!(search.step_size(), 0.5);
    let mappers = search.model_mappers(&model, &[centre]).unwrap();

    assert_eq!(mappers.len(), 2);
    assert_eq!(
        mappers[0].priors()[0].kind(),
        &PriorKind::Uniform {
            lower_limit: 0.0,
            upper_limit: 5.0
        }
    );
    assert_eq!(
        mappers[1].priors()[0].kind(),
        &PriorKind::Uniform {
            lower_limit: 5.0,
            upper_limit: 10.0
        }
    );
}

#[test]
fn test_one_dimensional_grid_search() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config(dir.path());
    let model = centre_only_model(&config);
    let centre = model.priors()[0].clone();

    let search = grid_search(&config, dir.path());
    let result = search.fit(&model, &line_targets(), &[centre]).unwrap();

    assert_eq!(result.side_length, 2);
    assert_eq!(result.physical_lower_limit_lists, vec![vec![0.0], vec![5.0]]);
    let figures = result.figure_of_merits();
    println!("figures of merit: {figures:?}");
    assert!(figures[1] > figures[0]);

    let best = result.best_result().unwrap();
    let best_centre = best.instance.value("gaussian.centre").unwrap();
    assert!((best_centre - 6.0).abs() < 1e-2);

    // Every cell writes below the grid search folder
    assert!(search
        .paths()
        .output_path()
        .join("gaussian_centre_0.5")
        .join("model.results")
        .is_file());

    let output = search.paths().output_path();
    let mut reader = csv::Reader::from_path(output.join("grid_search.csv")).unwrap();
    let header: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
    assert_eq!(header, vec!["gaussian_centre", "figure_of_merit"]);
    assert_eq!(reader.records().count(), 2);
    assert!(search.paths().image_path().join("figure_of_merit.svg").is_file());
}

#[test]
fn test_worker_pool_matches_sequential_run() {
    let sequential_dir = tempfile::tempdir().unwrap();
    let parallel_dir = tempfile::tempdir().unwrap();

    let config = load_config(sequential_dir.path());
    let model = gaussian_model(&config);
    let swept = [model.priors()[0].clone(), model.priors()[2].clone()];
    let sequential = grid_search(&config, sequential_dir.path())
        .fit(&model, &line_targets(), &swept)
        .unwrap();

    let config = load_config(parallel_dir.path());
    let parallel = grid_search(&config, parallel_dir.path())
        .with_number_of_cores(3)
        .fit(&model, &line_targets(), &swept)
        .unwrap();

    assert_eq!(sequential.results.len(), 4);
    assert_eq!(sequential.figure_of_merits(), parallel.figure_of_merits());
    assert_eq!(sequential.lower_limit_lists, parallel.lower_limit_lists);
    assert_eq!(
        sequential.lower_limit_lists,
        vec![vec![0.0, 0.0], vec![0.0, 0.5], vec![0.5, 0.0], vec![0.5, 0.5]]
    );
    assert_eq!(parallel.figure_of_merit_grid().len(), 2);

    // Centre 6 and sigma 1 both lie in the lower-right cell
    let best = parallel.best_result().unwrap();
    assert_eq!(best.log_likelihood, parallel.figure_of_merits()[2]);
    assert!(parallel_dir
        .path()
        .join("grid_search")
        .join("gaussian_centre_0.5_gaussian_sigma_0.0")
        .is_dir());
    assert!(!parallel_dir.path().join("cells").exists());
}

#[test]
fn test_duplicate_grid_priors_are_swept_once() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config(dir.path());
    let model = centre_only_model(&config);
    let centre = model.priors()[0].clone();

    let result = grid_search(&config, dir.path())
        .fit(&model, &line_targets(), &[centre.clone(), centre])
        .unwrap();
    assert_eq!(result.dimensions(), 1);
    assert_eq!(result.results.len(), 2);
}

#[test]
fn test_grid_prior_outside_model_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config(dir.path());
    let model = centre_only_model(&config);
    let stranger = Prior::uniform(0.0, 1.0).unwrap();

    let err = grid_search(&config, dir.path())
        .fit(&model, &line_targets(), &[stranger])
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ModelFitError>(),
        Some(ModelFitError::Prior(_))
    ));
}

#[test]
fn test_unbounded_grid_prior_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config(dir.path());
    let mut gaussian = PriorModel::from_config(gaussian_class(), &config).unwrap();
    gaussian
        .set_prior("centre", Prior::gaussian(5.0, 1.0))
        .unwrap();
    let mut model = ModelMapper::new();
    model.add_model("gaussian", gaussian);
    let centre = model.priors().into_iter().find(|p| p.is_gaussian()).unwrap().clone();

    // The lowest cell starts at unit value 0, which a Gaussian maps to -inf
    let err = grid_search(&config, dir.path())
        .model_mappers(&model, &[centre])
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ModelFitError>(),
        Some(ModelFitError::Prior(_))
    ));
}

/// Scores like `TargetAnalysis` but cannot draw the final images of a fit
struct BrokenImages(TargetAnalysis);

impl Analysis for BrokenImages {
    fn log_likelihood(&self, instance: &ModelInstance) -> Result<f64, FitError> {
        self.0.log_likelihood(instance)
    }

    fn visualize(
        &self,
        _instance: &ModelInstance,
        _image_path: &Path,
        during_analysis: bool,
    ) -> anyhow::Result<()> {
        if during_analysis {
            return Ok(());
        }
        anyhow::bail!("image backend unavailable")
    }
}

#[test]
fn test_failed_cell_fails_the_grid_search() {
    for cores in [1, 2] {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(dir.path());
        let model = centre_only_model(&config);
        let centre = model.priors()[0].clone();

        let err = grid_search(&config, dir.path())
            .with_number_of_cores(cores)
            .fit(&model, &BrokenImages(line_targets()), &[centre])
            .unwrap_err();
        let message = format!("{err:#}");
        assert!(
            message.contains("grid search cell gaussian_centre_0.0 failed"),
            "{cores} cores: {message}"
        );
        assert!(message.contains("image backend unavailable"), "{message}");
        assert!(!dir.path().join("grid_search").join("grid_search.csv").exists());
    }
}
