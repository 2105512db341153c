
use std::sync::{Arc, Mutex};

use modelfit_lib::{DownhillSimplex, Paths, Phase, Pipeline, PriorKind};
use test_utils::{gaussian_model, load_config, TargetAnalysis};

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

/// The second phase starts from the Gaussian priors linked from the first
#[test]
fn test_linked_phase_starts_at_previous_best_fit() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config(dir.path());
    let model = gaussian_model(&config);

    let first = Phase::new(
        Box::new(DownhillSimplex::new(Paths::new("phase_1", dir.path()), &config).unwrap()),
        model,
    );

    let start: Arc<Mutex<Vec<f64>>> = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&start);
    let refine = DownhillSimplex::new(Paths::new("phase_2", dir.path()), &config)
        .unwrap()
        .with_fmin(move |objective, x0, _options| {
            *recorder.lock().unwrap() = x0.to_vec();
            objective(x0);
            x0.to_vec()
        });
    let second = Phase::linked(Box::new(refine), |results| {
        Ok(results.from_phase("phase_1")?.model.clone())
    });

    let pipeline = Pipeline::new("line_fit", vec![first, second]).unwrap();
    assert_eq!(pipeline[1].pipeline_name(), Some("line_fit"));
    let results = pipeline.run(&line_targets()).unwrap();

    assert_eq!(results.len(), 2);
    let phase_1 = results.from_phase("phase_1").unwrap();
    assert_eq!(*start.lock().unwrap(), phase_1.best_physical);

    let phase_2 = results.last().unwrap();
    assert_eq!(phase_2.log_likelihood, phase_1.log_likelihood);
    assert!(phase_2
        .model
        .priors()
        .iter()
        .all(|prior| matches!(prior.kind(), PriorKind::Gaussian { .. })));
}

#[test]
fn test_composed_pipelines_run_every_phase() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config(dir.path());
    let phase = |name: &str| {
        let search = DownhillSimplex::new(Paths::new(name, dir.path()), &config)
            .unwrap()
            .with_fmin(|objective, x0, _options| {
                // One evaluation keeps the phase cheap
                objective(x0);
                x0.to_vec()
            });
        Phase::new(Box::new(search), gaussian_model(&config))
    };

    let one = Pipeline::new("one", vec![phase("a")]).unwrap();
    let two = Pipeline::new("two", vec![phase("b")]).unwrap();
    let composed = one + two;
    assert_eq!(composed.name(), "one + two");
    assert_eq!(composed.len(), 2);

    let analysis = line_targets();
    let results = composed.run(&analysis).unwrap();
    let names: Vec<&str> = results.iter().map(|(name, _)| name).collect();
    assert_eq!(names, ["a", "b"]);
    assert_eq!(analysis.calls(), 2);
}
