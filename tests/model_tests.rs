
use std::collections::HashMap;

use modelfit_lib::{
    CollectionPriorModel, ComponentInstance, ModelFitError, ModelMapper, Parameter, Prior,
    PriorKind, PriorModel,
};
use test_utils::{exponential_class, gaussian_class, gaussian_model, load_config};

/// Configured defaults are inherited from the nearest ancestor class
#[test]
fn test_config_defaults_follow_class_lineage() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config(dir.path());

    let gaussian = PriorModel::from_config(gaussian_class(), &config).unwrap();
    assert_eq!(
        gaussian.prior("centre").unwrap().kind(),
        &PriorKind::Uniform {
            lower_limit: 0.0,
            upper_limit: 10.0
        }
    );
    assert!(matches!(
        gaussian.prior("intensity").unwrap().kind(),
        PriorKind::LogUniform { .. }
    ));

    let exponential = PriorModel::from_config(exponential_class(), &config).unwrap();
    assert_eq!(exponential.parameter("offset"), Some(&Parameter::Fixed(0.0)));
    assert!(exponential.prior("rate").unwrap().is_gaussian());
}

#[test]
fn test_missing_default_prior_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config(dir.path());
    let class = modelfit_lib::ComponentClass::new("Unknown", ["width"]);

    let err = PriorModel::from_config(class, &config).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ModelFitError>(),
        Some(ModelFitError::Config(_))
    ));
}

#[test]
fn test_mapper_names_labels_and_counts() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config(dir.path());

    let mut model = gaussian_model(&config);
    model.add_model(
        "exponential",
        PriorModel::from_config(exponential_class(), &config).unwrap(),
    );

    assert_eq!(model.prior_count(), 5);
    assert_eq!(model.constant_count(), 1);
    assert_eq!(
        model.param_names(),
        vec![
            "gaussian_centre",
            "gaussian_intensity",
            "gaussian_sigma",
            "exponential_centre",
            "exponential_rate"
        ]
    );
    assert_eq!(model.constant_names(), vec!["exponential_offset"]);

    let labels = model.param_labels(&config.labels);
    assert_eq!(labels[0], "x_{\\mathrm{g1}}");
    assert_eq!(labels[2], "\\sigma_{\\mathrm{g1}}");
    // Exponential has no subscript of its own and inherits the Profile one
    assert_eq!(labels[3], "x_{\\mathrm{p2}}");
    assert_eq!(labels[4], "\\lambda_{\\mathrm{p2}}");
}

#[test]
fn test_replaced_component_keeps_its_number() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config(dir.path());
    let mut model = gaussian_model(&config);
    model.add_model(
        "exponential",
        PriorModel::from_config(exponential_class(), &config).unwrap(),
    );
    model.add_model(
        "gaussian",
        PriorModel::from_config(gaussian_class(), &config).unwrap(),
    );

    assert_eq!(model.entries()[0].0, "gaussian");
    // The replacement priors are newer, so they sort after the exponential ones
    let labels = model.param_labels(&config.labels);
    assert_eq!(labels.len(), 5);
    assert_eq!(labels[0], "x_{\\mathrm{p2}}");
    assert_eq!(labels[2], "x_{\\mathrm{g1}}");
    assert_eq!(labels[4], "\\sigma_{\\mathrm{g1}}");
}

#[test]
fn test_unit_vectors_map_through_priors() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config(dir.path());
    let model = gaussian_model(&config);

    let physical = model
        .physical_vector_from_hypercube_vector(&[0.5, 0.5, 1.0])
        .unwrap();
    assert!((physical[0] - 5.0).abs() < 1e-12);
    // LogUniform(0.01, 100) has its median at 1
    assert!((physical[1] - 1.0).abs() < 1e-12);
    assert!((physical[2] - 5.0).abs() < 1e-12);

    let instance = model.instance_from_unit_vector(&[0.1, 0.5, 0.2]).unwrap();
    assert!((instance.value("gaussian.centre").unwrap() - 1.0).abs() < 1e-12);
    assert!((instance.value("gaussian.sigma").unwrap() - 1.0).abs() < 1e-12);

    let err = model.instance_from_unit_vector(&[0.5, 0.5]).unwrap_err();
    assert_eq!(
        err.downcast_ref::<ModelFitError>(),
        Some(&ModelFitError::Dimension {
            expected: 3,
            found: 2
        })
    );
}

#[test]
fn test_physical_values_outside_limits_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config(dir.path());
    let model = gaussian_model(&config);

    let err = model
        .instance_from_physical_vector(&[11.0, 1.0, 1.0])
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ModelFitError>(),
        Some(ModelFitError::PriorLimit { .. })
    ));
}

#[test]
fn test_tied_priors_count_once() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config(dir.path());

    let mut first = PriorModel::from_config(gaussian_class(), &config).unwrap();
    let mut second = PriorModel::from_config(gaussian_class(), &config).unwrap();
    let shared = Prior::uniform(2.0, 4.0).unwrap();
    first.set_prior("centre", shared.clone()).unwrap();
    second.set_prior("centre", shared).unwrap();

    let mut model = ModelMapper::new();
    model.add_collection(
        "lines",
        CollectionPriorModel::new().with("a", first).with("b", second),
    );
    assert_eq!(model.prior_count(), 5);

    let instance = model.instance_from_prior_medians().unwrap();
    let lines = instance.collection("lines").unwrap();
    assert_eq!(lines[0].1.get("centre"), Some(3.0));
    assert_eq!(lines[1].1.get("centre"), Some(3.0));
}

#[test]
fn test_fixed_entries_pass_through_instances() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config(dir.path());
    let mut model = gaussian_model(&config);
    model.add_fixed(
        "background",
        ComponentInstance::new("Constant", [("level", 0.25)]),
    );

    let instance = model.instance_from_prior_medians().unwrap();
    assert_eq!(instance.value("background.level"), Some(0.25));
    assert_eq!(model.prior_count(), 3);
}

/// Linked priors use the configured widths and limits of each parameter
#[test]
fn test_gaussian_linking_uses_configured_widths() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config(dir.path());
    let model = gaussian_model(&config);

    let linked = model
        .mapper_from_gaussian_means(&[6.0, 2.0, 1.0], &config)
        .unwrap();
    let priors = linked.priors();
    assert_eq!(
        priors[0].kind(),
        &PriorKind::Gaussian {
            mean: 6.0,
            sigma: 0.5,
            lower_limit: f64::NEG_INFINITY,
            upper_limit: f64::INFINITY
        }
    );
    assert_eq!(
        priors[1].kind(),
        &PriorKind::Gaussian {
            mean: 2.0,
            sigma: 1.0,
            lower_limit: 0.0,
            upper_limit: f64::INFINITY
        }
    );
    assert_eq!(
        priors[2].kind(),
        &PriorKind::Gaussian {
            mean: 1.0,
            sigma: 0.25,
            lower_limit: 0.0,
            upper_limit: f64::INFINITY
        }
    );

    // Searches accept the linked model straight away
    let instance = linked.instance_from_prior_medians().unwrap();
    assert!((instance.value("gaussian.centre").unwrap() - 6.0).abs() < 1e-12);
}

#[test]
fn test_gaussian_linking_width_overrides() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config(dir.path());
    let model = gaussian_model(&config);
    let tuples = [(6.0, 0.0), (2.0, 3.0), (1.0, 0.0)];

    let absolute = model
        .mapper_from_gaussian_tuples(&tuples, Some(0.2), None, &config)
        .unwrap();
    let sigmas: Vec<f64> = absolute
        .priors()
        .iter()
        .map(|p| match p.kind() {
            PriorKind::Gaussian { sigma, .. } => *sigma,
            other => panic!("expected a Gaussian prior, got {other:?}"),
        })
        .collect();
    // The tuple sigma wins when it is wider
    assert_eq!(sigmas, vec![0.2, 3.0, 0.2]);

    let err = model
        .mapper_from_gaussian_tuples(&tuples, Some(0.2), Some(0.1), &config)
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ModelFitError>(),
        Some(ModelFitError::Prior(_))
    ));
}

#[test]
fn test_partial_prior_arguments_keep_other_priors() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config(dir.path());
    let model = gaussian_model(&config);
    let centre = model.priors()[0].clone();
    let sigma_id = model.priors()[2].id();

    let mut arguments = HashMap::new();
    arguments.insert(centre.id(), Prior::uniform(4.0, 5.0).unwrap());
    let narrowed = model.mapper_from_partial_prior_arguments(&arguments);

    let priors = narrowed.priors();
    assert_eq!(priors.len(), 3);
    // The replacement is the newest prior, so it now sorts last
    assert_eq!(
        priors[2].kind(),
        &PriorKind::Uniform {
            lower_limit: 4.0,
            upper_limit: 5.0
        }
    );
    assert!(priors.iter().any(|p| p.id() == sigma_id));
    assert!(priors.iter().all(|p| p.id() != centre.id()));
}

#[test]
fn test_info_lists_every_parameter() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config(dir.path());
    let model = gaussian_model(&config);

    let info = model.info();
    let lines: Vec<&str> = info.lines().collect();
    assert_eq!(lines[0], "gaussian");
    assert!(lines[1].starts_with("    centre"));
    assert!(lines[1].ends_with("UniformPrior, lower_limit = 0.0, upper_limit = 10.0"));
    assert_eq!(lines[1].len(), 100);
    assert_eq!(lines.len(), 4);
}
