use approx::assert_relative_eq;
use gwinfer_core::RngHandle;
use gwinfer_sampler::config::InferenceConfig;
use gwinfer_sampler::model::{build_model, UniformPrior};

fn config(model: &str, params: &[&str]) -> InferenceConfig {
    let mut text = format!("model:\n{model}\nvariable_params:\n");
    for name in params {
        text.push_str(&format!("  {name}: {{min: -10.0, max: 10.0}}\n"));
    }
    text.push_str("sampler:\n  name: emcee\n  nwalkers: 8\n");
    InferenceConfig::from_yaml(&text).unwrap()
}

#[test]
fn normal_peaks_at_mean() {
    let cfg = config("  name: normal\n  mean: [1.0, -2.0]\n  var: [1.0, 4.0]", &["a", "b"]);
    let model = build_model(&cfg).unwrap();
    let at_mean = model.log_likelihood(&[1.0, -2.0]);
    let expected = -0.5 * ((2.0 * std::f64::consts::PI).ln() + (8.0 * std::f64::consts::PI).ln());
    assert_relative_eq!(at_mean, expected, epsilon = 1e-12);
    assert!(model.log_likelihood(&[2.0, -2.0]) < at_mean);
    assert_relative_eq!(at_mean - model.log_likelihood(&[1.0, 0.0]), 0.5, epsilon = 1e-12);
}

#[test]
fn normal_dimension_mismatch_is_rejected() {
    let cfg = config("  name: normal\n  mean: [0.0]", &["a", "b"]);
    let err = build_model(&cfg).err().unwrap();
    assert_eq!(err.info().code, "dimension-mismatch");
}

#[test]
fn rosenbrock_and_volcano_check_dimensions() {
    assert!(build_model(&config("  name: rosenbrock", &["a"])).is_err());
    assert!(build_model(&config("  name: volcano", &["a", "b", "c"])).is_err());
    let rosen = build_model(&config("  name: rosenbrock", &["a", "b", "c"])).unwrap();
    assert_eq!(rosen.log_likelihood(&[1.0, 1.0, 1.0]), 0.0);
    assert!(rosen.log_likelihood(&[0.0, 1.0, 0.0]) < 0.0);
}

#[test]
fn eggbox_is_periodic() {
    let model = build_model(&config("  name: eggbox", &["a", "b"])).unwrap();
    let period = 4.0 * std::f64::consts::PI;
    assert_relative_eq!(
        model.log_likelihood(&[0.3, 0.7]),
        model.log_likelihood(&[0.3 + period, 0.7]),
        epsilon = 1e-9
    );
    assert_relative_eq!(model.log_likelihood(&[0.0, 0.0]), 243.0, epsilon = 1e-12);
}

#[test]
fn uniform_prior_bounds_and_draws() {
    let cfg = config("  name: eggbox", &["a", "b"]);
    let prior = UniformPrior::from_config(&cfg);
    assert_eq!(prior.ndim(), 2);
    assert_relative_eq!(prior.log_density(&[0.0, 0.0]), -(400.0_f64).ln(), epsilon = 1e-12);
    assert_eq!(prior.log_density(&[10.0, 0.0]), f64::NEG_INFINITY);
    assert_eq!(prior.log_density(&[0.0]), f64::NEG_INFINITY);

    let mut rng = RngHandle::from_seed(3);
    for _ in 0..100 {
        let point = prior.draw(&mut rng);
        assert!(prior.log_density(&point).is_finite());
    }
}
