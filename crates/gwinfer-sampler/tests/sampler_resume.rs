use gwinfer_core::RunProvenance;
use gwinfer_sampler::config::InferenceConfig;
use gwinfer_sampler::model::{build_model, DataOptions};
use gwinfer_sampler::{EnsembleSampler, ResultsFile};
use tempfile::tempdir;

fn config(sampler: &str, nwalkers: usize, ntemps: usize) -> InferenceConfig {
    let text = format!(
        r#"
model:
  name: normal
  mean: [1.0, -1.0]
variable_params:
  x: {{min: -10.0, max: 10.0}}
  y: {{min: -10.0, max: 10.0}}
sampler:
  name: {sampler}
  nwalkers: {nwalkers}
  ntemps: {ntemps}
"#
    );
    InferenceConfig::from_yaml(&text).unwrap()
}

fn sampler_for(config: &InferenceConfig) -> EnsembleSampler {
    EnsembleSampler::new(build_model(config).unwrap(), &config.sampler).unwrap()
}

fn empty_file(sampler: &EnsembleSampler, config: &InferenceConfig) -> ResultsFile {
    ResultsFile::new(sampler.metadata(
        config,
        DataOptions::default(),
        RunProvenance::capture(7, "test", "0"),
    ))
}

fn straight_run(config: &InferenceConfig, iterations: usize, seed: u64) -> ResultsFile {
    let mut sampler = sampler_for(config);
    sampler.initialize_from_prior(seed).unwrap();
    sampler.run(iterations, seed).unwrap();
    let mut results = empty_file(&sampler, config);
    sampler.write_results(&mut results).unwrap();
    results
}

#[test]
fn same_seed_reproduces_samples() {
    let cfg = config("emcee", 8, 1);
    let a = straight_run(&cfg, 20, 42);
    let b = straight_run(&cfg, 20, 42);
    let c = straight_run(&cfg, 20, 43);
    assert_eq!(a.samples, b.samples);
    assert_eq!(a.acceptance, b.acceptance);
    assert_ne!(a.samples, c.samples);
}

#[test]
fn chunked_run_matches_single_run() {
    let cfg = config("emcee_pt", 8, 3);
    let whole = straight_run(&cfg, 12, 5);

    let mut sampler = sampler_for(&cfg);
    sampler.initialize_from_prior(5).unwrap();
    let mut results = empty_file(&sampler, &cfg);
    for chunk in [4, 5, 3] {
        sampler.run(chunk, 5).unwrap();
        sampler.write_results(&mut results).unwrap();
        sampler.clear_chunk();
    }
    assert_eq!(results.niterations, 12);
    assert_eq!(results.samples, whole.samples);
    assert_eq!(results.loglikelihood, whole.loglikelihood);
    assert_eq!(results.exchange, whole.exchange);
    assert_eq!(results.state, whole.state);
}

#[test]
fn resume_from_stored_file_matches_uninterrupted_run() {
    let cfg = config("emcee_pt", 8, 2);
    let whole = straight_run(&cfg, 10, 99);

    let dir = tempdir().unwrap();
    let path = dir.path().join("chk.json");
    let mut first = sampler_for(&cfg);
    first.initialize_from_prior(99).unwrap();
    first.run(6, 99).unwrap();
    let mut results = empty_file(&first, &cfg);
    first.write_results(&mut results).unwrap();
    results.store(&path).unwrap();
    drop(first);

    let mut loaded = ResultsFile::load_checked(&path).unwrap();
    let mut resumed = sampler_for(&cfg);
    resumed.set_state_from_file(&loaded).unwrap();
    assert_eq!(resumed.niterations(), 6);
    resumed.run(4, 99).unwrap();
    resumed.write_results(&mut loaded).unwrap();

    assert_eq!(loaded.niterations, 10);
    assert_eq!(loaded.samples, whole.samples);
    assert_eq!(loaded.logprior, whole.logprior);
    assert_eq!(loaded.acceptance, whole.acceptance);
}

#[test]
fn writing_to_a_stale_file_is_refused() {
    let cfg = config("emcee", 8, 1);
    let mut sampler = sampler_for(&cfg);
    sampler.initialize_from_prior(1).unwrap();
    let mut results = empty_file(&sampler, &cfg);
    sampler.run(3, 1).unwrap();
    sampler.write_results(&mut results).unwrap();
    sampler.clear_chunk();
    sampler.run(2, 1).unwrap();

    let mut stale = empty_file(&sampler, &cfg);
    let err = sampler.write_results(&mut stale).unwrap_err();
    assert_eq!(err.info().code, "out-of-sync");
    sampler.write_results(&mut results).unwrap();
    assert_eq!(results.niterations, 5);
}

#[test]
fn resume_rejects_mismatched_ensemble() {
    let small = straight_run(&config("emcee", 8, 1), 2, 3);
    let mut bigger = sampler_for(&config("emcee", 10, 1));
    let err = bigger.set_state_from_file(&small).unwrap_err();
    assert_eq!(err.info().code, "incompatible-file");
}

#[test]
fn invalid_ensembles_are_rejected() {
    let cfg = config("emcee", 7, 1);
    let err = EnsembleSampler::new(build_model(&cfg).unwrap(), &cfg.sampler).unwrap_err();
    assert_eq!(err.info().code, "nwalkers");

    let cfg = config("emcee", 2, 1);
    assert!(EnsembleSampler::new(build_model(&cfg).unwrap(), &cfg.sampler).is_err());

    let cfg = config("emcee", 8, 2);
    let err = EnsembleSampler::new(build_model(&cfg).unwrap(), &cfg.sampler).unwrap_err();
    assert_eq!(err.info().code, "ntemps");

    let mut cfg = config("emcee", 8, 1);
    cfg.sampler.stretch_scale = 1.0;
    let err = EnsembleSampler::new(build_model(&cfg).unwrap(), &cfg.sampler).unwrap_err();
    assert_eq!(err.info().code, "stretch-scale");
}

#[test]
fn running_before_initialisation_fails() {
    let cfg = config("emcee", 8, 1);
    let mut sampler = sampler_for(&cfg);
    assert_eq!(sampler.run(1, 0).unwrap_err().info().code, "not-initialised");
}

#[test]
fn cold_chain_recovers_normal_mean() {
    let cfg = config("emcee", 16, 1);
    let results = straight_run(&cfg, 1500, 2024);
    let mean = |param: &str| {
        let mut total = 0.0;
        let mut count = 0.0;
        for walker in 0..16 {
            for value in results.chain(param, 0, walker, 500, None, 1).unwrap() {
                total += value;
                count += 1.0;
            }
        }
        total / count
    };
    assert!((mean("x") - 1.0).abs() < 0.2, "x mean {}", mean("x"));
    assert!((mean("y") + 1.0).abs() < 0.2, "y mean {}", mean("y"));
    let fraction = results.acceptance.mean_fraction(0);
    assert!(fraction > 0.2 && fraction < 0.9, "acceptance {fraction}");
}
