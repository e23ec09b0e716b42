use std::fs;
use std::path::Path;

use clap::Parser;
use gwinfer_cli::args::{InferenceArgs, PlotAcfArgs, RunTarget};
use gwinfer_cli::scheme::ProcessingScheme;
use gwinfer_sampler::config::{BurnInFunction, InferenceConfig, SamplerKind};
use tempfile::tempdir;

fn parse(out: &Path, extra: &[&str]) -> InferenceArgs {
    let mut argv = vec![
        "gwinfer".to_string(),
        "--config-files".into(),
        "run.yaml".into(),
        "--output-file".into(),
        out.display().to_string(),
    ];
    argv.extend(extra.iter().map(|s| s.to_string()));
    InferenceArgs::try_parse_from(argv).unwrap()
}

fn code_of(args: &InferenceArgs) -> String {
    args.validate().unwrap_err().info().code.clone()
}

#[test]
fn iteration_target_is_accepted() {
    let dir = tempdir().unwrap();
    let args = parse(
        &dir.path().join("out.json"),
        &["--niterations", "100", "--checkpoint-interval", "10"],
    );
    assert_eq!(args.validate().unwrap(), RunTarget::Iterations(100));
    assert_eq!(args.interval(), 10);
    assert_eq!(args.seed, 0);
}

#[test]
fn both_targets_conflict() {
    let dir = tempdir().unwrap();
    let args = parse(
        &dir.path().join("out.json"),
        &[
            "--niterations",
            "100",
            "--n-independent-samples",
            "50",
            "--checkpoint-interval",
            "10",
        ],
    );
    assert_eq!(code_of(&args), "conflicting-target");
}

#[test]
fn a_target_is_required() {
    let dir = tempdir().unwrap();
    let args = parse(&dir.path().join("out.json"), &["--checkpoint-interval", "10"]);
    assert_eq!(code_of(&args), "missing-target");
}

#[test]
fn checkpoint_interval_is_required_and_positive() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("out.json");
    assert_eq!(code_of(&parse(&out, &["--niterations", "10"])), "checkpoint-interval");
    assert_eq!(
        code_of(&parse(&out, &["--niterations", "10", "--checkpoint-interval", "0"])),
        "checkpoint-interval"
    );
}

#[test]
fn existing_output_needs_force() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("out.json");
    fs::write(&out, "{}").unwrap();
    let args = parse(&out, &["--niterations", "10", "--checkpoint-interval", "5"]);
    assert_eq!(code_of(&args), "output-exists");
    let forced = parse(&out, &["--niterations", "10", "--checkpoint-interval", "5", "--force"]);
    assert!(forced.validate().is_ok());
}

#[test]
fn instruments_and_cutoffs() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("out.json");
    let base = ["--niterations", "10", "--checkpoint-interval", "5"];
    let with = |extra: &[&str]| {
        let mut all = base.to_vec();
        all.extend_from_slice(extra);
        parse(&out, &all)
    };

    let ok = with(&["--instruments", "H1", "L1", "--low-frequency-cutoff", "20"]);
    assert!(ok.validate().is_ok());
    assert_eq!(ok.data_options().instruments, vec!["H1", "L1"]);

    assert_eq!(code_of(&with(&["--instruments", "H1"])), "frequency-cutoff");
    assert_eq!(
        code_of(&with(&["--instruments", "h1", "--low-frequency-cutoff", "20"])),
        "instrument-name"
    );
    assert_eq!(
        code_of(&with(&["--instruments", "LHO", "--low-frequency-cutoff", "20"])),
        "instrument-name"
    );
    assert_eq!(
        code_of(&with(&["--low-frequency-cutoff", "30", "--high-frequency-cutoff", "20"])),
        "frequency-cutoff"
    );
    assert_eq!(code_of(&with(&["--low-frequency-cutoff", "0"])), "frequency-cutoff");
}

#[test]
fn processing_scheme_parsing() {
    assert_eq!(
        "cpu".parse::<ProcessingScheme>().unwrap(),
        ProcessingScheme::Cpu { threads: None }
    );
    assert_eq!(
        "cpu:4".parse::<ProcessingScheme>().unwrap().threads(),
        Some(4)
    );
    assert!("cuda".parse::<ProcessingScheme>().is_err());
    assert!("cpu:0".parse::<ProcessingScheme>().is_err());

    let dir = tempdir().unwrap();
    let out = dir.path().join("out.json");
    let args = parse(
        &out,
        &[
            "--niterations",
            "10",
            "--checkpoint-interval",
            "5",
            "--processing-scheme",
            "cpu:2",
            "--nprocesses",
            "3",
        ],
    );
    assert_eq!(args.scheme().unwrap().threads(), Some(3));
    let bad = parse(
        &out,
        &["--niterations", "10", "--checkpoint-interval", "5", "--processing-scheme", "mpi"],
    );
    assert_eq!(code_of(&bad), "unknown-scheme");
}

#[test]
fn overrides_replace_configuration() {
    let mut config = InferenceConfig::from_yaml(
        r#"
model:
  name: eggbox
variable_params:
  x: {min: 0.0, max: 10.0}
sampler:
  name: emcee
  nwalkers: 4
"#,
    )
    .unwrap();
    let dir = tempdir().unwrap();
    let args = parse(
        &dir.path().join("out.json"),
        &[
            "--sampler",
            "emcee_pt",
            "--nwalkers",
            "10",
            "--ntemps",
            "3",
            "--burn-in-function",
            "max_posterior",
            "nacl",
            "--min-burn-in",
            "7",
        ],
    );
    args.apply_overrides(&mut config).unwrap();
    assert_eq!(config.sampler.name, SamplerKind::EmceePt);
    assert_eq!(config.sampler.nwalkers, 10);
    assert_eq!(config.sampler.ntemps, 3);
    assert_eq!(
        config.burn_in.functions,
        vec![BurnInFunction::MaxPosterior, BurnInFunction::Nacl]
    );
    assert_eq!(config.burn_in.min_burn_in, 7);

    let bad = parse(&dir.path().join("out.json"), &["--burn-in-function", "ks"]);
    assert!(bad.apply_overrides(&mut config).is_err());
}

#[test]
fn plot_arguments() {
    let args = PlotAcfArgs::try_parse_from([
        "gwinfer-plot-acf",
        "--input-file",
        "run.json",
        "--output-file",
        "acf.svg",
        "--ymin",
        "-0.5",
        "--ymax",
        "1",
        "--temps",
        "all",
    ])
    .unwrap();
    assert!(args.validate().is_ok());
    assert_eq!(args.ymin, Some(-0.5));
    assert_eq!(args.temperatures(3).unwrap(), vec![0, 1, 2]);

    let flipped = PlotAcfArgs::try_parse_from([
        "gwinfer-plot-acf",
        "--input-file",
        "run.json",
        "--output-file",
        "acf.svg",
        "--ymin",
        "1",
        "--ymax",
        "0",
    ])
    .unwrap();
    assert_eq!(flipped.validate().unwrap_err().info().code, "y-limits");
    assert_eq!(flipped.temperatures(4).unwrap(), vec![0]);

    let png = PlotAcfArgs::try_parse_from([
        "gwinfer-plot-acf",
        "--input-file",
        "run.json",
        "--output-file",
        "acf.png",
    ])
    .unwrap();
    assert_eq!(png.validate().unwrap_err().info().code, "output-format");
}
