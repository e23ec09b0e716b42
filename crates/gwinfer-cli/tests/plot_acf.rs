use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use gwinfer_cli::args::{InferenceArgs, PlotAcfArgs};
use gwinfer_cli::checkpoint::run_inference;
use gwinfer_cli::plot::{plot_acf, render_acf_svg, PlotOptions};
use gwinfer_sampler::acf::AcfSeries;
use tempfile::tempdir;

const CONFIG: &str = r#"
model:
  name: rosenbrock
variable_params:
  x: {min: -3.0, max: 3.0}
  y: {min: -3.0, max: 3.0}
sampler:
  name: emcee_pt
  nwalkers: 6
  ntemps: 2
burn_in:
  functions: [half_chain]
"#;

fn sampled_output(dir: &Path) -> PathBuf {
    let config = dir.join("run.yaml");
    fs::write(&config, CONFIG).unwrap();
    let output = dir.join("run.json");
    let args = InferenceArgs::try_parse_from([
        "gwinfer".to_string(),
        "--config-files".into(),
        config.display().to_string(),
        "--output-file".into(),
        output.display().to_string(),
        "--niterations".into(),
        "40".into(),
        "--checkpoint-interval".into(),
        "20".into(),
    ])
    .unwrap();
    run_inference(&args).unwrap();
    output
}

fn plot_args(input: &Path, output: &Path, extra: &[&str]) -> PlotAcfArgs {
    let mut argv = vec![
        "gwinfer-plot-acf".to_string(),
        "--input-file".into(),
        input.display().to_string(),
        "--output-file".into(),
        output.display().to_string(),
    ];
    argv.extend(extra.iter().map(|s| s.to_string()));
    PlotAcfArgs::try_parse_from(argv).unwrap()
}

#[test]
fn default_plot_averages_walkers_of_cold_chain() {
    let dir = tempdir().unwrap();
    let input = sampled_output(dir.path());
    let svg_path = dir.path().join("plots/acf.svg");
    let report = plot_acf(&plot_args(&input, &svg_path, &[])).unwrap();

    assert_eq!(report.curves, 2);
    // half_chain burn-in of the first checkpoint.
    assert_eq!(report.thin_start, 10);
    let svg = fs::read_to_string(&svg_path).unwrap();
    assert!(svg.starts_with("<svg"));
    assert_eq!(svg.matches("<polyline").count(), 2);
    assert!(svg.contains("x (temp 0, mean)"));
    assert!(svg.contains("y (temp 0, mean)"));
}

#[test]
fn walkers_and_all_temperatures() {
    let dir = tempdir().unwrap();
    let input = sampled_output(dir.path());
    let svg_path = dir.path().join("acf.svg");
    let report = plot_acf(&plot_args(
        &input,
        &svg_path,
        &[
            "--parameters",
            "x",
            "--walkers",
            "0",
            "5",
            "--temps",
            "all",
            "--thin-start",
            "0",
            "--thin-interval",
            "2",
        ],
    ))
    .unwrap();
    assert_eq!(report.curves, 4);
    let svg = fs::read_to_string(&svg_path).unwrap();
    assert!(svg.contains("x (temp 1, walker 5)"));
    assert!(!svg.contains("y (temp"));
}

#[test]
fn bad_selections_are_rejected() {
    let dir = tempdir().unwrap();
    let input = sampled_output(dir.path());
    let svg_path = dir.path().join("acf.svg");
    let code = |extra: &[&str]| {
        plot_acf(&plot_args(&input, &svg_path, extra))
            .unwrap_err()
            .info()
            .code
            .clone()
    };
    assert_eq!(code(&["--parameters", "distance"]), "unknown-parameter");
    assert_eq!(code(&["--walkers", "6"]), "walker-range");
    assert_eq!(code(&["--temps", "2"]), "temp-range");
    assert_eq!(code(&["--ymin", "1", "--ymax", "1"]), "y-limits");
    assert!(!svg_path.exists());
}

#[test]
fn invalid_input_file_is_rejected() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("broken.json");
    fs::write(&input, "not json").unwrap();
    let err = plot_acf(&plot_args(&input, &dir.path().join("acf.svg"), &[])).unwrap_err();
    assert_eq!(err.info().code, "invalid-input");

    let missing = dir.path().join("missing.json");
    let err = plot_acf(&plot_args(&missing, &dir.path().join("acf.svg"), &[])).unwrap_err();
    assert_eq!(err.info().code, "invalid-input");
    assert!(err.info().context.contains_key("cause"));
}

#[test]
fn tampered_checksum_is_rejected_with_cause() {
    let dir = tempdir().unwrap();
    let input = sampled_output(dir.path());
    let mut payload: serde_json::Value = serde_json::from_str(&fs::read_to_string(&input).unwrap()).unwrap();
    payload["checksum"] = serde_json::Value::String("00".into());
    fs::write(&input, serde_json::to_string(&payload).unwrap()).unwrap();

    let output = dir.path().join("acf.svg");
    let err = plot_acf(&plot_args(&input, &output, &[])).unwrap_err();
    assert_eq!(err.info().code, "invalid-input");
    assert!(err.info().context["cause"].contains("checksum"), "{err}");
    assert!(!output.exists());
}

#[test]
fn zero_line_and_limits() {
    let series = vec![AcfSeries {
        parameter: "chirp<mass>".into(),
        temp: 0,
        walker: None,
        values: vec![1.0, 0.4, -0.2, 0.05],
    }];
    let svg = render_acf_svg(&series, &PlotOptions::default());
    assert!(svg.contains("class='zero'"));
    assert!(svg.contains("chirp&lt;mass&gt;"));
    assert!(svg.contains(">-0.20<"));

    let clipped = render_acf_svg(
        &series,
        &PlotOptions {
            ymin: Some(0.0),
            ymax: Some(1.0),
            ..PlotOptions::default()
        },
    );
    assert!(!clipped.contains("class='zero'"));
    assert!(clipped.contains(">0.00<") && clipped.contains(">1.00<"));
}
