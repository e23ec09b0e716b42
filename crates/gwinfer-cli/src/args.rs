use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;
use gwinfer_core::{ErrorInfo, InferenceError};
use gwinfer_sampler::config::{BurnInFunction, InferenceConfig, SamplerKind};
use gwinfer_sampler::model::DataOptions;

use crate::scheme::ProcessingScheme;

/// What the control loop runs until.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunTarget {
    /// Stop once this many iterations are stored.
    Iterations(usize),
    /// Stop once this many independent samples are available.
    IndependentSamples(usize),
}

/// Command line of `gwinfer`.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "gwinfer",
    about = "Run an ensemble MCMC sampler with checkpoint and backup files",
    version
)]
pub struct InferenceArgs {
    /// YAML configuration files; later files replace earlier sections.
    #[arg(long = "config-files", required = true, num_args = 1..)]
    pub config_files: Vec<PathBuf>,
    /// Final results path. `<output>.checkpoint` and `<output>.bkup` are kept alongside.
    #[arg(long)]
    pub output_file: PathBuf,
    /// Overwrite the output file if it already exists.
    #[arg(long)]
    pub force: bool,
    /// Keep the backup file after a successful run.
    #[arg(long)]
    pub save_backup: bool,
    /// Number of iterations to run.
    #[arg(long)]
    pub niterations: Option<usize>,
    /// Number of independent samples to collect.
    #[arg(long)]
    pub n_independent_samples: Option<usize>,
    /// Iterations between checkpoints.
    #[arg(long)]
    pub checkpoint_interval: Option<usize>,
    /// Skip autocorrelation lengths at checkpoints when running to an iteration count.
    #[arg(long)]
    pub checkpoint_fast: bool,
    /// Continue from a valid checkpoint or backup file if one exists.
    #[arg(long)]
    pub resume_from_checkpoint: bool,
    /// Master seed for all sampler randomness.
    #[arg(long, default_value_t = 0)]
    pub seed: u64,
    /// Sampler name, overriding the configuration.
    #[arg(long)]
    pub sampler: Option<String>,
    /// Walkers per temperature, overriding the configuration.
    #[arg(long)]
    pub nwalkers: Option<usize>,
    /// Number of temperatures, overriding the configuration.
    #[arg(long)]
    pub ntemps: Option<usize>,
    /// Burn-in tests, overriding the configuration.
    #[arg(long = "burn-in-function", num_args = 1..)]
    pub burn_in_function: Vec<String>,
    /// Minimum burn-in iteration, overriding the configuration.
    #[arg(long)]
    pub min_burn_in: Option<usize>,
    /// Detectors to analyse, e.g. `H1 L1`.
    #[arg(long, num_args = 1..)]
    pub instruments: Vec<String>,
    /// Low frequency cutoff in Hz.
    #[arg(long)]
    pub low_frequency_cutoff: Option<f64>,
    /// High frequency cutoff in Hz.
    #[arg(long)]
    pub high_frequency_cutoff: Option<f64>,
    /// Processing context: `cpu` or `cpu:N`.
    #[arg(long, default_value = "cpu")]
    pub processing_scheme: String,
    /// Worker threads; overrides the scheme's count.
    #[arg(long)]
    pub nprocesses: Option<usize>,
    /// Debug logging.
    #[arg(long)]
    pub verbose: bool,
}

fn is_instrument_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    bytes.len() == 2 && bytes[0].is_ascii_uppercase() && bytes[1].is_ascii_digit()
}

impl InferenceArgs {
    /// Checks flag combinations and returns the run target.
    pub fn validate(&self) -> Result<RunTarget, InferenceError> {
        let target = match (self.niterations, self.n_independent_samples) {
            (Some(_), Some(_)) => {
                return Err(InferenceError::validation(
                    "conflicting-target",
                    "must specify either --niterations or --n-independent-samples, not both",
                ))
            }
            (None, None) => {
                return Err(InferenceError::validation(
                    "missing-target",
                    "must specify either --niterations or --n-independent-samples",
                ))
            }
            (Some(n), None) => RunTarget::Iterations(n),
            (None, Some(n)) => RunTarget::IndependentSamples(n),
        };
        if matches!(
            target,
            RunTarget::Iterations(0) | RunTarget::IndependentSamples(0)
        ) {
            return Err(InferenceError::validation("bad-target", "the run target must be positive"));
        }
        match self.checkpoint_interval {
            None => {
                return Err(InferenceError::validation(
                    "checkpoint-interval",
                    "--checkpoint-interval is required",
                ))
            }
            Some(0) => {
                return Err(InferenceError::validation(
                    "checkpoint-interval",
                    "--checkpoint-interval must be positive",
                ))
            }
            Some(_) => {}
        }
        if self.output_file.exists() && !self.force {
            return Err(InferenceError::Validation(
                ErrorInfo::new("output-exists", "output file already exists")
                    .with_path(&self.output_file)
                    .with_hint("pass --force to overwrite it"),
            ));
        }
        if let Some(bad) = self.instruments.iter().find(|name| !is_instrument_name(name)) {
            return Err(InferenceError::Validation(
                ErrorInfo::new("instrument-name", format!("invalid instrument `{bad}`"))
                    .with_hint("instrument names are a capital letter and a digit, e.g. H1"),
            ));
        }
        for (flag, value) in [
            ("--low-frequency-cutoff", self.low_frequency_cutoff),
            ("--high-frequency-cutoff", self.high_frequency_cutoff),
        ] {
            if let Some(value) = value {
                if !(value.is_finite() && value > 0.0) {
                    return Err(InferenceError::Validation(
                        ErrorInfo::new("frequency-cutoff", format!("{flag} must be positive"))
                            .with_context("value", value.to_string()),
                    ));
                }
            }
        }
        if !self.instruments.is_empty() && self.low_frequency_cutoff.is_none() {
            return Err(InferenceError::validation(
                "frequency-cutoff",
                "--low-frequency-cutoff is required when instruments are given",
            ));
        }
        if let (Some(low), Some(high)) = (self.low_frequency_cutoff, self.high_frequency_cutoff) {
            if high <= low {
                return Err(InferenceError::validation(
                    "frequency-cutoff",
                    "--high-frequency-cutoff must exceed --low-frequency-cutoff",
                ));
            }
        }
        if self.nprocesses == Some(0) {
            return Err(InferenceError::validation("nprocesses", "--nprocesses must be positive"));
        }
        self.scheme()?;
        Ok(target)
    }

    /// Checkpoint interval; zero if unset (rejected by [`InferenceArgs::validate`]).
    pub fn interval(&self) -> usize {
        self.checkpoint_interval.unwrap_or(0)
    }

    /// Parsed processing scheme with `--nprocesses` applied.
    pub fn scheme(&self) -> Result<ProcessingScheme, InferenceError> {
        Ok(ProcessingScheme::from_str(&self.processing_scheme)?.with_nprocesses(self.nprocesses))
    }

    /// Applies sampler and burn-in overrides to a loaded configuration.
    pub fn apply_overrides(&self, config: &mut InferenceConfig) -> Result<(), InferenceError> {
        if let Some(name) = &self.sampler {
            config.sampler.name = SamplerKind::from_str(name)?;
        }
        if let Some(nwalkers) = self.nwalkers {
            config.sampler.nwalkers = nwalkers;
        }
        if let Some(ntemps) = self.ntemps {
            config.sampler.ntemps = ntemps;
        }
        if !self.burn_in_function.is_empty() {
            config.burn_in.functions = self
                .burn_in_function
                .iter()
                .map(|name| BurnInFunction::from_str(name))
                .collect::<Result<_, _>>()?;
        }
        if let Some(min) = self.min_burn_in {
            config.burn_in.min_burn_in = min;
        }
        Ok(())
    }

    /// Detector options recorded with the run.
    pub fn data_options(&self) -> DataOptions {
        DataOptions {
            instruments: self.instruments.clone(),
            low_frequency_cutoff: self.low_frequency_cutoff,
            high_frequency_cutoff: self.high_frequency_cutoff,
        }
    }
}

/// Command line of `gwinfer-plot-acf`.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "gwinfer-plot-acf",
    about = "Plot autocorrelation functions of chains in a results file",
    version
)]
pub struct PlotAcfArgs {
    /// Results file written by `gwinfer`.
    #[arg(long)]
    pub input_file: PathBuf,
    /// SVG file to write.
    #[arg(long)]
    pub output_file: PathBuf,
    /// Parameters to plot; all by default.
    #[arg(long, num_args = 1..)]
    pub parameters: Vec<String>,
    /// Walker indices to plot individually; the walker average by default.
    #[arg(long, num_args = 1..)]
    pub walkers: Vec<usize>,
    /// Temperature indices, or `all`; the coldest chain by default.
    #[arg(long, num_args = 1..)]
    pub temps: Vec<String>,
    /// Lower y-axis limit.
    #[arg(long, allow_negative_numbers = true)]
    pub ymin: Option<f64>,
    /// Upper y-axis limit.
    #[arg(long, allow_negative_numbers = true)]
    pub ymax: Option<f64>,
    /// First iteration used; the burn-in iteration if the file records one.
    #[arg(long)]
    pub thin_start: Option<usize>,
    /// Stride between iterations used.
    #[arg(long, default_value_t = 1)]
    pub thin_interval: usize,
    /// Iteration after the last one used.
    #[arg(long)]
    pub thin_end: Option<usize>,
    /// Debug logging.
    #[arg(long)]
    pub verbose: bool,
}

impl PlotAcfArgs {
    /// Checks options that do not need the input file.
    pub fn validate(&self) -> Result<(), InferenceError> {
        if let (Some(ymin), Some(ymax)) = (self.ymin, self.ymax) {
            if ymin >= ymax {
                return Err(InferenceError::Validation(
                    ErrorInfo::new("y-limits", "--ymin must be below --ymax")
                        .with_context("ymin", ymin.to_string())
                        .with_context("ymax", ymax.to_string()),
                ));
            }
        }
        if self.thin_interval == 0 {
            return Err(InferenceError::validation("thin-interval", "--thin-interval must be positive"));
        }
        if let (Some(start), Some(end)) = (self.thin_start, self.thin_end) {
            if end <= start {
                return Err(InferenceError::validation("thin-range", "--thin-end must exceed --thin-start"));
            }
        }
        let is_svg = self
            .output_file
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("svg"));
        if !is_svg {
            return Err(InferenceError::Validation(
                ErrorInfo::new("output-format", "output file must have an .svg extension")
                    .with_path(&self.output_file),
            ));
        }
        Ok(())
    }

    /// Temperature indices to plot for a file with `ntemps` temperatures.
    pub fn temperatures(&self, ntemps: usize) -> Result<Vec<usize>, InferenceError> {
        if self.temps.is_empty() {
            return Ok(vec![0]);
        }
        if self.temps.iter().any(|t| t == "all") {
            return Ok((0..ntemps).collect());
        }
        self.temps
            .iter()
            .map(|t| {
                t.parse::<usize>().map_err(|_| {
                    InferenceError::Validation(
                        ErrorInfo::new("temp-index", format!("invalid temperature `{t}`"))
                            .with_hint("give temperature indices or `all`"),
                    )
                })
            })
            .collect()
    }
}
