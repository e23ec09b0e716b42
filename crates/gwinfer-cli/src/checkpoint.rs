//! Checkpoint and backup bookkeeping around the sampler.
//!
//! Progress is kept in two results files next to the output,
//! `<output>.checkpoint` and `<output>.bkup`. Every chunk of iterations is
//! appended to both and both are re-validated, so at least one good copy
//! survives a crash at any point. On completion the checkpoint is renamed
//! to the output path.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use gwinfer_core::{ErrorInfo, InferenceError, RunProvenance};
use gwinfer_sampler::acf::n_independent_samples;
use gwinfer_sampler::burn_in;
use gwinfer_sampler::config::InferenceConfig;
use gwinfer_sampler::model::build_model;
use gwinfer_sampler::{EnsembleSampler, ResultsFile};
use serde::Serialize;

use crate::args::{InferenceArgs, RunTarget};
use crate::scheme;

/// Locations of the files managed for one output path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointPaths {
    /// Final results path.
    pub output: PathBuf,
    /// `<output>.checkpoint`.
    pub checkpoint: PathBuf,
    /// `<output>.bkup`.
    pub backup: PathBuf,
}

impl CheckpointPaths {
    /// Derives the checkpoint and backup paths from the output path.
    pub fn for_output(output: &Path) -> Self {
        let with_suffix = |suffix: &str| {
            let mut name = OsString::from(output.as_os_str());
            name.push(suffix);
            PathBuf::from(name)
        };
        Self {
            output: output.to_path_buf(),
            checkpoint: with_suffix(".checkpoint"),
            backup: with_suffix(".bkup"),
        }
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    /// Where the results were written.
    pub output: PathBuf,
    /// Iterations stored in the output.
    pub niterations: usize,
    /// Whether the run continued from an earlier checkpoint.
    pub resumed: bool,
    /// Burn-in iteration, if burned in.
    pub burn_in_iteration: Option<usize>,
    /// Overall autocorrelation length; `None` when infinite.
    pub acl: Option<f64>,
    /// Independent samples in the output.
    pub n_independent_samples: usize,
    /// Cold-chain acceptance fraction.
    pub acceptance_fraction: f64,
}

fn copy_file(from: &Path, to: &Path) -> Result<(), InferenceError> {
    fs::copy(from, to)
        .map(|_| ())
        .map_err(|err| InferenceError::io_between("copy-failed", &err, from, to))
}

fn remove_if_present(path: &Path) -> Result<(), InferenceError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(InferenceError::io("remove-failed", &err, path)),
    }
}

/// Reconciles the checkpoint and backup files.
///
/// Returns `true` if a usable pair exists afterwards. A single valid file is
/// copied over the other; when neither is valid both are removed.
pub fn validate_checkpoint_files(checkpoint: &Path, backup: &Path) -> Result<bool, InferenceError> {
    let checkpoint_valid = ResultsFile::validate(checkpoint);
    let backup_valid = ResultsFile::validate(backup);
    match (checkpoint_valid, backup_valid) {
        (true, true) => Ok(true),
        (true, false) => {
            tracing::info!(backup = %backup.display(), "backup invalid; restoring from checkpoint");
            copy_file(checkpoint, backup)?;
            Ok(true)
        }
        (false, true) => {
            tracing::info!(checkpoint = %checkpoint.display(), "checkpoint invalid; restoring from backup");
            copy_file(backup, checkpoint)?;
            Ok(true)
        }
        (false, false) => {
            tracing::debug!("no valid checkpoint or backup");
            remove_if_present(checkpoint)?;
            remove_if_present(backup)?;
            Ok(false)
        }
    }
}

fn target_reached(target: RunTarget, results: &ResultsFile) -> bool {
    match target {
        RunTarget::Iterations(n) => results.niterations >= n,
        RunTarget::IndependentSamples(n) => n_independent_samples(results) >= n,
    }
}

fn next_chunk(target: RunTarget, results: &ResultsFile, interval: usize) -> usize {
    match target {
        RunTarget::Iterations(n) => interval.min(n.saturating_sub(results.niterations)),
        RunTarget::IndependentSamples(_) => interval,
    }
}

fn acl_start(results: &ResultsFile) -> usize {
    results.burn_in.burn_in_iteration.unwrap_or(0)
}

struct Session {
    paths: CheckpointPaths,
    sampler: EnsembleSampler,
    config: InferenceConfig,
    checkpoint: ResultsFile,
    backup: ResultsFile,
    seed: u64,
    resumed: bool,
}

fn open_session(args: &InferenceArgs, target: RunTarget) -> Result<Session, InferenceError> {
    let mut config = InferenceConfig::load(&args.config_files)?;
    args.apply_overrides(&mut config)?;
    if matches!(target, RunTarget::IndependentSamples(_)) && config.burn_in.functions.is_empty() {
        return Err(InferenceError::Validation(
            ErrorInfo::new(
                "no-burn-in",
                "--n-independent-samples requires at least one burn-in function",
            )
            .with_hint("pass --burn-in-function or set burn_in.functions"),
        ));
    }
    let model = build_model(&config)?;
    let mut sampler = EnsembleSampler::new(model, &config.sampler)?;
    let paths = CheckpointPaths::for_output(&args.output_file);

    let files_valid = validate_checkpoint_files(&paths.checkpoint, &paths.backup)?;
    if args.resume_from_checkpoint && files_valid {
        let checkpoint = ResultsFile::load_checked(&paths.checkpoint)?;
        let mut backup = ResultsFile::load_checked(&paths.backup)?;
        if backup.niterations != checkpoint.niterations {
            tracing::info!(
                checkpoint = checkpoint.niterations,
                backup = backup.niterations,
                "backup out of step with checkpoint; replacing it"
            );
            copy_file(&paths.checkpoint, &paths.backup)?;
            backup = checkpoint.clone();
        }
        sampler.set_state_from_file(&checkpoint)?;
        let seed = checkpoint.metadata.provenance.seed;
        if seed != args.seed {
            tracing::warn!(
                file_seed = seed,
                requested = args.seed,
                "resuming with the seed recorded in the checkpoint"
            );
        }
        tracing::info!(
            niterations = checkpoint.niterations,
            path = %paths.checkpoint.display(),
            "resuming from checkpoint"
        );
        return Ok(Session {
            paths,
            sampler,
            config,
            checkpoint,
            backup,
            seed,
            resumed: true,
        });
    }
    if args.resume_from_checkpoint {
        tracing::info!("no valid checkpoint found; starting a new run");
    }

    sampler.initialize_from_prior(args.seed)?;
    let metadata = sampler.metadata(
        &config,
        args.data_options(),
        RunProvenance::capture(args.seed, "gwinfer", env!("CARGO_PKG_VERSION")),
    );
    let mut checkpoint = ResultsFile::new(metadata);
    sampler.write_results(&mut checkpoint)?;
    checkpoint.store(&paths.checkpoint)?;
    copy_file(&paths.checkpoint, &paths.backup)?;
    let backup = checkpoint.clone();
    tracing::info!(
        sampler = sampler.kind().as_str(),
        nwalkers = sampler.nwalkers(),
        ntemps = sampler.ntemps(),
        "starting new run"
    );
    Ok(Session {
        paths,
        sampler,
        config,
        checkpoint,
        backup,
        seed: args.seed,
        resumed: false,
    })
}

impl Session {
    fn run_chunk(&mut self, iterations: usize, want_acls: bool) -> Result<(), InferenceError> {
        let summary = self.sampler.run(iterations, self.seed)?;
        self.sampler.write_results(&mut self.checkpoint)?;
        self.sampler.write_results(&mut self.backup)?;
        self.sampler.clear_chunk();

        if !self.checkpoint.burn_in.is_burned_in && !self.config.burn_in.functions.is_empty() {
            let status = burn_in::evaluate(&self.checkpoint, &self.config.burn_in);
            if status.is_burned_in {
                tracing::info!(iteration = ?status.burn_in_iteration, "burn-in reached");
            }
            self.backup.burn_in = status.clone();
            self.checkpoint.burn_in = status;
        }
        if want_acls {
            self.refresh_acls();
        }

        self.checkpoint.store(&self.paths.checkpoint)?;
        self.backup.store(&self.paths.backup)?;
        if !validate_checkpoint_files(&self.paths.checkpoint, &self.paths.backup)? {
            return Err(InferenceError::Results(
                ErrorInfo::new("checkpoint-invalid", "checkpoint and backup both failed validation")
                    .with_path(&self.paths.checkpoint),
            ));
        }
        tracing::info!(
            niterations = summary.niterations,
            acceptance = summary.acceptance_fraction,
            burned_in = self.checkpoint.burn_in.is_burned_in,
            acl = ?self.checkpoint.acls.as_ref().map(|report| report.acl.0),
            n_independent = n_independent_samples(&self.checkpoint),
            "checkpoint written"
        );
        Ok(())
    }

    fn refresh_acls(&mut self) {
        let report = self
            .sampler
            .compute_acls(&self.checkpoint, acl_start(&self.checkpoint));
        self.backup.acls = Some(report.clone());
        self.checkpoint.acls = Some(report);
    }

    fn acls_current(&self) -> bool {
        self.checkpoint
            .acls
            .as_ref()
            .is_some_and(|report| report.niterations == self.checkpoint.niterations)
    }

    fn finish(mut self, save_backup: bool) -> Result<RunReport, InferenceError> {
        if !self.acls_current() {
            self.refresh_acls();
            self.checkpoint.store(&self.paths.checkpoint)?;
            self.backup.store(&self.paths.backup)?;
        }
        fs::rename(&self.paths.checkpoint, &self.paths.output).map_err(|err| {
            InferenceError::io_between(
                "rename-failed",
                &err,
                &self.paths.checkpoint,
                &self.paths.output,
            )
        })?;
        if !save_backup {
            remove_if_present(&self.paths.backup)?;
        }
        let results = &self.checkpoint;
        let acl = results
            .acls
            .as_ref()
            .map(|report| report.acl)
            .filter(|acl| acl.is_finite())
            .map(|acl| acl.0);
        let report = RunReport {
            output: self.paths.output.clone(),
            niterations: results.niterations,
            resumed: self.resumed,
            burn_in_iteration: results.burn_in.burn_in_iteration,
            acl,
            n_independent_samples: n_independent_samples(results),
            acceptance_fraction: results.acceptance.mean_fraction(0),
        };
        tracing::info!(output = %report.output.display(), niterations = report.niterations, "done");
        Ok(report)
    }
}

/// Runs the sampler to the requested target with checkpointing, then
/// promotes the checkpoint to the output path.
pub fn run_inference(args: &InferenceArgs) -> Result<RunReport, InferenceError> {
    let target = args.validate()?;
    let threads = scheme::install(args.scheme()?);
    tracing::debug!(threads, "processing scheme ready");
    let interval = args.interval();
    let want_acls = matches!(target, RunTarget::IndependentSamples(_)) || !args.checkpoint_fast;

    let mut session = open_session(args, target)?;
    while !target_reached(target, &session.checkpoint) {
        let iterations = next_chunk(target, &session.checkpoint, interval);
        session.run_chunk(iterations, want_acls)?;
    }
    session.finish(args.save_backup)
}
