use std::ops::Range;

use gwinfer_core::{ErrorInfo, InferenceError, RngHandle, RunProvenance};
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::acf;
use crate::config::{InferenceConfig, SamplerConfig, SamplerKind};
use crate::determinism;
use crate::model::{DataOptions, Model};
use crate::results::{
    AcceptanceStats, AclReport, ExchangeStats, ResultsFile, RunMetadata, SamplerState,
};
use crate::tempering;

/// Prior draws attempted per walker before initialisation gives up.
const MAX_INIT_ATTEMPTS: usize = 1000;

/// Goodman & Weare stretch move with scale `a`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StretchMove {
    /// Scale parameter; proposals stretch by `z` in `[1/a, a]`.
    pub a: f64,
}

impl Default for StretchMove {
    fn default() -> Self {
        Self { a: 2.0 }
    }
}

impl StretchMove {
    /// Creates a stretch move; `a` must exceed one.
    pub fn new(a: f64) -> Result<Self, InferenceError> {
        if !(a > 1.0) {
            return Err(InferenceError::Sampler(
                ErrorInfo::new("stretch-scale", "stretch scale must be greater than 1")
                    .with_context("a", a.to_string()),
            ));
        }
        Ok(Self { a })
    }

    /// Draws `z` from `g(z) ∝ 1/sqrt(z)` on `[1/a, a]`.
    pub fn sample_z(&self, rng: &mut RngHandle) -> f64 {
        let u = rng.uniform();
        ((self.a - 1.0) * u + 1.0).powi(2) / self.a
    }
}

/// Statistics reported after [`EnsembleSampler::run`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkSummary {
    /// Iterations performed by this call.
    pub iterations_run: usize,
    /// Total iterations performed by the sampler.
    pub niterations: usize,
    /// Cumulative mean acceptance fraction of the coldest chain.
    pub acceptance_fraction: f64,
    /// Cumulative exchange acceptance per adjacent temperature pair.
    pub exchange_fraction: Vec<f64>,
}

#[derive(Debug, Clone)]
struct IterationRecord {
    positions: Vec<Vec<Vec<f64>>>,
    loglikelihood: Vec<Vec<f64>>,
    logprior: Vec<Vec<f64>>,
}

/// Affine-invariant ensemble sampler, optionally parallel tempered.
///
/// Iterations are buffered in memory until [`EnsembleSampler::write_results`]
/// appends them to a results file; [`EnsembleSampler::clear_chunk`] then
/// drops the buffer.
pub struct EnsembleSampler {
    kind: SamplerKind,
    model: Box<dyn Model>,
    nwalkers: usize,
    ntemps: usize,
    betas: Vec<f64>,
    stretch: StretchMove,
    state: Option<SamplerState>,
    niterations: usize,
    acceptance: AcceptanceStats,
    exchange: ExchangeStats,
    chunk: Vec<IterationRecord>,
}

impl std::fmt::Debug for EnsembleSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnsembleSampler")
            .field("kind", &self.kind)
            .field("model", &self.model.name())
            .field("nwalkers", &self.nwalkers)
            .field("ntemps", &self.ntemps)
            .field("niterations", &self.niterations)
            .finish_non_exhaustive()
    }
}

fn sampler_err(code: &str, message: impl Into<String>) -> InferenceError {
    InferenceError::Sampler(ErrorInfo::new(code, message))
}

impl EnsembleSampler {
    /// Validates the ensemble settings against the model and builds the sampler.
    pub fn new(model: Box<dyn Model>, config: &SamplerConfig) -> Result<Self, InferenceError> {
        let ndim = model.variable_params().len();
        let nwalkers = config.nwalkers;
        if nwalkers % 2 != 0 || nwalkers < 2 * ndim || nwalkers < 2 {
            return Err(InferenceError::Sampler(
                ErrorInfo::new(
                    "nwalkers",
                    "number of walkers must be even and at least twice the number of parameters",
                )
                .with_context("nwalkers", nwalkers.to_string())
                .with_context("ndim", ndim.to_string()),
            ));
        }
        if config.ntemps == 0 {
            return Err(sampler_err("ntemps", "at least one temperature is required"));
        }
        if config.name == SamplerKind::Emcee && config.ntemps != 1 {
            return Err(InferenceError::Sampler(
                ErrorInfo::new("ntemps", "the emcee sampler runs at a single temperature")
                    .with_context("ntemps", config.ntemps.to_string())
                    .with_hint("use emcee_pt for parallel tempering"),
            ));
        }
        let stretch = StretchMove::new(config.stretch_scale)?;
        let betas = tempering::build_betas(config.ntemps, &config.ladder)?;
        Ok(Self {
            kind: config.name,
            model,
            nwalkers,
            ntemps: config.ntemps,
            betas,
            stretch,
            state: None,
            niterations: 0,
            acceptance: AcceptanceStats::zeros(config.ntemps, nwalkers),
            exchange: ExchangeStats::zeros(config.ntemps),
            chunk: Vec::new(),
        })
    }

    /// Sampler flavour.
    pub fn kind(&self) -> SamplerKind {
        self.kind
    }

    /// Walkers per temperature.
    pub fn nwalkers(&self) -> usize {
        self.nwalkers
    }

    /// Number of temperatures.
    pub fn ntemps(&self) -> usize {
        self.ntemps
    }

    /// Inverse temperatures, coldest first.
    pub fn betas(&self) -> &[f64] {
        &self.betas
    }

    /// Iterations performed so far, including any restored from a file.
    pub fn niterations(&self) -> usize {
        self.niterations
    }

    /// Iterations buffered but not yet cleared.
    pub fn pending_iterations(&self) -> usize {
        self.chunk.len()
    }

    /// Current walker state, if initialised.
    pub fn state(&self) -> Option<&SamplerState> {
        self.state.as_ref()
    }

    /// Cumulative acceptance counters.
    pub fn acceptance(&self) -> &AcceptanceStats {
        &self.acceptance
    }

    /// The model being sampled.
    pub fn model(&self) -> &dyn Model {
        self.model.as_ref()
    }

    /// Metadata describing this sampler for a new results file.
    pub fn metadata(
        &self,
        config: &InferenceConfig,
        data: DataOptions,
        provenance: RunProvenance,
    ) -> RunMetadata {
        RunMetadata {
            sampler: self.kind,
            model: self.model.name().to_string(),
            variable_params: self.model.variable_params().to_vec(),
            nwalkers: self.nwalkers,
            ntemps: self.ntemps,
            betas: self.betas.clone(),
            stretch_scale: self.stretch.a,
            data,
            config: config.clone(),
            provenance,
        }
    }

    /// Draws every walker at every temperature from the prior.
    pub fn initialize_from_prior(&mut self, seed: u64) -> Result<(), InferenceError> {
        let prior = self.model.prior();
        let mut positions = Vec::with_capacity(self.ntemps);
        let mut loglikelihood = Vec::with_capacity(self.ntemps);
        let mut logprior = Vec::with_capacity(self.ntemps);
        for temp in 0..self.ntemps {
            let mut temp_pos = Vec::with_capacity(self.nwalkers);
            let mut temp_ll = Vec::with_capacity(self.nwalkers);
            let mut temp_lp = Vec::with_capacity(self.nwalkers);
            for walker in 0..self.nwalkers {
                let mut rng = RngHandle::from_seed(determinism::init_seed(seed, temp, walker));
                let mut drawn = None;
                for _ in 0..MAX_INIT_ATTEMPTS {
                    let point = prior.draw(&mut rng);
                    let lp = self.model.log_prior(&point);
                    let ll = self.model.log_likelihood(&point);
                    if lp.is_finite() && ll.is_finite() {
                        drawn = Some((point, ll, lp));
                        break;
                    }
                }
                let (point, ll, lp) = drawn.ok_or_else(|| {
                    InferenceError::Sampler(
                        ErrorInfo::new(
                            "init-failed",
                            "could not draw a prior point with finite posterior",
                        )
                        .with_context("walker", walker.to_string())
                        .with_context("temp", temp.to_string()),
                    )
                })?;
                temp_pos.push(point);
                temp_ll.push(ll);
                temp_lp.push(lp);
            }
            positions.push(temp_pos);
            loglikelihood.push(temp_ll);
            logprior.push(temp_lp);
        }
        self.state = Some(SamplerState {
            positions,
            loglikelihood,
            logprior,
        });
        self.niterations = 0;
        self.acceptance = AcceptanceStats::zeros(self.ntemps, self.nwalkers);
        self.exchange = ExchangeStats::zeros(self.ntemps);
        self.chunk.clear();
        tracing::debug!(
            nwalkers = self.nwalkers,
            ntemps = self.ntemps,
            "walkers initialised from prior"
        );
        Ok(())
    }

    /// Advances the ensemble by `iterations`, buffering every iteration.
    ///
    /// Randomness is derived from `(seed, temperature, iteration)`, so the
    /// outcome does not depend on how a run is split into chunks.
    pub fn run(&mut self, iterations: usize, seed: u64) -> Result<ChunkSummary, InferenceError> {
        let mut state = self.state.take().ok_or_else(|| {
            sampler_err("not-initialised", "sampler has no walker state; initialise or resume first")
        })?;
        for _ in 0..iterations {
            let iteration = self.niterations;
            for temp in 0..self.ntemps {
                let mut rng =
                    RngHandle::from_seed(determinism::iteration_seed(seed, temp, iteration));
                self.stretch_temperature(&mut state, temp, &mut rng);
            }
            self.exchange_temperatures(&mut state, iteration, seed);
            self.chunk.push(IterationRecord {
                positions: state.positions.clone(),
                loglikelihood: state.loglikelihood.clone(),
                logprior: state.logprior.clone(),
            });
            self.niterations += 1;
        }
        self.state = Some(state);
        let summary = ChunkSummary {
            iterations_run: iterations,
            niterations: self.niterations,
            acceptance_fraction: self.acceptance.mean_fraction(0),
            exchange_fraction: self
                .exchange
                .accepted
                .iter()
                .zip(&self.exchange.proposed)
                .map(|(a, p)| if *p == 0 { 0.0 } else { *a as f64 / *p as f64 })
                .collect(),
        };
        tracing::debug!(
            iterations,
            niterations = self.niterations,
            acceptance = summary.acceptance_fraction,
            "sampler chunk complete"
        );
        Ok(summary)
    }

    fn stretch_temperature(&mut self, state: &mut SamplerState, temp: usize, rng: &mut RngHandle) {
        let beta = self.betas[temp];
        let ndim = self.model.variable_params().len();
        let half = self.nwalkers / 2;
        let groups: [(Range<usize>, Range<usize>); 2] =
            [(0..half, half..self.nwalkers), (half..self.nwalkers, 0..half)];
        for (active, complement) in groups {
            let positions = &state.positions[temp];
            let proposals: Vec<(Vec<f64>, f64)> = active
                .clone()
                .map(|walker| {
                    let z = self.stretch.sample_z(rng);
                    let partner = complement.start + rng.gen_range(0..complement.len());
                    let current = &positions[walker];
                    let anchor = &positions[partner];
                    let proposal = anchor
                        .iter()
                        .zip(current)
                        .map(|(c, x)| c + z * (x - c))
                        .collect();
                    (proposal, z)
                })
                .collect();

            let model = self.model.as_ref();
            let evaluated: Vec<(f64, f64)> = proposals
                .par_iter()
                .map(|(point, _)| evaluate(model, point))
                .collect();

            for ((walker, (proposal, z)), (lp, ll)) in
                active.zip(proposals).zip(evaluated)
            {
                let old = state.logprior[temp][walker] + beta * state.loglikelihood[temp][walker];
                let new = lp + beta * ll;
                let log_ratio = (ndim as f64 - 1.0) * z.ln() + (new - old);
                let draw = rng.uniform();
                self.acceptance.proposed[temp][walker] += 1;
                if new.is_finite() && draw.ln() < log_ratio {
                    state.positions[temp][walker] = proposal;
                    state.loglikelihood[temp][walker] = ll;
                    state.logprior[temp][walker] = lp;
                    self.acceptance.accepted[temp][walker] += 1;
                }
            }
        }
    }

    fn exchange_temperatures(&mut self, state: &mut SamplerState, iteration: usize, seed: u64) {
        if self.ntemps < 2 {
            return;
        }
        let mut rng = RngHandle::from_seed(determinism::exchange_seed(seed, iteration));
        for pair in (0..self.ntemps - 1).rev() {
            for walker in 0..self.nwalkers {
                let (accept, _) = tempering::attempt_exchange(
                    self.betas[pair],
                    state.loglikelihood[pair][walker],
                    self.betas[pair + 1],
                    state.loglikelihood[pair + 1][walker],
                    &mut rng,
                );
                self.exchange.proposed[pair] += 1;
                if accept {
                    swap_rungs(&mut state.positions, pair, walker);
                    swap_rungs(&mut state.loglikelihood, pair, walker);
                    swap_rungs(&mut state.logprior, pair, walker);
                    self.exchange.accepted[pair] += 1;
                }
            }
        }
    }

    /// Appends buffered iterations and the current state to `results`.
    ///
    /// The file must hold exactly the iterations that preceded the buffer.
    pub fn write_results(&self, results: &mut ResultsFile) -> Result<(), InferenceError> {
        self.check_compatible(&results.metadata)?;
        let expected = self.niterations - self.chunk.len();
        if results.niterations != expected {
            return Err(InferenceError::Results(
                ErrorInfo::new("out-of-sync", "results file does not end where the buffered chunk starts")
                    .with_context("file_iterations", results.niterations.to_string())
                    .with_context("expected", expected.to_string()),
            ));
        }
        let names = self.model.variable_params();
        for record in &self.chunk {
            for (index, name) in names.iter().enumerate() {
                let Some(array) = results.samples.get_mut(name) else {
                    return Err(sampler_err("missing-parameter", format!("no samples for `{name}`")));
                };
                for temp in 0..self.ntemps {
                    for walker in 0..self.nwalkers {
                        array[temp][walker].push(record.positions[temp][walker][index]);
                    }
                }
            }
            for temp in 0..self.ntemps {
                for walker in 0..self.nwalkers {
                    results.loglikelihood[temp][walker].push(record.loglikelihood[temp][walker]);
                    results.logprior[temp][walker].push(record.logprior[temp][walker]);
                }
            }
        }
        results.niterations = self.niterations;
        results.acceptance = self.acceptance.clone();
        results.exchange = self.exchange.clone();
        results.state = self.state.clone();
        Ok(())
    }

    /// Drops buffered iterations once they have been written.
    pub fn clear_chunk(&mut self) {
        self.chunk.clear();
    }

    /// Restores walker state and counters from a results file.
    pub fn set_state_from_file(&mut self, results: &ResultsFile) -> Result<(), InferenceError> {
        self.check_compatible(&results.metadata)?;
        let state = results
            .state
            .clone()
            .ok_or_else(|| sampler_err("no-state", "results file holds no sampler state"))?;
        self.state = Some(state);
        self.niterations = results.niterations;
        self.acceptance = results.acceptance.clone();
        self.exchange = results.exchange.clone();
        self.chunk.clear();
        tracing::debug!(niterations = self.niterations, "sampler state restored");
        Ok(())
    }

    /// Autocorrelation lengths of the chains in `results` from iteration `start`.
    pub fn compute_acls(&self, results: &ResultsFile, start: usize) -> AclReport {
        acf::compute_acls(results, start)
    }

    fn check_compatible(&self, meta: &RunMetadata) -> Result<(), InferenceError> {
        let mismatch = |field: &str, ours: String, theirs: String| {
            Err(InferenceError::Sampler(
                ErrorInfo::new("incompatible-file", format!("results file {field} differs from sampler"))
                    .with_context("sampler", ours)
                    .with_context("file", theirs),
            ))
        };
        if meta.sampler != self.kind {
            return mismatch("sampler", self.kind.as_str().into(), meta.sampler.as_str().into());
        }
        if meta.model != self.model.name() {
            return mismatch("model", self.model.name().into(), meta.model.clone());
        }
        if meta.nwalkers != self.nwalkers {
            return mismatch("nwalkers", self.nwalkers.to_string(), meta.nwalkers.to_string());
        }
        if meta.ntemps != self.ntemps {
            return mismatch("ntemps", self.ntemps.to_string(), meta.ntemps.to_string());
        }
        if meta.variable_params.as_slice() != self.model.variable_params() {
            return mismatch(
                "variable_params",
                self.model.variable_params().join(","),
                meta.variable_params.join(","),
            );
        }
        if meta.betas != self.betas {
            return mismatch("betas", format!("{:?}", self.betas), format!("{:?}", meta.betas));
        }
        Ok(())
    }
}

fn evaluate(model: &dyn Model, point: &[f64]) -> (f64, f64) {
    let lp = model.log_prior(point);
    if lp.is_finite() {
        (lp, model.log_likelihood(point))
    } else {
        (lp, f64::NEG_INFINITY)
    }
}

fn swap_rungs<T>(grid: &mut [Vec<T>], pair: usize, walker: usize) {
    let (cold, hot) = grid.split_at_mut(pair + 1);
    std::mem::swap(&mut cold[pair][walker], &mut hot[0][walker]);
}
