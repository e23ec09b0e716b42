use std::fs;
use std::path::{Path, PathBuf};

use gwinfer_core::{ErrorInfo, InferenceError, RunProvenance, SchemaVersion};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::config::{InferenceConfig, SamplerKind};
use crate::model::DataOptions;

/// Schema written by this version of the library.
pub const RESULTS_SCHEMA: SchemaVersion = SchemaVersion::new(1, 0, 0);

/// `[temp][walker][iteration]` array.
pub type ChainArray = Vec<Vec<Vec<f64>>>;

/// Static description of the run that produced a results file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Sampler flavour.
    pub sampler: SamplerKind,
    /// Model name.
    pub model: String,
    /// Ordered variable parameter names.
    pub variable_params: Vec<String>,
    /// Walkers per temperature.
    pub nwalkers: usize,
    /// Number of temperatures.
    pub ntemps: usize,
    /// Inverse temperatures, coldest first.
    pub betas: Vec<f64>,
    /// Stretch move scale.
    pub stretch_scale: f64,
    /// Detector options supplied on the command line.
    pub data: DataOptions,
    /// Configuration snapshot.
    pub config: InferenceConfig,
    /// Seed and creation time.
    pub provenance: RunProvenance,
}

/// Per-walker acceptance counters.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AcceptanceStats {
    /// Accepted proposals, `[temp][walker]`.
    pub accepted: Vec<Vec<usize>>,
    /// Proposals made, `[temp][walker]`.
    pub proposed: Vec<Vec<usize>>,
}

impl AcceptanceStats {
    /// Zeroed counters.
    pub fn zeros(ntemps: usize, nwalkers: usize) -> Self {
        Self {
            accepted: vec![vec![0; nwalkers]; ntemps],
            proposed: vec![vec![0; nwalkers]; ntemps],
        }
    }

    /// Mean acceptance fraction over walkers at `temp`.
    pub fn mean_fraction(&self, temp: usize) -> f64 {
        let (Some(accepted), Some(proposed)) = (self.accepted.get(temp), self.proposed.get(temp))
        else {
            return 0.0;
        };
        let total: usize = proposed.iter().sum();
        if total == 0 {
            0.0
        } else {
            accepted.iter().sum::<usize>() as f64 / total as f64
        }
    }
}

/// Exchange counters between adjacent temperatures.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExchangeStats {
    /// Accepted swaps per adjacent pair.
    pub accepted: Vec<usize>,
    /// Attempted swaps per adjacent pair.
    pub proposed: Vec<usize>,
}

impl ExchangeStats {
    /// Zeroed counters for `ntemps` rungs.
    pub fn zeros(ntemps: usize) -> Self {
        let pairs = ntemps.saturating_sub(1);
        Self {
            accepted: vec![0; pairs],
            proposed: vec![0; pairs],
        }
    }
}

/// Outcome of a single burn-in test.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BurnInTestResult {
    /// Whether the test passed.
    pub is_burned_in: bool,
    /// Iteration reported by the test.
    pub iteration: Option<usize>,
}

/// Combined burn-in status stored in a results file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BurnInStatus {
    /// All requested tests passed.
    pub is_burned_in: bool,
    /// First iteration considered post burn-in.
    pub burn_in_iteration: Option<usize>,
    /// Per-test results keyed by test name.
    #[serde(default)]
    pub tests: IndexMap<String, BurnInTestResult>,
}

/// Autocorrelation length that may be infinite.
///
/// JSON has no infinity, so non-finite values are written as the string `"inf"`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Acl(pub f64);

impl Acl {
    /// Whether the length is finite.
    pub fn is_finite(&self) -> bool {
        self.0.is_finite()
    }
}

impl Serialize for Acl {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.0.is_finite() {
            serializer.serialize_f64(self.0)
        } else {
            serializer.serialize_str("inf")
        }
    }
}

impl<'de> Deserialize<'de> for Acl {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(f64),
            Text(String),
        }
        match Repr::deserialize(deserializer)? {
            Repr::Number(value) => Ok(Acl(value)),
            Repr::Text(text) if text == "inf" => Ok(Acl(f64::INFINITY)),
            Repr::Text(text) => Err(serde::de::Error::custom(format!(
                "invalid autocorrelation length `{text}`"
            ))),
        }
    }
}

/// Autocorrelation lengths computed at a checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AclReport {
    /// Iteration from which the chains were analysed.
    pub start_iteration: usize,
    /// Number of iterations in the file when computed.
    pub niterations: usize,
    /// Per-parameter ACL (maximum over temperatures).
    pub per_param: IndexMap<String, Acl>,
    /// Maximum over parameters.
    pub acl: Acl,
}

/// Positions and log densities of every walker at the last stored iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplerState {
    /// `[temp][walker][param]`.
    pub positions: Vec<Vec<Vec<f64>>>,
    /// `[temp][walker]`.
    pub loglikelihood: Vec<Vec<f64>>,
    /// `[temp][walker]`.
    pub logprior: Vec<Vec<f64>>,
}

/// On-disk sampler output: samples, statistics and resumable state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsFile {
    /// Schema version of the payload.
    pub schema: SchemaVersion,
    /// Static run description.
    pub metadata: RunMetadata,
    /// Number of iterations stored.
    pub niterations: usize,
    /// Samples per parameter, `[temp][walker][iteration]`.
    pub samples: IndexMap<String, ChainArray>,
    /// Log-likelihood, `[temp][walker][iteration]`.
    pub loglikelihood: ChainArray,
    /// Log prior, `[temp][walker][iteration]`.
    pub logprior: ChainArray,
    /// Acceptance counters.
    pub acceptance: AcceptanceStats,
    /// Temperature exchange counters.
    pub exchange: ExchangeStats,
    /// Burn-in status.
    #[serde(default)]
    pub burn_in: BurnInStatus,
    /// Most recent ACL computation.
    #[serde(default)]
    pub acls: Option<AclReport>,
    /// Resumable sampler state.
    #[serde(default)]
    pub state: Option<SamplerState>,
    /// Hex SHA-256 of the payload with this field blank.
    #[serde(default)]
    pub checksum: String,
}

fn results_err(code: &str, message: impl Into<String>, path: &Path) -> InferenceError {
    InferenceError::Results(ErrorInfo::new(code, message).with_path(path))
}

impl ResultsFile {
    /// Creates an empty results file for a new run.
    pub fn new(metadata: RunMetadata) -> Self {
        let ntemps = metadata.ntemps;
        let nwalkers = metadata.nwalkers;
        let empty = || vec![vec![Vec::new(); nwalkers]; ntemps];
        let samples = metadata
            .variable_params
            .iter()
            .map(|name| (name.clone(), empty()))
            .collect();
        Self {
            schema: RESULTS_SCHEMA,
            niterations: 0,
            samples,
            loglikelihood: empty(),
            logprior: empty(),
            acceptance: AcceptanceStats::zeros(ntemps, nwalkers),
            exchange: ExchangeStats::zeros(ntemps),
            burn_in: BurnInStatus::default(),
            acls: None,
            state: None,
            checksum: String::new(),
            metadata,
        }
    }

    /// Ordered parameter names.
    pub fn parameters(&self) -> &[String] {
        &self.metadata.variable_params
    }

    /// Samples of `param` for one walker, from `start` to `end` (exclusive) every `thin`.
    pub fn chain(
        &self,
        param: &str,
        temp: usize,
        walker: usize,
        start: usize,
        end: Option<usize>,
        thin: usize,
    ) -> Option<Vec<f64>> {
        let series = self.samples.get(param)?.get(temp)?.get(walker)?;
        Some(thin_slice(series, start, end, thin))
    }

    /// Log-posterior series (`logprior + loglikelihood`) of one cold-chain walker.
    pub fn cold_log_posterior(&self, walker: usize) -> Vec<f64> {
        match (self.logprior.first(), self.loglikelihood.first()) {
            (Some(prior), Some(like)) => prior[walker]
                .iter()
                .zip(&like[walker])
                .map(|(p, l)| p + l)
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Computes the checksum of the payload (ignoring the stored checksum).
    pub fn digest(&self) -> Result<String, InferenceError> {
        let mut value = serde_json::to_value(self).map_err(|err| {
            InferenceError::Results(ErrorInfo::new("results-serialize", err.to_string()))
        })?;
        if let Some(map) = value.as_object_mut() {
            map.remove("checksum");
        }
        let bytes = serde_json::to_vec(&value).map_err(|err| {
            InferenceError::Results(ErrorInfo::new("results-serialize", err.to_string()))
        })?;
        Ok(hex::encode(Sha256::digest(&bytes)))
    }

    /// Stamps the checksum and writes the file atomically (temp file, then rename).
    pub fn store(&mut self, path: &Path) -> Result<(), InferenceError> {
        self.checksum = self.digest()?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|err| results_err("results-mkdir", err.to_string(), parent))?;
            }
        }
        let json = serde_json::to_vec(self)
            .map_err(|err| results_err("results-serialize", err.to_string(), path))?;
        let tmp = temp_path(path);
        fs::write(&tmp, json).map_err(|err| results_err("results-write", err.to_string(), &tmp))?;
        fs::rename(&tmp, path).map_err(|err| results_err("results-rename", err.to_string(), path))
    }

    /// Reads a results file without validating it.
    pub fn load(path: &Path) -> Result<Self, InferenceError> {
        let bytes =
            fs::read(path).map_err(|err| results_err("results-read", err.to_string(), path))?;
        serde_json::from_slice(&bytes)
            .map_err(|err| results_err("results-parse", err.to_string(), path))
    }

    /// Loads and fully checks a results file.
    pub fn load_checked(path: &Path) -> Result<Self, InferenceError> {
        let file = Self::load(path)?;
        file.check()
            .map_err(|err| results_err(&err.info().code, err.info().message.clone(), path))?;
        Ok(file)
    }

    /// Whether `path` holds a readable, uncorrupted, self-consistent results file.
    pub fn validate(path: &Path) -> bool {
        if !path.exists() {
            return false;
        }
        match Self::load_checked(path) {
            Ok(_) => true,
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "results file failed validation");
                false
            }
        }
    }

    /// Checks schema, checksum and array shapes.
    pub fn check(&self) -> Result<(), InferenceError> {
        let fail = |code: &str, message: String| {
            Err(InferenceError::Results(ErrorInfo::new(code, message)))
        };
        if !RESULTS_SCHEMA.is_compatible(&self.schema) {
            return fail(
                "schema-mismatch",
                format!(
                    "unsupported schema {}.{}.{}",
                    self.schema.major, self.schema.minor, self.schema.patch
                ),
            );
        }
        if self.digest()? != self.checksum {
            return fail("checksum-mismatch", "checksum does not match payload".into());
        }
        let meta = &self.metadata;
        if meta.betas.len() != meta.ntemps {
            return fail("shape-betas", "betas length differs from ntemps".into());
        }
        let names: Vec<&String> = self.samples.keys().collect();
        if names.len() != meta.variable_params.len()
            || names.iter().zip(&meta.variable_params).any(|(a, b)| *a != b)
        {
            return fail("shape-params", "sample parameters differ from metadata".into());
        }
        let check_chain = |label: &str, array: &ChainArray| -> Result<(), InferenceError> {
            let ok = array.len() == meta.ntemps
                && array.iter().all(|temp| {
                    temp.len() == meta.nwalkers
                        && temp.iter().all(|walker| walker.len() == self.niterations)
                });
            if ok {
                Ok(())
            } else {
                Err(InferenceError::Results(ErrorInfo::new(
                    "shape-chain",
                    format!("`{label}` does not have shape [ntemps][nwalkers][niterations]"),
                )))
            }
        };
        for (name, array) in &self.samples {
            check_chain(name, array)?;
        }
        check_chain("loglikelihood", &self.loglikelihood)?;
        check_chain("logprior", &self.logprior)?;

        let grid_ok = |grid: &Vec<Vec<usize>>| {
            grid.len() == meta.ntemps && grid.iter().all(|row| row.len() == meta.nwalkers)
        };
        if !grid_ok(&self.acceptance.accepted) || !grid_ok(&self.acceptance.proposed) {
            return fail("shape-acceptance", "acceptance counters have the wrong shape".into());
        }
        let pairs = meta.ntemps.saturating_sub(1);
        if self.exchange.accepted.len() != pairs || self.exchange.proposed.len() != pairs {
            return fail("shape-exchange", "exchange counters have the wrong shape".into());
        }
        if let Some(state) = &self.state {
            let ndim = meta.variable_params.len();
            let ok = state.positions.len() == meta.ntemps
                && state.positions.iter().all(|temp| {
                    temp.len() == meta.nwalkers && temp.iter().all(|w| w.len() == ndim)
                })
                && state.loglikelihood.len() == meta.ntemps
                && state.logprior.len() == meta.ntemps
                && state.loglikelihood.iter().all(|t| t.len() == meta.nwalkers)
                && state.logprior.iter().all(|t| t.len() == meta.nwalkers);
            if !ok {
                return fail("shape-state", "sampler state has the wrong shape".into());
            }
        }
        if let Some(iteration) = self.burn_in.burn_in_iteration {
            if self.burn_in.is_burned_in && iteration > self.niterations {
                return fail(
                    "burn-in-range",
                    "burn-in iteration exceeds stored iterations".into(),
                );
            }
        }
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Slices `series[start..end]` keeping every `thin`-th element.
pub fn thin_slice(series: &[f64], start: usize, end: Option<usize>, thin: usize) -> Vec<f64> {
    let end = end.unwrap_or(series.len()).min(series.len());
    if start >= end {
        return Vec::new();
    }
    series[start..end]
        .iter()
        .step_by(thin.max(1))
        .copied()
        .collect()
}
