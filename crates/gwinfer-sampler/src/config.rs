use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use gwinfer_core::{ErrorInfo, InferenceError};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Complete inference configuration assembled from one or more YAML files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Likelihood model selection.
    pub model: ModelConfig,
    /// Parameters varied by the sampler, with uniform prior bounds.
    pub variable_params: IndexMap<String, ParamBounds>,
    /// Sampler selection and ensemble settings.
    pub sampler: SamplerConfig,
    /// Burn-in tests applied between checkpoints.
    #[serde(default)]
    pub burn_in: BurnInConfig,
}

/// Analytic test likelihoods understood by the library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum ModelConfig {
    /// Independent Gaussian in every parameter.
    Normal {
        /// Per-parameter means (defaults to zero).
        #[serde(default)]
        mean: Option<Vec<f64>>,
        /// Per-parameter variances (defaults to one).
        #[serde(default)]
        var: Option<Vec<f64>>,
    },
    /// N-dimensional Rosenbrock banana.
    Rosenbrock,
    /// Multimodal egg-box surface.
    Eggbox,
    /// Two-dimensional ring-shaped volcano.
    Volcano,
}

impl ModelConfig {
    /// Name used in results metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelConfig::Normal { .. } => "normal",
            ModelConfig::Rosenbrock => "rosenbrock",
            ModelConfig::Eggbox => "eggbox",
            ModelConfig::Volcano => "volcano",
        }
    }
}

/// Uniform prior bounds for a single parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamBounds {
    /// Inclusive lower bound.
    pub min: f64,
    /// Exclusive upper bound.
    pub max: f64,
}

/// Sampler flavours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplerKind {
    /// Affine-invariant ensemble sampler at a single temperature.
    Emcee,
    /// Parallel-tempered ensemble sampler.
    EmceePt,
}

impl SamplerKind {
    /// Command line / metadata spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            SamplerKind::Emcee => "emcee",
            SamplerKind::EmceePt => "emcee_pt",
        }
    }
}

impl FromStr for SamplerKind {
    type Err = InferenceError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "emcee" => Ok(SamplerKind::Emcee),
            "emcee_pt" => Ok(SamplerKind::EmceePt),
            other => Err(InferenceError::Config(
                ErrorInfo::new("unknown-sampler", format!("unknown sampler `{other}`"))
                    .with_hint("choose one of: emcee, emcee_pt"),
            )),
        }
    }
}

/// Ensemble settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Which sampler to run.
    pub name: SamplerKind,
    /// Number of walkers per temperature.
    pub nwalkers: usize,
    /// Number of temperatures (parallel tempering only).
    #[serde(default = "default_ntemps")]
    pub ntemps: usize,
    /// Stretch move scale `a`.
    #[serde(default = "default_stretch_scale")]
    pub stretch_scale: f64,
    /// Temperature ladder settings.
    #[serde(default)]
    pub ladder: LadderConfig,
}

fn default_ntemps() -> usize {
    1
}

fn default_stretch_scale() -> f64 {
    2.0
}

/// Temperature ladder construction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LadderConfig {
    /// Temperature of the coldest rung.
    #[serde(default = "default_base_temperature")]
    pub base_temperature: f64,
    /// Policy used to generate higher temperatures.
    #[serde(default)]
    pub policy: LadderPolicy,
}

fn default_base_temperature() -> f64 {
    1.0
}

impl Default for LadderConfig {
    fn default() -> Self {
        Self {
            base_temperature: default_base_temperature(),
            policy: LadderPolicy::default(),
        }
    }
}

/// Supported ladder construction strategies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum LadderPolicy {
    /// Geometric progression with a fixed ratio between neighbouring temperatures.
    Geometric {
        /// Multiplicative spacing ratio between adjacent temperatures.
        #[serde(default = "default_ratio")]
        ratio: f64,
    },
    /// Explicit list of temperatures (must match `ntemps`).
    Manual {
        /// Ordered list of temperatures, coldest first.
        temperatures: Vec<f64>,
    },
}

fn default_ratio() -> f64 {
    1.5
}

impl Default for LadderPolicy {
    fn default() -> Self {
        LadderPolicy::Geometric {
            ratio: default_ratio(),
        }
    }
}

/// Burn-in test names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BurnInFunction {
    /// Discard the first half of the chain.
    HalfChain,
    /// Burned in after a fixed number of iterations.
    MinIterations,
    /// Walkers have reached the neighbourhood of the maximum posterior.
    MaxPosterior,
    /// After the last large jump in the posterior.
    PosteriorStep,
    /// After a multiple of the autocorrelation length.
    Nacl,
}

impl BurnInFunction {
    /// Command line / metadata spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            BurnInFunction::HalfChain => "half_chain",
            BurnInFunction::MinIterations => "min_iterations",
            BurnInFunction::MaxPosterior => "max_posterior",
            BurnInFunction::PosteriorStep => "posterior_step",
            BurnInFunction::Nacl => "nacl",
        }
    }
}

impl FromStr for BurnInFunction {
    type Err = InferenceError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "half_chain" => Ok(BurnInFunction::HalfChain),
            "min_iterations" => Ok(BurnInFunction::MinIterations),
            "max_posterior" => Ok(BurnInFunction::MaxPosterior),
            "posterior_step" => Ok(BurnInFunction::PosteriorStep),
            "nacl" => Ok(BurnInFunction::Nacl),
            other => Err(InferenceError::Config(
                ErrorInfo::new(
                    "unknown-burn-in",
                    format!("unknown burn-in function `{other}`"),
                )
                .with_hint("choose from: half_chain, min_iterations, max_posterior, posterior_step, nacl"),
            )),
        }
    }
}

/// Burn-in settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurnInConfig {
    /// Tests that must all pass.
    #[serde(default)]
    pub functions: Vec<BurnInFunction>,
    /// Lower bound on the burn-in iteration.
    #[serde(default)]
    pub min_burn_in: usize,
    /// Multiple of the ACL used by the `nacl` test.
    #[serde(default = "default_nacls")]
    pub nacls: usize,
}

fn default_nacls() -> usize {
    10
}

impl Default for BurnInConfig {
    fn default() -> Self {
        Self {
            functions: Vec::new(),
            min_burn_in: 0,
            nacls: default_nacls(),
        }
    }
}

/// Section-level view of a single configuration file; used for merging.
#[derive(Debug, Default, Deserialize)]
struct PartialConfig {
    #[serde(default)]
    model: Option<ModelConfig>,
    #[serde(default)]
    variable_params: Option<IndexMap<String, ParamBounds>>,
    #[serde(default)]
    sampler: Option<SamplerConfig>,
    #[serde(default)]
    burn_in: Option<BurnInConfig>,
}

impl PartialConfig {
    fn overlay(&mut self, other: PartialConfig) {
        if other.model.is_some() {
            self.model = other.model;
        }
        if other.variable_params.is_some() {
            self.variable_params = other.variable_params;
        }
        if other.sampler.is_some() {
            self.sampler = other.sampler;
        }
        if other.burn_in.is_some() {
            self.burn_in = other.burn_in;
        }
    }
}

impl InferenceConfig {
    /// Parses a single YAML document.
    pub fn from_yaml(text: &str) -> Result<Self, InferenceError> {
        let partial = parse_partial(text, None)?;
        finish(partial, &[])
    }

    /// Loads and merges configuration files in order; later files replace whole sections.
    pub fn load(paths: &[PathBuf]) -> Result<Self, InferenceError> {
        if paths.is_empty() {
            return Err(InferenceError::Config(ErrorInfo::new(
                "no-config",
                "at least one configuration file is required",
            )));
        }
        let mut merged = PartialConfig::default();
        for path in paths {
            let text = fs::read_to_string(path).map_err(|err| {
                InferenceError::Config(ErrorInfo::new("config-read", err.to_string()).with_path(path))
            })?;
            merged.overlay(parse_partial(&text, Some(path))?);
        }
        finish(merged, paths)
    }

    /// Ordered parameter names.
    pub fn parameter_names(&self) -> Vec<String> {
        self.variable_params.keys().cloned().collect()
    }
}

fn parse_partial(text: &str, path: Option<&Path>) -> Result<PartialConfig, InferenceError> {
    serde_yaml::from_str(text).map_err(|err| {
        let mut info = ErrorInfo::new("config-parse", err.to_string());
        if let Some(path) = path {
            info = info.with_path(path);
        }
        InferenceError::Config(info)
    })
}

fn finish(partial: PartialConfig, paths: &[PathBuf]) -> Result<InferenceConfig, InferenceError> {
    let missing = |section: &str| {
        let files = paths
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(",");
        InferenceError::Config(
            ErrorInfo::new("missing-section", format!("no `{section}` section found"))
                .with_context("files", files),
        )
    };
    let model = partial.model.ok_or_else(|| missing("model"))?;
    let variable_params = partial
        .variable_params
        .ok_or_else(|| missing("variable_params"))?;
    let sampler = partial.sampler.ok_or_else(|| missing("sampler"))?;
    let burn_in = partial.burn_in.unwrap_or_default();

    if variable_params.is_empty() {
        return Err(InferenceError::Config(ErrorInfo::new(
            "no-variable-params",
            "`variable_params` must name at least one parameter",
        )));
    }
    for (name, bounds) in &variable_params {
        if !(bounds.min.is_finite() && bounds.max.is_finite()) || bounds.min >= bounds.max {
            return Err(InferenceError::Config(
                ErrorInfo::new("bad-bounds", "prior bounds must be finite with min < max")
                    .with_context("parameter", name.clone())
                    .with_context("min", bounds.min.to_string())
                    .with_context("max", bounds.max.to_string()),
            ));
        }
    }

    Ok(InferenceConfig {
        model,
        variable_params,
        sampler,
        burn_in,
    })
}
