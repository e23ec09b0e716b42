#![deny(missing_docs)]

//! Deterministic ensemble sampler, burn-in tests, autocorrelation analysis
//! and checksummed results files used by the gwinfer drivers.

/// Autocorrelation functions and lengths.
pub mod acf;
/// Burn-in tests.
pub mod burn_in;
/// YAML configuration schema and merging.
pub mod config;
/// Deterministic seed derivation helpers.
pub mod determinism;
/// Affine-invariant ensemble sampler with optional parallel tempering.
pub mod ensemble;
/// Priors and analytic likelihood models.
pub mod model;
/// Results file payload, checksum and validation.
pub mod results;
/// Parallel tempering ladder helpers.
pub mod tempering;

pub use acf::{
    calculate_acf, calculate_acl, compute_acfs, compute_acls, n_independent_samples, AcfSelection,
    AcfSeries, DEFAULT_ACL_WINDOW,
};
pub use config::{
    BurnInConfig, BurnInFunction, InferenceConfig, LadderConfig, LadderPolicy, ModelConfig,
    ParamBounds, SamplerConfig, SamplerKind,
};
pub use ensemble::{ChunkSummary, EnsembleSampler, StretchMove};
pub use model::{build_model, DataOptions, Model, UniformPrior};
pub use results::{
    Acl, AclReport, BurnInStatus, BurnInTestResult, ResultsFile, RunMetadata, SamplerState,
    RESULTS_SCHEMA,
};
