use std::f64::consts::PI;

use gwinfer_core::{ErrorInfo, InferenceError, RngHandle};
use serde::{Deserialize, Serialize};

use crate::config::{InferenceConfig, ModelConfig};

/// Log-likelihood and prior seen by the sampler.
pub trait Model: Send + Sync {
    /// Name recorded in results metadata.
    fn name(&self) -> &str;

    /// Prior over the variable parameters.
    fn prior(&self) -> &UniformPrior;

    /// Log-likelihood at `params` (ordered as [`Model::variable_params`]).
    fn log_likelihood(&self, params: &[f64]) -> f64;

    /// Log prior density at `params`.
    fn log_prior(&self, params: &[f64]) -> f64 {
        self.prior().log_density(params)
    }

    /// Ordered names of the variable parameters.
    fn variable_params(&self) -> &[String] {
        self.prior().names()
    }
}

/// Independent uniform prior over a box.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformPrior {
    names: Vec<String>,
    bounds: Vec<(f64, f64)>,
    log_norm: f64,
}

impl UniformPrior {
    /// Builds the prior from the configured `variable_params`.
    pub fn from_config(config: &InferenceConfig) -> Self {
        let names = config.parameter_names();
        let bounds: Vec<(f64, f64)> = config
            .variable_params
            .values()
            .map(|b| (b.min, b.max))
            .collect();
        let log_norm = -bounds.iter().map(|(lo, hi)| (hi - lo).ln()).sum::<f64>();
        Self {
            names,
            bounds,
            log_norm,
        }
    }

    /// Parameter names in sampling order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Dimensionality of the parameter space.
    pub fn ndim(&self) -> usize {
        self.names.len()
    }

    /// Log density; `-inf` outside the box.
    pub fn log_density(&self, params: &[f64]) -> f64 {
        let inside = params.len() == self.bounds.len()
            && params
                .iter()
                .zip(&self.bounds)
                .all(|(x, (lo, hi))| *x >= *lo && *x < *hi);
        if inside {
            self.log_norm
        } else {
            f64::NEG_INFINITY
        }
    }

    /// Draws one point from the prior.
    pub fn draw(&self, rng: &mut RngHandle) -> Vec<f64> {
        self.bounds
            .iter()
            .map(|(lo, hi)| lo + rng.uniform() * (hi - lo))
            .collect()
    }
}

/// Detector data options accepted on the command line.
///
/// The analytic models do not read strain; the values are carried into the
/// results metadata so downstream tools can see what the run was set up with.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DataOptions {
    /// Detector names, e.g. `H1`.
    #[serde(default)]
    pub instruments: Vec<String>,
    /// Low frequency cutoff in Hz.
    #[serde(default)]
    pub low_frequency_cutoff: Option<f64>,
    /// High frequency cutoff in Hz.
    #[serde(default)]
    pub high_frequency_cutoff: Option<f64>,
}

/// Independent Gaussian likelihood.
#[derive(Debug, Clone)]
pub struct NormalModel {
    prior: UniformPrior,
    mean: Vec<f64>,
    var: Vec<f64>,
    log_norm: f64,
}

impl NormalModel {
    /// Creates the model, checking mean/variance dimensionality.
    pub fn new(
        prior: UniformPrior,
        mean: Option<Vec<f64>>,
        var: Option<Vec<f64>>,
    ) -> Result<Self, InferenceError> {
        let ndim = prior.ndim();
        let mean = mean.unwrap_or_else(|| vec![0.0; ndim]);
        let var = var.unwrap_or_else(|| vec![1.0; ndim]);
        if mean.len() != ndim || var.len() != ndim {
            return Err(InferenceError::Model(
                ErrorInfo::new(
                    "dimension-mismatch",
                    "normal model mean/var must have one entry per variable parameter",
                )
                .with_context("ndim", ndim.to_string())
                .with_context("mean", mean.len().to_string())
                .with_context("var", var.len().to_string()),
            ));
        }
        if var.iter().any(|v| !(*v > 0.0)) {
            return Err(InferenceError::Model(ErrorInfo::new(
                "bad-variance",
                "normal model variances must be positive",
            )));
        }
        let log_norm = -0.5 * var.iter().map(|v| (2.0 * PI * v).ln()).sum::<f64>();
        Ok(Self {
            prior,
            mean,
            var,
            log_norm,
        })
    }
}

impl Model for NormalModel {
    fn name(&self) -> &str {
        "normal"
    }

    fn prior(&self) -> &UniformPrior {
        &self.prior
    }

    fn log_likelihood(&self, params: &[f64]) -> f64 {
        let chi2: f64 = params
            .iter()
            .zip(self.mean.iter().zip(&self.var))
            .map(|(x, (mu, var))| (x - mu).powi(2) / var)
            .sum();
        self.log_norm - 0.5 * chi2
    }
}

/// Rosenbrock banana in N >= 2 dimensions.
#[derive(Debug, Clone)]
pub struct RosenbrockModel {
    prior: UniformPrior,
}

impl Model for RosenbrockModel {
    fn name(&self) -> &str {
        "rosenbrock"
    }

    fn prior(&self) -> &UniformPrior {
        &self.prior
    }

    fn log_likelihood(&self, params: &[f64]) -> f64 {
        -params
            .windows(2)
            .map(|w| (1.0 - w[0]).powi(2) + 100.0 * (w[1] - w[0] * w[0]).powi(2))
            .sum::<f64>()
    }
}

/// Egg-box: `(2 + prod(cos(x / 2)))^5`.
#[derive(Debug, Clone)]
pub struct EggboxModel {
    prior: UniformPrior,
}

impl Model for EggboxModel {
    fn name(&self) -> &str {
        "eggbox"
    }

    fn prior(&self) -> &UniformPrior {
        &self.prior
    }

    fn log_likelihood(&self, params: &[f64]) -> f64 {
        let product: f64 = params.iter().map(|x| (x / 2.0).cos()).product();
        (2.0 + product).powi(5)
    }
}

/// Two-dimensional volcano: a Gaussian ring on top of a broad exponential.
#[derive(Debug, Clone)]
pub struct VolcanoModel {
    prior: UniformPrior,
}

const VOLCANO_MU_R: f64 = 5.5;
const VOLCANO_SIGMA_R: f64 = 0.5;

impl Model for VolcanoModel {
    fn name(&self) -> &str {
        "volcano"
    }

    fn prior(&self) -> &UniformPrior {
        &self.prior
    }

    fn log_likelihood(&self, params: &[f64]) -> f64 {
        let r = (params[0] * params[0] + params[1] * params[1]).sqrt();
        let ring = (-0.5 * ((r - VOLCANO_MU_R) / VOLCANO_SIGMA_R).powi(2)).exp()
            / (VOLCANO_SIGMA_R * (2.0 * PI).sqrt());
        25.0 * ((-r / 35.0).exp() + ring)
    }
}

/// Builds the configured model.
pub fn build_model(config: &InferenceConfig) -> Result<Box<dyn Model>, InferenceError> {
    let prior = UniformPrior::from_config(config);
    let ndim = prior.ndim();
    let require_dims = |name: &str, ok: bool, expected: &str| {
        if ok {
            Ok(())
        } else {
            Err(InferenceError::Model(
                ErrorInfo::new("dimension-mismatch", format!("{name} model requires {expected}"))
                    .with_context("ndim", ndim.to_string()),
            ))
        }
    };
    let model: Box<dyn Model> = match &config.model {
        ModelConfig::Normal { mean, var } => {
            Box::new(NormalModel::new(prior, mean.clone(), var.clone())?)
        }
        ModelConfig::Rosenbrock => {
            require_dims("rosenbrock", ndim >= 2, "at least two parameters")?;
            Box::new(RosenbrockModel { prior })
        }
        ModelConfig::Eggbox => Box::new(EggboxModel { prior }),
        ModelConfig::Volcano => {
            require_dims("volcano", ndim == 2, "exactly two parameters")?;
            Box::new(VolcanoModel { prior })
        }
    };
    tracing::debug!(model = model.name(), ndim, "model constructed");
    Ok(model)
}
