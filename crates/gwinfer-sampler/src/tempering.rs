use gwinfer_core::{ErrorInfo, InferenceError, RngHandle};

use crate::config::{LadderConfig, LadderPolicy};

/// Builds the inverse-temperature ladder (coldest first) for `ntemps` rungs.
pub fn build_betas(ntemps: usize, config: &LadderConfig) -> Result<Vec<f64>, InferenceError> {
    let temperatures = match &config.policy {
        LadderPolicy::Geometric { ratio } => {
            let ratio = (*ratio).max(1.01);
            let mut ladder = Vec::with_capacity(ntemps.max(1));
            let mut temp = config.base_temperature;
            for _ in 0..ntemps.max(1) {
                ladder.push(temp.max(1e-6));
                temp *= ratio;
            }
            ladder
        }
        LadderPolicy::Manual { temperatures } => {
            if temperatures.len() != ntemps {
                return Err(InferenceError::Sampler(
                    ErrorInfo::new("ladder-length", "manual ladder length must equal ntemps")
                        .with_context("ntemps", ntemps.to_string())
                        .with_context("temperatures", temperatures.len().to_string()),
                ));
            }
            if temperatures.iter().any(|t| !(*t > 0.0)) {
                return Err(InferenceError::Sampler(ErrorInfo::new(
                    "ladder-temperature",
                    "ladder temperatures must be positive",
                )));
            }
            temperatures.clone()
        }
    };
    Ok(temperatures.iter().map(|t| 1.0 / t).collect())
}

/// Metropolis acceptance for swapping walkers between inverse temperatures
/// `beta_a` and `beta_b` with log-likelihoods `loglike_a` and `loglike_b`.
pub fn exchange_acceptance(beta_a: f64, loglike_a: f64, beta_b: f64, loglike_b: f64) -> f64 {
    let log_ratio = (beta_a - beta_b) * (loglike_b - loglike_a);
    if log_ratio.is_nan() {
        return 0.0;
    }
    log_ratio.exp().min(1.0)
}

/// Attempts an exchange using the provided RNG handle.
pub fn attempt_exchange(
    beta_a: f64,
    loglike_a: f64,
    beta_b: f64,
    loglike_b: f64,
    rng: &mut RngHandle,
) -> (bool, f64) {
    let acceptance = exchange_acceptance(beta_a, loglike_a, beta_b, loglike_b);
    let draw = rng.uniform();
    (draw < acceptance, acceptance)
}
