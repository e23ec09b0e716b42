//! Burn-in tests evaluated on the coldest chain of a results file.

use indexmap::IndexMap;

use crate::acf;
use crate::config::{BurnInConfig, BurnInFunction};
use crate::results::{BurnInStatus, BurnInTestResult, ResultsFile};

/// Runs every configured test and combines them.
///
/// The run is burned in only if all tests pass. The burn-in iteration is the
/// largest iteration reported, raised to `min_burn_in`, and must lie inside
/// the stored chain.
pub fn evaluate(results: &ResultsFile, config: &BurnInConfig) -> BurnInStatus {
    let mut tests = IndexMap::new();
    if results.niterations == 0 || config.functions.is_empty() {
        return BurnInStatus {
            is_burned_in: false,
            burn_in_iteration: None,
            tests,
        };
    }
    for function in &config.functions {
        let outcome = match function {
            BurnInFunction::HalfChain => half_chain(results),
            BurnInFunction::MinIterations => min_iterations(results, config.min_burn_in),
            BurnInFunction::MaxPosterior => max_posterior(results),
            BurnInFunction::PosteriorStep => posterior_step(results),
            BurnInFunction::Nacl => nacl(results, config.nacls),
        };
        tests.insert(function.as_str().to_string(), outcome);
    }
    let all_passed = tests.values().all(|t| t.is_burned_in);
    let iteration = tests
        .values()
        .filter_map(|t| t.iteration)
        .max()
        .unwrap_or(0)
        .max(config.min_burn_in);
    let is_burned_in = all_passed && iteration < results.niterations;
    BurnInStatus {
        is_burned_in,
        burn_in_iteration: is_burned_in.then_some(iteration),
        tests,
    }
}

/// Burn-in at half the chain; always passes.
pub fn half_chain(results: &ResultsFile) -> BurnInTestResult {
    BurnInTestResult {
        is_burned_in: true,
        iteration: Some(results.niterations / 2),
    }
}

/// Passes once more than `min_burn_in` iterations are stored.
pub fn min_iterations(results: &ResultsFile, min_burn_in: usize) -> BurnInTestResult {
    BurnInTestResult {
        is_burned_in: results.niterations > min_burn_in,
        iteration: Some(min_burn_in),
    }
}

/// Passes when every walker has reached within `ndim / 2` of the maximum
/// log-posterior seen by any walker.
pub fn max_posterior(results: &ResultsFile) -> BurnInTestResult {
    let ndim = results.parameters().len() as f64;
    let chains: Vec<Vec<f64>> = (0..results.metadata.nwalkers)
        .map(|w| results.cold_log_posterior(w))
        .collect();
    let max_logpost = chains
        .iter()
        .flatten()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);
    if !max_logpost.is_finite() {
        return BurnInTestResult::default();
    }
    let threshold = max_logpost - ndim / 2.0;
    let mut latest = 0;
    for chain in &chains {
        match chain.iter().position(|lp| *lp >= threshold) {
            Some(idx) => latest = latest.max(idx),
            None => {
                return BurnInTestResult {
                    is_burned_in: false,
                    iteration: None,
                }
            }
        }
    }
    BurnInTestResult {
        is_burned_in: true,
        iteration: Some(latest),
    }
}

/// Burn-in after the last step in which any walker's log-posterior rose by
/// at least `ndim / 2`; always passes.
pub fn posterior_step(results: &ResultsFile) -> BurnInTestResult {
    let criterion = results.parameters().len() as f64 / 2.0;
    let mut latest = 0;
    for walker in 0..results.metadata.nwalkers {
        let chain = results.cold_log_posterior(walker);
        if let Some(idx) = chain
            .windows(2)
            .rposition(|pair| pair[1] - pair[0] >= criterion)
        {
            latest = latest.max(idx + 1);
        }
    }
    BurnInTestResult {
        is_burned_in: true,
        iteration: Some(latest),
    }
}

/// Passes once `nacls` autocorrelation lengths (measured on the second half
/// of the chain) fit inside the stored iterations.
pub fn nacl(results: &ResultsFile, nacls: usize) -> BurnInTestResult {
    let report = acf::compute_acls(results, results.niterations / 2);
    if !report.acl.is_finite() {
        return BurnInTestResult::default();
    }
    let iteration = (nacls as f64 * report.acl.0).ceil() as usize;
    BurnInTestResult {
        is_burned_in: iteration < results.niterations,
        iteration: Some(iteration),
    }
}
