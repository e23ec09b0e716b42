use gwinfer_core::{ErrorInfo, InferenceError};
use indexmap::IndexMap;

use crate::results::{thin_slice, Acl, AclReport, ResultsFile};

/// Window constant used when truncating the integrated autocorrelation sum.
pub const DEFAULT_ACL_WINDOW: f64 = 5.0;

struct Centered {
    values: Vec<f64>,
    norm: f64,
}

impl Centered {
    fn new(data: &[f64]) -> Self {
        let mean = data.iter().sum::<f64>() / data.len().max(1) as f64;
        let values: Vec<f64> = data.iter().map(|x| x - mean).collect();
        let norm = values.iter().map(|x| x * x).sum::<f64>();
        Self { values, norm }
    }

    /// Biased autocorrelation estimate at `lag`, normalised so lag 0 is one.
    fn rho(&self, lag: usize) -> f64 {
        if self.norm <= 0.0 || lag >= self.values.len() {
            return if lag == 0 { 1.0 } else { 0.0 };
        }
        let n = self.values.len();
        let sum: f64 = self.values[..n - lag]
            .iter()
            .zip(&self.values[lag..])
            .map(|(a, b)| a * b)
            .sum();
        sum / self.norm
    }
}

/// Normalised autocorrelation function of `data` for lags `0..=max_lag`
/// (default: every lag up to `len - 1`).
pub fn calculate_acf(data: &[f64], max_lag: Option<usize>) -> Vec<f64> {
    if data.is_empty() {
        return Vec::new();
    }
    let last = max_lag.unwrap_or(data.len() - 1).min(data.len() - 1);
    let centered = Centered::new(data);
    (0..=last).map(|lag| centered.rho(lag)).collect()
}

/// Integrated autocorrelation length with the automated windowing rule:
/// the first `tau(k) = 2 * sum_{i<=k} rho(i) - 1` with `m * tau(k) <= k`.
///
/// The length is never below one, so anti-correlated chains count as
/// independent draws. Series shorter than two samples have length one; if
/// the window is never satisfied the length is infinite.
pub fn calculate_acl(data: &[f64], m: f64) -> f64 {
    if data.len() < 2 {
        return 1.0;
    }
    let centered = Centered::new(data);
    let mut tau = 1.0;
    for lag in 1..data.len() {
        tau += 2.0 * centered.rho(lag);
        if m * tau <= lag as f64 {
            return tau.max(1.0);
        }
    }
    f64::INFINITY
}

/// ACL per parameter from iteration `start`: averaged over walkers, maximised over temperatures.
pub fn compute_acls(results: &ResultsFile, start: usize) -> AclReport {
    let meta = &results.metadata;
    let mut per_param = IndexMap::new();
    for name in results.parameters() {
        let mut param_acl: f64 = 0.0;
        for temp in 0..meta.ntemps {
            let mut total = 0.0;
            for walker in 0..meta.nwalkers {
                let chain = results
                    .chain(name, temp, walker, start, None, 1)
                    .unwrap_or_default();
                total += calculate_acl(&chain, DEFAULT_ACL_WINDOW);
            }
            let mean = total / meta.nwalkers.max(1) as f64;
            param_acl = param_acl.max(mean);
        }
        per_param.insert(name.clone(), Acl(param_acl));
    }
    let acl = per_param
        .values()
        .map(|a: &Acl| a.0)
        .fold(0.0_f64, f64::max);
    AclReport {
        start_iteration: start,
        niterations: results.niterations,
        per_param,
        acl: Acl(acl),
    }
}

/// Independent samples implied by the stored burn-in status and ACLs.
pub fn n_independent_samples(results: &ResultsFile) -> usize {
    if !results.burn_in.is_burned_in {
        return 0;
    }
    let Some(report) = &results.acls else {
        return 0;
    };
    if !report.acl.is_finite() || report.acl.0 <= 0.0 {
        return 0;
    }
    let burn_in = results.burn_in.burn_in_iteration.unwrap_or(0);
    let kept = results.niterations.saturating_sub(burn_in) as f64;
    results.metadata.nwalkers * (kept / report.acl.0).floor() as usize
}

/// Which chains to compute autocorrelation functions for.
#[derive(Debug, Clone, PartialEq)]
pub struct AcfSelection {
    /// Parameters to include.
    pub parameters: Vec<String>,
    /// Temperature indices to include.
    pub temps: Vec<usize>,
    /// Individual walkers; `None` averages the ACF over all walkers.
    pub walkers: Option<Vec<usize>>,
    /// First iteration used.
    pub thin_start: usize,
    /// Stride between iterations used.
    pub thin_interval: usize,
    /// Iteration after the last one used.
    pub thin_end: Option<usize>,
}

/// One autocorrelation curve.
#[derive(Debug, Clone, PartialEq)]
pub struct AcfSeries {
    /// Parameter name.
    pub parameter: String,
    /// Temperature index.
    pub temp: usize,
    /// Walker index, `None` for the walker average.
    pub walker: Option<usize>,
    /// ACF values for lags `0..len`.
    pub values: Vec<f64>,
}

/// Computes the autocorrelation functions requested by `selection`.
pub fn compute_acfs(
    results: &ResultsFile,
    selection: &AcfSelection,
) -> Result<Vec<AcfSeries>, InferenceError> {
    let meta = &results.metadata;
    if selection.thin_interval == 0 {
        return Err(InferenceError::Validation(ErrorInfo::new(
            "thin-interval",
            "thin interval must be positive",
        )));
    }
    for name in &selection.parameters {
        if !results.samples.contains_key(name) {
            return Err(InferenceError::Validation(
                ErrorInfo::new("unknown-parameter", format!("parameter `{name}` not in file"))
                    .with_context("available", meta.variable_params.join(",")),
            ));
        }
    }
    if let Some(temp) = selection.temps.iter().find(|t| **t >= meta.ntemps) {
        return Err(InferenceError::Validation(
            ErrorInfo::new("temp-range", format!("temperature index {temp} out of range"))
                .with_context("ntemps", meta.ntemps.to_string()),
        ));
    }
    if let Some(walkers) = &selection.walkers {
        if let Some(walker) = walkers.iter().find(|w| **w >= meta.nwalkers) {
            return Err(InferenceError::Validation(
                ErrorInfo::new("walker-range", format!("walker index {walker} out of range"))
                    .with_context("nwalkers", meta.nwalkers.to_string()),
            ));
        }
    }

    let series_for = |name: &str, temp: usize, walker: usize| -> Vec<f64> {
        let raw = &results.samples[name][temp][walker];
        calculate_acf(
            &thin_slice(
                raw,
                selection.thin_start,
                selection.thin_end,
                selection.thin_interval,
            ),
            None,
        )
    };

    let mut out = Vec::new();
    for name in &selection.parameters {
        for &temp in &selection.temps {
            match &selection.walkers {
                Some(walkers) => {
                    for &walker in walkers {
                        out.push(AcfSeries {
                            parameter: name.clone(),
                            temp,
                            walker: Some(walker),
                            values: series_for(name, temp, walker),
                        });
                    }
                }
                None => {
                    let mut mean: Vec<f64> = Vec::new();
                    for walker in 0..meta.nwalkers {
                        let acf = series_for(name, temp, walker);
                        if mean.is_empty() {
                            mean = vec![0.0; acf.len()];
                        }
                        for (acc, value) in mean.iter_mut().zip(&acf) {
                            *acc += value;
                        }
                    }
                    let scale = meta.nwalkers.max(1) as f64;
                    mean.iter_mut().for_each(|v| *v /= scale);
                    out.push(AcfSeries {
                        parameter: name.clone(),
                        temp,
                        walker: None,
                        values: mean,
                    });
                }
            }
        }
    }
    Ok(out)
}
