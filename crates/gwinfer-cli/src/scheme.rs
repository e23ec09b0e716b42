use std::str::FromStr;

use gwinfer_core::{ErrorInfo, InferenceError};

/// Processing context selected with `--processing-scheme`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingScheme {
    /// CPU execution, optionally with an explicit thread count.
    Cpu {
        /// Worker threads; `None` keeps rayon's default.
        threads: Option<usize>,
    },
}

impl FromStr for ProcessingScheme {
    type Err = InferenceError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let unknown = || {
            InferenceError::Validation(
                ErrorInfo::new("unknown-scheme", format!("unknown processing scheme `{value}`"))
                    .with_hint("use `cpu` or `cpu:N`"),
            )
        };
        let (name, count) = match value.split_once(':') {
            Some((name, count)) => (name, Some(count)),
            None => (value, None),
        };
        if name != "cpu" {
            return Err(unknown());
        }
        let threads = match count {
            None => None,
            Some(count) => match count.parse::<usize>() {
                Ok(n) if n > 0 => Some(n),
                _ => return Err(unknown()),
            },
        };
        Ok(ProcessingScheme::Cpu { threads })
    }
}

impl ProcessingScheme {
    /// Applies `--nprocesses`, which takes precedence over the scheme's count.
    pub fn with_nprocesses(self, nprocesses: Option<usize>) -> Self {
        match (self, nprocesses) {
            (ProcessingScheme::Cpu { .. }, Some(n)) => ProcessingScheme::Cpu { threads: Some(n) },
            (scheme, None) => scheme,
        }
    }

    /// Requested worker threads, if any.
    pub fn threads(&self) -> Option<usize> {
        match self {
            ProcessingScheme::Cpu { threads } => *threads,
        }
    }
}

/// Sizes the global rayon pool used for likelihood evaluation and returns
/// the number of threads in effect.
///
/// The global pool can only be built once per process; later requests keep
/// the existing pool.
pub fn install(scheme: ProcessingScheme) -> usize {
    if let Some(threads) = scheme.threads() {
        match rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
        {
            Ok(()) => tracing::debug!(threads, "global thread pool initialised"),
            Err(err) => tracing::warn!(error = %err, "thread pool already initialised; keeping it"),
        }
    }
    rayon::current_num_threads()
}
