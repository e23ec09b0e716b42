//! Structured error types shared across gwinfer crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`InferenceError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (paths, counts, flag names).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Adds a `path` context entry.
    pub fn with_path(self, path: &Path) -> Self {
        self.with_context("path", path.display().to_string())
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the inference drivers and the sampler library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum InferenceError {
    /// Configuration file loading and schema errors.
    #[error("config error: {0}")]
    Config(ErrorInfo),
    /// Command line validation failures.
    #[error("validation error: {0}")]
    Validation(ErrorInfo),
    /// Model and prior construction errors.
    #[error("model error: {0}")]
    Model(ErrorInfo),
    /// Sampler construction and state errors.
    #[error("sampler error: {0}")]
    Sampler(ErrorInfo),
    /// File system errors outside the results format.
    #[error("io error: {0}")]
    Io(ErrorInfo),
    /// Results and checkpoint file errors.
    #[error("results error: {0}")]
    Results(ErrorInfo),
    /// Plot rendering errors.
    #[error("plot error: {0}")]
    Plot(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl InferenceError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            InferenceError::Config(info)
            | InferenceError::Validation(info)
            | InferenceError::Model(info)
            | InferenceError::Sampler(info)
            | InferenceError::Io(info)
            | InferenceError::Results(info)
            | InferenceError::Plot(info) => info,
        }
    }

    /// Shorthand for a validation error with a single message.
    pub fn validation(code: impl Into<String>, message: impl Into<String>) -> Self {
        InferenceError::Validation(ErrorInfo::new(code, message))
    }

    /// Wraps an I/O failure on `path` under the given code.
    pub fn io(code: impl Into<String>, err: &std::io::Error, path: &Path) -> Self {
        InferenceError::Io(ErrorInfo::new(code, err.to_string()).with_path(path))
    }

    /// Wraps an I/O failure moving `from` to `to`; the destination is kept as `target` context.
    pub fn io_between(
        code: impl Into<String>,
        err: &std::io::Error,
        from: &Path,
        to: &Path,
    ) -> Self {
        InferenceError::Io(
            ErrorInfo::new(code, err.to_string())
                .with_path(from)
                .with_context("target", to.display().to_string()),
        )
    }
}
