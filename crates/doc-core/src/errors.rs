//! Structured error types shared across doc-eval crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`DocError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (axis values, paths, etc.).
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

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for description generation and dispatching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum DocError {
    /// Unknown or unsupported axis values supplied by the caller.
    #[error("axis error: {0}")]
    Axis(ErrorInfo),
    /// Axis combinations that violate cross-axis constraints.
    #[error("consistency error: {0}")]
    Consistency(ErrorInfo),
    /// Run name template errors.
    #[error("naming error: {0}")]
    Naming(ErrorInfo),
    /// Filesystem errors while reading or writing descriptions.
    #[error("io error: {0}")]
    Io(ErrorInfo),
    /// Serialization and schema errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
    /// Resolver and testbed site errors raised by dispatchers.
    #[error("dispatch error: {0}")]
    Dispatch(ErrorInfo),
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

impl DocError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            DocError::Axis(info)
            | DocError::Consistency(info)
            | DocError::Naming(info)
            | DocError::Io(info)
            | DocError::Serde(info)
            | DocError::Dispatch(info) => info,
        }
    }

    /// Wraps an I/O failure, keeping the underlying message as hint.
    pub fn io(code: &str, path: impl Display, err: impl ToString) -> Self {
        DocError::Io(
            ErrorInfo::new(code, "filesystem operation failed")
                .with_context("path", path.to_string())
                .with_hint(err.to_string()),
        )
    }
}
