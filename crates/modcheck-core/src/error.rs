//! Error types for the provision-verify-teardown lifecycle

use crate::lifecycle::LifecycleState;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by a provisioning engine (apply / output / destroy)
#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("{0} not found. Please install it and make sure it is on PATH")]
    NotInstalled(String),

    #[error("`{command}` failed (exit status {status:?}): {stderr}")]
    CommandFailed {
        command: String,
        status: Option<i32>,
        stderr: String,
        stdout: String,
    },

    #[error("`{command}` did not finish within {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    /// The run was cancelled while the command was in flight
    #[error("`{command}` was interrupted")]
    Interrupted { command: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProvisionError {
    /// Text that retry classification matches against.
    ///
    /// For failed commands this is stderr followed by stdout, since engines
    /// are not consistent about which stream carries the diagnostic.
    pub fn diagnostic(&self) -> String {
        match self {
            ProvisionError::CommandFailed { stderr, stdout, .. } => {
                format!("{}\n{}", stderr, stdout)
            }
            other => other.to_string(),
        }
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, ProvisionError::Interrupted { .. })
    }
}

/// Errors raised by a resource describer (the provider's read API)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DescribeError {
    /// Structured error returned by the provider with an error code
    #[error("{code}: {message}")]
    Provider { code: String, message: String },

    /// Transport failures, timeouts, malformed responses
    #[error("{0}")]
    Unknown(String),
}

impl DescribeError {
    pub fn provider(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Failure of a single lifecycle run
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("apply failed for {name}: {source}")]
    ApplyError {
        name: String,
        #[source]
        source: ProvisionError,
    },

    #[error("output `{key}` is not available (never declared, or apply did not complete)")]
    MissingOutput { key: String },

    #[error(
        "malformed output {output:?}: expected exactly one {delimiter:?} delimiter, found {segments} segment(s)"
    )]
    MalformedOutput {
        output: String,
        delimiter: String,
        segments: usize,
    },

    #[error("resource not found: {identifier}")]
    NotFound { identifier: String },

    #[error("failed to describe resource {identifier}: provider error {code}: {message}")]
    ProviderError {
        identifier: String,
        code: String,
        message: String,
    },

    #[error("transient provider error while describing {identifier}: {cause}")]
    TransientVerificationError { identifier: String, cause: String },

    #[error("unknown error while describing {identifier}: {cause}")]
    UnknownVerificationError { identifier: String, cause: String },

    #[error("destroy failed for {name}, resources may have leaked: {source}")]
    DestroyError {
        name: String,
        #[source]
        source: ProvisionError,
    },

    #[error("run cancelled in state {state}")]
    Cancelled { state: LifecycleState },
}

impl LifecycleError {
    /// Short machine-friendly tag for the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            LifecycleError::ApplyError { .. } => "apply",
            LifecycleError::MissingOutput { .. } => "missing-output",
            LifecycleError::MalformedOutput { .. } => "malformed-output",
            LifecycleError::NotFound { .. } => "not-found",
            LifecycleError::ProviderError { .. } => "provider-error",
            LifecycleError::TransientVerificationError { .. } => "transient-verification-error",
            LifecycleError::UnknownVerificationError { .. } => "unknown-verification-error",
            LifecycleError::DestroyError { .. } => "destroy",
            LifecycleError::Cancelled { .. } => "cancelled",
        }
    }
}

pub type Result<T> = std::result::Result<T, LifecycleError>;
