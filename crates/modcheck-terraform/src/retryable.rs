//! Catalogue of transient terraform errors
//!
//! Provider downloads, registry lookups and AWS rate limiting fail
//! intermittently; those are worth another attempt. Everything else is
//! treated as a real failure of the module.

use modcheck_core::{ProvisionError, RetryClassifier};
use regex::Regex;

/// Default retryable patterns: (regex, reason)
pub const DEFAULT_RETRYABLE_ERRORS: &[(&str, &str)] = &[
    (
        r"read: connection reset by peer",
        "Failed to reach the registry due to a transient network error",
    ),
    (r"TLS handshake timeout", "Transient network error"),
    (
        r"Client\.Timeout exceeded while awaiting headers",
        "Failed to retrieve plugin due to transient network error",
    ),
    (
        r"unable to verify (signature|checksum)",
        "Failed to retrieve plugin due to transient network error",
    ),
    (
        r"no provider exists with the given name",
        "Registry service is unreachable, may be a transient network error",
    ),
    (
        r"registry service is unreachable",
        "Registry service is unreachable, may be a transient network error",
    ),
    (r"Error installing provider", "Failed to install provider"),
    (
        r"Failed to query available provider packages",
        "Failed to retrieve plugin due to transient network error",
    ),
    (r"timeout while waiting for plugin to start", "Failed to start plugin"),
    (r"timed out waiting for server handshake", "Failed to start plugin"),
    (
        r"could not query provider registry for",
        "Registry service is unreachable, may be a transient network error",
    ),
    (
        r"(?s)Could not download module.*returned error: 429",
        "Module download rate limited",
    ),
    (r"ThrottlingException", "AWS API rate limiting"),
    (r"RequestLimitExceeded", "AWS API rate limiting"),
    (r"Rate exceeded", "AWS API rate limiting"),
    (
        r"Error acquiring the state lock",
        "State lock held by a concurrent operation",
    ),
];

struct RetryablePattern {
    regex: Regex,
    reason: String,
}

/// Regex-based [`RetryClassifier`] for terraform output
pub struct RetryableErrors {
    patterns: Vec<RetryablePattern>,
}

impl Default for RetryableErrors {
    fn default() -> Self {
        Self::defaults()
    }
}

impl std::fmt::Debug for RetryableErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.patterns.iter().map(|p| p.regex.as_str()))
            .finish()
    }
}

impl RetryableErrors {
    /// No pattern is retryable
    pub fn empty() -> Self {
        Self {
            patterns: Vec::new(),
        }
    }

    /// The built-in catalogue
    pub fn defaults() -> Self {
        let patterns = DEFAULT_RETRYABLE_ERRORS
            .iter()
            .filter_map(|(pattern, reason)| {
                Regex::new(pattern).ok().map(|regex| RetryablePattern {
                    regex,
                    reason: reason.to_string(),
                })
            })
            .collect();
        Self { patterns }
    }

    /// Add a pattern
    pub fn with_pattern(
        mut self,
        pattern: &str,
        reason: impl Into<String>,
    ) -> Result<Self, regex::Error> {
        self.patterns.push(RetryablePattern {
            regex: Regex::new(pattern)?,
            reason: reason.into(),
        });
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Reason of the first pattern matching `text`
    pub fn matching_reason(&self, text: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|p| p.regex.is_match(text))
            .map(|p| p.reason.as_str())
    }
}

impl RetryClassifier for RetryableErrors {
    fn is_retryable(&self, error: &ProvisionError) -> bool {
        match error {
            ProvisionError::CommandFailed { .. } => {
                match self.matching_reason(&error.diagnostic()) {
                    Some(reason) => {
                        tracing::debug!("Retryable terraform error: {}", reason);
                        true
                    }
                    None => false,
                }
            }
            // A timeout has already used up the command budget
            _ => false,
        }
    }
}
