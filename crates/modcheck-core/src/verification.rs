//! Verification client: does the resource really exist?
//!
//! Issues exactly one describe call per run and classifies the response.
//! There is no retry here; eventual-consistency retries belong to apply.

use crate::error::{DescribeError, LifecycleError};
use crate::provider::{ResourceDescriber, ResourceRecord};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Provider codes meaning "the resource does not exist"
pub const DEFAULT_NOT_FOUND_CODES: &[&str] = &["RepositoryNotFoundException"];

/// Provider codes reported as transient (still a failed verification)
pub const DEFAULT_TRANSIENT_CODES: &[&str] = &["ThrottlingException"];

/// Outcome of a single describe call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationResult {
    /// At least one record matching the identifier
    Found(Vec<ResourceRecord>),
    NotFound,
    TransientError(String),
    FatalError(VerificationFault),
}

/// Why a verification failed fatally
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationFault {
    /// Classified provider error
    Provider { code: String, message: String },
    /// Not a structured provider error (transport, timeout, bad response)
    Unknown(String),
}

impl VerificationResult {
    pub fn is_found(&self) -> bool {
        matches!(self, VerificationResult::Found(_))
    }

    /// Convert into the run outcome for `identifier`
    pub fn into_outcome(self, identifier: &str) -> Result<Vec<ResourceRecord>, LifecycleError> {
        match self {
            VerificationResult::Found(records) => Ok(records),
            VerificationResult::NotFound => Err(LifecycleError::NotFound {
                identifier: identifier.to_string(),
            }),
            VerificationResult::TransientError(cause) => {
                Err(LifecycleError::TransientVerificationError {
                    identifier: identifier.to_string(),
                    cause,
                })
            }
            VerificationResult::FatalError(VerificationFault::Provider { code, message }) => {
                Err(LifecycleError::ProviderError {
                    identifier: identifier.to_string(),
                    code,
                    message,
                })
            }
            VerificationResult::FatalError(VerificationFault::Unknown(cause)) => {
                Err(LifecycleError::UnknownVerificationError {
                    identifier: identifier.to_string(),
                    cause,
                })
            }
        }
    }
}

/// Error-code classification for a provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationPolicy {
    pub not_found_codes: Vec<String>,
    pub transient_codes: Vec<String>,
}

impl Default for VerificationPolicy {
    fn default() -> Self {
        Self {
            not_found_codes: DEFAULT_NOT_FOUND_CODES.iter().map(|c| c.to_string()).collect(),
            transient_codes: DEFAULT_TRANSIENT_CODES.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl VerificationPolicy {
    pub fn classify(
        &self,
        identifier: &str,
        response: Result<Vec<ResourceRecord>, DescribeError>,
    ) -> VerificationResult {
        match response {
            Ok(records) => {
                let matching: Vec<ResourceRecord> =
                    records.into_iter().filter(|r| r.name == identifier).collect();
                if matching.is_empty() {
                    VerificationResult::NotFound
                } else {
                    VerificationResult::Found(matching)
                }
            }
            Err(DescribeError::Provider { code, message }) => {
                if self.not_found_codes.iter().any(|c| *c == code) {
                    VerificationResult::NotFound
                } else if self.transient_codes.iter().any(|c| *c == code) {
                    VerificationResult::TransientError(format!("{}: {}", code, message))
                } else {
                    VerificationResult::FatalError(VerificationFault::Provider { code, message })
                }
            }
            Err(DescribeError::Unknown(cause)) => {
                VerificationResult::FatalError(VerificationFault::Unknown(cause))
            }
        }
    }
}

/// Queries the provider for an identifier and classifies the answer
#[derive(Clone)]
pub struct VerificationClient {
    describer: Arc<dyn ResourceDescriber>,
    policy: VerificationPolicy,
}

impl VerificationClient {
    pub fn new(describer: Arc<dyn ResourceDescriber>) -> Self {
        Self {
            describer,
            policy: VerificationPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: VerificationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &VerificationPolicy {
        &self.policy
    }

    /// Describe `identifier` once and classify the response
    pub async fn describe(&self, identifier: &str) -> VerificationResult {
        tracing::debug!(describer = %self.describer.name(), "Describing {}", identifier);

        let response = self.describer.describe(identifier).await;
        let result = self.policy.classify(identifier, response);

        match &result {
            VerificationResult::Found(records) => {
                tracing::info!("Found {} ({} record(s))", identifier, records.len())
            }
            VerificationResult::NotFound => tracing::warn!("Resource not found: {}", identifier),
            VerificationResult::TransientError(cause) => {
                tracing::warn!("Transient error describing {}: {}", identifier, cause)
            }
            VerificationResult::FatalError(fault) => {
                tracing::warn!("Failed to describe {}: {:?}", identifier, fault)
            }
        }

        result
    }
}
